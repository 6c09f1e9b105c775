// Part of ecat-conformance. Copyright 2019-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! The slave lifecycle engine: legal transitions, implicit multi-hop
//! routes, and the side effects bound to specific hops.

use crate::transport::Transport;
use crate::types::{AlState, Error, Result, SlavePos};
use log::{debug, warn};
use std::time::Duration;

/// One settle exchange is issued right after the cyclic timer starts so
/// the slave sees valid process data before the state check.
const SETTLE_EXCHANGE_TIMEOUT: Duration = Duration::from_micros(2000);

/// Next hop on the route from `from` towards `to`, per the transition
/// table. Requests for the current state are re-issued directly.
pub fn next_hop(from: AlState, to: AlState) -> Result<AlState> {
    use AlState::*;
    if from == to {
        return Ok(to);
    }
    Ok(match (from, to) {
        (Init, PreOp) | (Init, Boot) => to,
        (Init, SafeOp) | (Init, Op) => PreOp,

        (PreOp, Init) | (PreOp, SafeOp) => to,
        (PreOp, Boot) => Init,
        (PreOp, Op) => SafeOp,

        (SafeOp, Init) | (SafeOp, PreOp) | (SafeOp, Op) => to,
        (SafeOp, Boot) => Init,

        (Op, Init) | (Op, PreOp) | (Op, SafeOp) => to,

        (Boot, Init) => to,
        (Boot, PreOp) | (Boot, SafeOp) | (Boot, Op) => Init,

        (from, to) => return Err(Error::InvalidTransition { from, to }),
    })
}

/// Drives `slave` from its current state towards `target`, one table hop
/// at a time, and returns the state actually observed at the end. The
/// result may differ from `target` when the device refuses a hop or is
/// still settling; callers must check it.
///
/// An unreachable target fails with `InvalidTransition` before any state
/// is written.
pub fn run<T: Transport>(
    transport: &mut T,
    slave: SlavePos,
    target: AlState,
    timeout: Duration,
) -> Result<AlState> {
    let mut current = AlState::from_code(transport.get_state(slave)?)?;
    loop {
        let hop = next_hop(current, target)?;
        let observed = step(transport, slave, current, hop, timeout)?;
        if observed != hop {
            warn!(
                "slave {}: requested {} but device reports {}",
                slave, hop, observed
            );
            return Ok(observed);
        }
        current = observed;
        if current == target {
            return Ok(current);
        }
    }
}

/// Executes a single table hop: side effects, raw state write, blocking
/// check. Returns the observed state.
fn step<T: Transport>(
    transport: &mut T,
    slave: SlavePos,
    current: AlState,
    hop: AlState,
    timeout: Duration,
) -> Result<AlState> {
    // Entering SAFEOP from PREOP always reconfigures the I/O map, even if
    // a previous run already did. Repeated PREOP->SAFEOP->OP->PREOP test
    // cycles depend on the re-run.
    if current == AlState::PreOp && hop == AlState::SafeOp {
        let size = transport.configure_io_map()?;
        debug!("slave {}: I/O map configured, {} bytes", slave, size);
    }
    if current == AlState::SafeOp && hop == AlState::Op {
        transport
            .start_cyclic_exchange()
            .map_err(|_| Error::TimerFault { from: current, to: hop })?;
        transport.send_process_data()?;
        transport.receive_process_data(SETTLE_EXCHANGE_TIMEOUT)?;
    }
    if current == AlState::Op && hop != AlState::Op {
        transport
            .stop_cyclic_exchange()
            .map_err(|_| Error::TimerFault { from: current, to: hop })?;
    }

    transport.set_state(slave, hop.code())?;
    let observed = transport.state_check(slave, hop.code(), timeout)?;
    debug!("slave {}: {} -> {}, observed {:#04x}", slave, current, hop, observed);
    AlState::from_code(observed)
}
