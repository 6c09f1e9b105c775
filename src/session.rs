// Part of ecat-conformance. Copyright 2019-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Network session: open/close lifecycle and per-slave queries. The only
//! state held here is the slave count fetched at open; everything else is
//! re-queried from the transport on every call so no cached lifecycle
//! state can go stale across test steps.

use crate::state;
use crate::transport::Transport;
use crate::types::{AlState, Error, Result, SlaveInfo, SlavePos, SlaveRev};
use log::{debug, info, warn};
use std::time::Duration;

/// Freshly powered devices can need several cycles to leave INIT, so the
/// initial PREOP request is retried a bounded number of times. This is the
/// only retry loop in the crate.
const PREOP_SETTLE_TRIES: u32 = 10;

/// An open network session over a fieldbus engine.
pub struct Session<T> {
    pub(crate) transport: T,
    pub(crate) slave_count: u32,
}

impl<T: Transport> Session<T> {
    /// Opens the network on `adapter`, discovers the slaves and settles
    /// every one of them in PREOP. `timeout` bounds each blocking state
    /// check.
    pub fn open(mut transport: T, adapter: &str, timeout: Duration) -> Result<Self> {
        let slave_count = transport.open(adapter)?;
        info!("network open on '{}', {} slaves", adapter, slave_count);
        let mut session = Session {
            transport,
            slave_count,
        };
        for n in 1..=slave_count as u16 {
            session.settle_preop(SlavePos::from(n), timeout)?;
        }
        Ok(session)
    }

    fn settle_preop(&mut self, slave: SlavePos, timeout: Duration) -> Result<()> {
        let mut state = state::run(&mut self.transport, slave, AlState::Init, timeout)?;
        let mut tries = 0;
        while tries < PREOP_SETTLE_TRIES && state != AlState::PreOp {
            state = state::run(&mut self.transport, slave, AlState::PreOp, timeout)?;
            tries += 1;
        }
        if state != AlState::PreOp {
            return Err(Error::OpenSettle { slave, state });
        }
        debug!("slave {} settled in PREOP after {} tries", slave, tries);
        Ok(())
    }

    /// Returns every slave to INIT (best effort), closes the network and
    /// hands the transport back.
    pub fn close(self, timeout: Duration) -> Result<T> {
        let Session {
            mut transport,
            slave_count,
        } = self;
        for n in 1..=slave_count as u16 {
            let slave = SlavePos::from(n);
            if let Err(e) = state::run(&mut transport, slave, AlState::Init, timeout) {
                warn!("could not return slave {} to INIT: {}", slave, e);
            }
        }
        transport.close()?;
        Ok(transport)
    }

    pub const fn slave_count(&self) -> u32 {
        self.slave_count
    }

    /// Direct access to the underlying engine, for primitives this crate
    /// does not wrap.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Validates a slave index against the open-time count. Out-of-range
    /// indexes fail here, before any transport call is made.
    pub(crate) fn check_slave(&self, slave: SlavePos) -> Result<()> {
        let pos = u16::from(slave);
        if pos == 0 || u32::from(pos) > self.slave_count {
            return Err(Error::SlaveOutOfRange(slave, self.slave_count));
        }
        Ok(())
    }

    /// Current lifecycle state, always re-read from the device.
    pub fn state(&mut self, slave: SlavePos) -> Result<AlState> {
        self.check_slave(slave)?;
        AlState::from_code(self.transport.get_state(slave)?)
    }

    /// Whether the slave currently has the error/acknowledge flag layered
    /// on its state.
    pub fn error_flagged(&mut self, slave: SlavePos) -> Result<bool> {
        self.check_slave(slave)?;
        Ok(AlState::error_flagged(self.transport.get_state(slave)?))
    }

    /// EEPROM identity and display name, fetched on demand.
    pub fn slave_info(&mut self, slave: SlavePos) -> Result<SlaveInfo> {
        self.check_slave(slave)?;
        let name = self.transport.slave_name(slave)?;
        let rev = SlaveRev::new(
            self.transport.eeprom_manufacturer(slave)?,
            self.transport.eeprom_product(slave)?,
            self.transport.eeprom_revision(slave)?,
        );
        Ok(SlaveInfo::new(name, rev))
    }

    /// Drives the slave towards `target` along the transition table and
    /// returns the state actually reached, which may differ when the
    /// device refuses or is still settling.
    pub fn request_state(
        &mut self,
        slave: SlavePos,
        target: AlState,
        timeout: Duration,
    ) -> Result<AlState> {
        self.check_slave(slave)?;
        state::run(&mut self.transport, slave, target, timeout)
    }
}
