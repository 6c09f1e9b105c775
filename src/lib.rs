// Part of ecat-conformance. Copyright 2019-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Host-side client for driving conformance and interface tests against
//! EtherCAT slave devices (mass-flow controllers and similar).
//!
//! The crate covers two things: the slave lifecycle engine, which
//! enforces legal state transitions and runs the side effects each hop
//! requires, and a typed object-exchange layer that marshals values over
//! the mailbox configuration channel and the cyclic process-data channel.
//! Exchange steps carry a dual expectation - "succeed with this value" or
//! "fail with exactly this code" - and resolve to a single verdict, which
//! makes them directly usable from automated test runners.
//!
//! The frame-level engine itself (mailbox handling, adapter I/O, slave
//! discovery) sits behind the [`Transport`] trait and is not part of this
//! crate. A [`Session`] wraps a transport and is the entry point for
//! everything else.

mod codec;
mod exchange;
mod fault;
mod session;
mod state;
mod transport;
mod types;

pub use self::{
    codec::{decode, encode, strip_trailing_nuls, TypeTag, Value, TYPE_TAGS},
    exchange::{Pass, ReadRequest, Verdict, WriteRequest},
    fault::{classify, err_type, err_type_name, ChannelKind, FaultKind, FaultReport},
    session::Session,
    state::next_hop,
    transport::{Adapter, Transport},
    types::*,
};
