// Part of ecat-conformance. Copyright 2019-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Typed object exchange over both channels, with the dual
//! success/expected-failure assertion contract used by automated test
//! steps. Each call is independent and carries no session state; the
//! verdict is a single sum type, never a raised assertion.

use crate::codec::{self, TypeTag, Value};
use crate::fault::{ChannelKind, FaultReport};
use crate::session::Session;
use crate::transport::Transport;
use crate::types::{Error, ObjectAddr, OpRef, Result, SlavePos, SubIdx};
use derive_new::new;
use log::debug;

/// Largest mailbox object the engine buffers; variable-length entry reads
/// are issued with this capacity.
const MAX_OBJECT_SIZE: usize = 4096;

/// One read step of a test table: where to read, what to expect.
#[derive(Debug, Clone, new)]
pub struct ReadRequest {
    pub slave: SlavePos,
    pub addr: ObjectAddr,
    pub ty: TypeTag,
    pub expected: Value,
    /// Symmetric tolerance window around `expected`; an observed value
    /// strictly inside the window passes without an equality check.
    #[new(default)]
    pub deviation: Option<f64>,
    /// Expected fault code; when set, the read must fail with exactly
    /// this code to pass.
    #[new(default)]
    pub expect_fault: Option<u32>,
    #[new(default)]
    pub label: String,
}

impl ReadRequest {
    pub fn within(mut self, deviation: f64) -> Self {
        self.deviation = Some(deviation);
        self
    }

    pub fn expecting_fault(mut self, code: u32) -> Self {
        self.expect_fault = Some(code);
        self
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn op(&self) -> OpRef {
        OpRef::new(self.slave, self.addr, self.label.clone())
    }
}

/// One write step of a test table.
#[derive(Debug, Clone, new)]
pub struct WriteRequest {
    pub slave: SlavePos,
    pub addr: ObjectAddr,
    pub ty: TypeTag,
    pub value: Value,
    #[new(default)]
    pub expect_fault: Option<u32>,
    #[new(default)]
    pub label: String,
}

impl WriteRequest {
    pub fn expecting_fault(mut self, code: u32) -> Self {
        self.expect_fault = Some(code);
        self
    }

    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn op(&self) -> OpRef {
        OpRef::new(self.slave, self.addr, self.label.clone())
    }
}

/// The passing outcomes of an exchange step.
#[derive(Debug, Clone, PartialEq)]
pub enum Pass {
    /// Read value observed and confirmed against the expectation.
    Value(Value),
    /// Write acknowledged without a fault.
    Written,
    /// The declared expected failure occurred with the right code.
    FaultMatched(FaultReport),
}

/// Every exchange call resolves to exactly one verdict.
pub type Verdict = Result<Pass>;

fn channel(addr: &ObjectAddr) -> ChannelKind {
    match addr {
        ObjectAddr::Config(_) | ObjectAddr::ConfigComplete(_) => ChannelKind::Config,
        ObjectAddr::Process(_) => ChannelKind::Process,
    }
}

/// Byte width to request from the transport. Complete access transfers
/// exactly the expected object size; variable-length entry reads take the
/// full buffer and let the decoder strip the tail.
fn read_width(addr: &ObjectAddr, tag: TypeTag, expected: &Value) -> Result<usize> {
    match tag.width() {
        Some(width) => Ok(width),
        None => match addr {
            ObjectAddr::ConfigComplete(_) => Ok(codec::encode(tag, expected)?.len()),
            _ => Ok(MAX_OBJECT_SIZE),
        },
    }
}

impl<T: Transport> Session<T> {
    /// Reads one typed object and turns the result into a verdict per the
    /// request's expectation: value equality (optionally widened to a
    /// deviation window) or a specific fault code.
    pub fn read(&mut self, req: &ReadRequest) -> Verdict {
        self.check_slave(req.slave)?;
        let width = read_width(&req.addr, req.ty, &req.expected)?;
        let bytes = match self.raw_read(req.slave, req.addr, width) {
            Ok(bytes) => bytes,
            Err(_) => return self.fault_verdict(channel(&req.addr), req.expect_fault, req.op()),
        };
        if let Some(code) = req.expect_fault {
            return Err(Error::ExpectedFaultMissing {
                expected: code,
                op: req.op(),
            });
        }
        let observed = codec::decode(req.ty, &bytes)?;
        debug!("slave {}: read {} {} = {}", req.slave, req.ty, req.addr, observed);
        if let Some(deviation) = req.deviation {
            return self.deviation_verdict(req, observed, deviation);
        }
        // Canonicalize the expectation through the codec so a wider
        // integer literal checks against a narrower object numerically and
        // byte strings compare with their trailing NULs stripped.
        let expected = codec::decode(req.ty, &codec::encode(req.ty, &req.expected)?)?;
        if observed == expected {
            Ok(Pass::Value(observed))
        } else {
            Err(Error::ValueMismatch {
                expected,
                observed,
                op: req.op(),
            })
        }
    }

    /// Writes one typed object; the verdict is defined purely by the
    /// fault-expectation contract.
    pub fn write(&mut self, req: &WriteRequest) -> Verdict {
        self.check_slave(req.slave)?;
        let data = codec::encode(req.ty, &req.value)?;
        match self.raw_write(req.slave, req.addr, &data) {
            Ok(()) => match req.expect_fault {
                Some(code) => Err(Error::ExpectedFaultMissing {
                    expected: code,
                    op: req.op(),
                }),
                None => {
                    debug!("slave {}: wrote {} {} = {}", req.slave, req.ty, req.addr, req.value);
                    Ok(Pass::Written)
                }
            },
            Err(_) => self.fault_verdict(channel(&req.addr), req.expect_fault, req.op()),
        }
    }

    fn raw_read(&mut self, slave: SlavePos, addr: ObjectAddr, width: usize) -> Result<Vec<u8>> {
        match addr {
            ObjectAddr::Config(sdo) => {
                self.transport
                    .config_object_read(slave, sdo.idx, sdo.sub, false, width)
            }
            ObjectAddr::ConfigComplete(idx) => {
                self.transport
                    .config_object_read(slave, idx, SubIdx::from(0), true, width)
            }
            ObjectAddr::Process(offset) => self.transport.process_object_read(slave, offset, width),
        }
    }

    fn raw_write(&mut self, slave: SlavePos, addr: ObjectAddr, data: &[u8]) -> Result<()> {
        match addr {
            ObjectAddr::Config(sdo) => {
                self.transport
                    .config_object_write(slave, sdo.idx, sdo.sub, false, data)
            }
            ObjectAddr::ConfigComplete(idx) => {
                self.transport
                    .config_object_write(slave, idx, SubIdx::from(0), true, data)
            }
            ObjectAddr::Process(offset) => {
                self.transport.process_object_write(slave, offset, data)
            }
        }
    }

    /// Pops and classifies the fault behind a failed raw call, then
    /// matches it against the step's expectation.
    fn fault_verdict(&mut self, channel: ChannelKind, expect: Option<u32>, op: OpRef) -> Verdict {
        let status = self.transport.device_status(op.slave);
        let report = match self.transport.last_error() {
            Some((err_type_code, err_code)) => {
                FaultReport::classified(channel, err_type_code, err_code, status)
            }
            None => FaultReport::uninitialized(channel, status),
        };
        match expect {
            Some(code) if report.code() == Some(code) => {
                debug!("expected fault observed; {} ({})", report, op);
                Ok(Pass::FaultMatched(report))
            }
            Some(code) => Err(Error::FaultCodeMismatch {
                expected: code,
                report,
                op,
            }),
            None => Err(Error::Fault { report, op }),
        }
    }

    /// Window check used instead of equality when a tolerance is given:
    /// the observed value must lie strictly between expected ± deviation.
    fn deviation_verdict(&self, req: &ReadRequest, observed: Value, deviation: f64) -> Verdict {
        let expected = req.expected.to_f64().ok_or_else(|| Error::TypeMismatch {
            tag: req.ty,
            value: req.expected.clone(),
        })?;
        let actual = observed.to_f64().ok_or_else(|| Error::TypeMismatch {
            tag: req.ty,
            value: observed.clone(),
        })?;
        if expected - deviation < actual && actual < expected + deviation {
            Ok(Pass::Value(observed))
        } else {
            Err(Error::DeviationExceeded {
                expected,
                deviation,
                observed: actual,
                op: req.op(),
            })
        }
    }
}
