// Part of ecat-conformance. Copyright 2019-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Interpretation of the raw (error type, error code, device status)
//! tuples popped off the transport's error stack.

use std::fmt;

/// The channel a faulted operation was issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Config,
    Process,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ChannelKind::Config => "config",
            ChannelKind::Process => "process",
        })
    }
}

/// Fault domains of the underlying mailbox protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Configuration-channel object access failed on the device.
    ConfigObject,
    /// Process-channel access failed.
    ProcessObject,
    /// The host OS layer failed (timer, socket), not the device.
    HostOs,
    /// The transport's internal slave structures were not initialized;
    /// the error stack was empty when popped.
    Data,
    Unclassified,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FaultKind::ConfigObject => "config-object",
            FaultKind::ProcessObject => "process-object",
            FaultKind::HostOs => "host-os",
            FaultKind::Data => "data",
            FaultKind::Unclassified => "unclassified",
        })
    }
}

/// Error-type space of the transport's error stack.
pub mod err_type {
    pub const SDO: u8 = 0x00;
    pub const EMERGENCY: u8 = 0x01;
    pub const PACKET: u8 = 0x03;
    pub const SDO_INFO: u8 = 0x04;
    pub const FOE: u8 = 0x05;
    pub const FOE_BUF2SMALL: u8 = 0x06;
    pub const FOE_PACKETNUMBER: u8 = 0x07;
    pub const SOE: u8 = 0x08;
    pub const MBX: u8 = 0x09;
    pub const WINDOWS: u8 = 0x0A;
    pub const CUSTOM: u8 = 0x0B;
}

pub fn err_type_name(err_type: u8) -> &'static str {
    match err_type {
        err_type::SDO => "SDO",
        err_type::EMERGENCY => "EMERGENCY",
        err_type::PACKET => "PACKET",
        err_type::SDO_INFO => "SDO_INFO",
        err_type::FOE => "FOE",
        err_type::FOE_BUF2SMALL => "FOE_BUF2SMALL",
        err_type::FOE_PACKETNUMBER => "FOE_PACKETNUMBER",
        err_type::SOE => "SOE",
        err_type::MBX => "MBX",
        err_type::WINDOWS => "WINDOWS",
        err_type::CUSTOM => "CUSTOM",
        _ => "UNKNOWN",
    }
}

/// Maps a raw fault tuple into its domain. Pure; the device status is
/// carried along for diagnostics but does not influence the category.
pub fn classify(channel: ChannelKind, err_type_code: u8) -> FaultKind {
    match err_type_code {
        err_type::WINDOWS => FaultKind::HostOs,
        err_type::CUSTOM => FaultKind::Unclassified,
        err_type::SDO
        | err_type::EMERGENCY
        | err_type::PACKET
        | err_type::SDO_INFO
        | err_type::FOE
        | err_type::FOE_BUF2SMALL
        | err_type::FOE_PACKETNUMBER
        | err_type::SOE
        | err_type::MBX => match channel {
            ChannelKind::Config => FaultKind::ConfigObject,
            ChannelKind::Process => FaultKind::ProcessObject,
        },
        _ => FaultKind::Unclassified,
    }
}

/// A classified fault popped off the transport after a failed channel
/// operation. Its `Display` form is stable and parseable, for logging and
/// assertion comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    pub channel: ChannelKind,
    pub kind: FaultKind,
    /// `(error type, error code)` as popped from the stack, or `None` if
    /// the stack was empty.
    pub error: Option<(u8, u32)>,
    /// AL status code of the slave at the time of the fault.
    pub status: u16,
}

impl FaultReport {
    pub fn classified(channel: ChannelKind, err_type_code: u8, err_code: u32, status: u16) -> Self {
        Self {
            channel,
            kind: classify(channel, err_type_code),
            error: Some((err_type_code, err_code)),
            status,
        }
    }

    /// Report for a failed call with an empty error stack.
    pub fn uninitialized(channel: ChannelKind, status: u16) -> Self {
        Self {
            channel,
            kind: FaultKind::Data,
            error: None,
            status,
        }
    }

    /// Fault code to compare against a test's expected-failure code.
    pub fn code(&self) -> Option<u32> {
        self.error.map(|(_, code)| code)
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} channel fault ({}): ", self.channel, self.kind)?;
        match self.error {
            Some((err_type_code, err_code)) => write!(
                f,
                "error type = {} ({:#04x}); error code = {:#010x}; AL status = {:#06x}",
                err_type_name(err_type_code),
                err_type_code,
                err_code,
                self.status
            ),
            None => write!(f, "error stack empty; AL status = {:#06x}", self.status),
        }
    }
}
