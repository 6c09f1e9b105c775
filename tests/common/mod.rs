#![allow(dead_code)]

//! In-memory fieldbus engine used by the integration tests: state codes
//! and object stores live in hash maps, side effects are counted, and
//! faults can be scripted onto the next channel operation.

use ecat_conformance::{Idx, PdoOffset, Result, SlavePos, SubIdx, Transport};
use std::collections::HashMap;
use std::io;
use std::time::Duration;

const INIT: u8 = 0x01;
const PREOP: u8 = 0x02;

/// What the next channel operation should do instead of succeeding.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Fail and leave `(err_type, err_code)` on the error stack.
    Fault(u8, u32),
    /// Fail without touching the error stack.
    FailSilently,
}

pub struct MockTransport {
    pub slaves: u32,
    pub states: Vec<u8>,
    /// PREOP requests a slave ignores before following, mimicking devices
    /// that need several cycles to leave INIT after power-up.
    pub preop_settle_after: u32,
    preop_attempts: Vec<u32>,
    /// Requested state code the devices refuse to enter.
    pub refuse_code: Option<u8>,

    pub io_map_configs: u32,
    pub cyclic_starts: u32,
    pub cyclic_stops: u32,
    pub cyclic_running: bool,
    pub fail_cyclic_start: bool,
    pub fail_cyclic_stop: bool,
    pub exchanges: u32,

    pub objects: HashMap<(u16, u8, bool), Vec<u8>>,
    pub process: HashMap<usize, Vec<u8>>,
    pub channel_calls: u32,
    pub script: Option<Script>,
    error_stack: Vec<(u8, u32)>,
    pub status: u16,
    pub closed: bool,
}

impl MockTransport {
    pub fn with_slaves(slaves: u32) -> Self {
        Self {
            slaves,
            states: vec![INIT; slaves as usize],
            preop_settle_after: 0,
            preop_attempts: vec![0; slaves as usize],
            refuse_code: None,
            io_map_configs: 0,
            cyclic_starts: 0,
            cyclic_stops: 0,
            cyclic_running: false,
            fail_cyclic_start: false,
            fail_cyclic_stop: false,
            exchanges: 0,
            objects: HashMap::new(),
            process: HashMap::new(),
            channel_calls: 0,
            script: None,
            error_stack: vec![],
            status: 0x02,
            closed: false,
        }
    }

    pub fn state_of(&self, slave: u16) -> u8 {
        self.states[slave as usize - 1]
    }

    pub fn set_state_of(&mut self, slave: u16, code: u8) {
        self.states[slave as usize - 1] = code;
    }

    pub fn store_object(&mut self, idx: u16, sub: u8, bytes: &[u8]) {
        self.objects.insert((idx, sub, false), bytes.to_vec());
    }

    pub fn store_complete_object(&mut self, idx: u16, bytes: &[u8]) {
        self.objects.insert((idx, 0, true), bytes.to_vec());
    }

    fn slot(&mut self, slave: SlavePos) -> &mut u8 {
        let pos = u16::from(slave) as usize;
        &mut self.states[pos - 1]
    }

    /// Consumes the scripted failure, if any, for a channel operation.
    fn scripted_failure(&mut self) -> Option<io::Error> {
        match self.script.take() {
            Some(Script::Fault(err_type, err_code)) => {
                self.error_stack.push((err_type, err_code));
                Some(io::Error::new(io::ErrorKind::Other, "scripted fault"))
            }
            Some(Script::FailSilently) => {
                Some(io::Error::new(io::ErrorKind::Other, "scripted silent failure"))
            }
            None => None,
        }
    }
}

impl Transport for MockTransport {
    fn open(&mut self, _adapter: &str) -> Result<u32> {
        Ok(self.slaves)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn get_state(&mut self, slave: SlavePos) -> Result<u8> {
        Ok(*self.slot(slave))
    }

    fn set_state(&mut self, slave: SlavePos, code: u8) -> Result<()> {
        if self.refuse_code == Some(code) {
            return Ok(());
        }
        if code == PREOP {
            let pos = u16::from(slave) as usize;
            self.preop_attempts[pos - 1] += 1;
            if self.preop_attempts[pos - 1] <= self.preop_settle_after {
                return Ok(());
            }
        }
        *self.slot(slave) = code;
        Ok(())
    }

    fn state_check(&mut self, slave: SlavePos, _target: u8, _timeout: Duration) -> Result<u8> {
        Ok(*self.slot(slave))
    }

    fn configure_io_map(&mut self) -> Result<usize> {
        self.io_map_configs += 1;
        Ok(64)
    }

    fn start_cyclic_exchange(&mut self) -> Result<()> {
        if self.fail_cyclic_start {
            return Err(io::Error::new(io::ErrorKind::Other, "timer start failed").into());
        }
        self.cyclic_starts += 1;
        self.cyclic_running = true;
        Ok(())
    }

    fn stop_cyclic_exchange(&mut self) -> Result<()> {
        if self.fail_cyclic_stop {
            return Err(io::Error::new(io::ErrorKind::Other, "timer stop failed").into());
        }
        self.cyclic_stops += 1;
        self.cyclic_running = false;
        Ok(())
    }

    fn send_process_data(&mut self) -> Result<()> {
        Ok(())
    }

    fn receive_process_data(&mut self, _timeout: Duration) -> Result<()> {
        self.exchanges += 1;
        Ok(())
    }

    fn config_object_read(
        &mut self,
        _slave: SlavePos,
        idx: Idx,
        sub: SubIdx,
        complete_access: bool,
        byte_width: usize,
    ) -> Result<Vec<u8>> {
        self.channel_calls += 1;
        if let Some(e) = self.scripted_failure() {
            return Err(e.into());
        }
        let key = (u16::from(idx), u8::from(sub), complete_access);
        Ok(self
            .objects
            .get(&key)
            .cloned()
            .unwrap_or_else(|| vec![0; byte_width]))
    }

    fn config_object_write(
        &mut self,
        _slave: SlavePos,
        idx: Idx,
        sub: SubIdx,
        complete_access: bool,
        data: &[u8],
    ) -> Result<()> {
        self.channel_calls += 1;
        if let Some(e) = self.scripted_failure() {
            return Err(e.into());
        }
        let key = (u16::from(idx), u8::from(sub), complete_access);
        self.objects.insert(key, data.to_vec());
        Ok(())
    }

    fn process_object_read(
        &mut self,
        _slave: SlavePos,
        offset: PdoOffset,
        byte_width: usize,
    ) -> Result<Vec<u8>> {
        self.channel_calls += 1;
        if let Some(e) = self.scripted_failure() {
            return Err(e.into());
        }
        Ok(self
            .process
            .get(&usize::from(offset))
            .cloned()
            .unwrap_or_else(|| vec![0; byte_width]))
    }

    fn process_object_write(
        &mut self,
        _slave: SlavePos,
        offset: PdoOffset,
        data: &[u8],
    ) -> Result<()> {
        self.channel_calls += 1;
        if let Some(e) = self.scripted_failure() {
            return Err(e.into());
        }
        self.process.insert(usize::from(offset), data.to_vec());
        Ok(())
    }

    fn last_error(&mut self) -> Option<(u8, u32)> {
        self.error_stack.pop()
    }

    fn device_status(&mut self, _slave: SlavePos) -> u16 {
        self.status
    }

    fn slave_name(&mut self, slave: SlavePos) -> Result<String> {
        Ok(format!("MFC-{}", slave))
    }

    fn eeprom_manufacturer(&mut self, _slave: SlavePos) -> Result<u32> {
        Ok(0x0000_0C65)
    }

    fn eeprom_product(&mut self, _slave: SlavePos) -> Result<u32> {
        Ok(0x0001_A234)
    }

    fn eeprom_revision(&mut self, _slave: SlavePos) -> Result<u32> {
        Ok(0x0001_0002)
    }
}
