// Part of ecat-conformance. Copyright 2019-2022 by the authors.
// This work is dual-licensed under Apache 2.0 and MIT terms.

//! Seam to the frame-level master engine. Everything below this trait
//! (frame construction, mailbox handling, adapter I/O, slave discovery)
//! is outside this crate; implementations wrap whatever engine drives the
//! wire and surface OS failures as `io::Error`.

use crate::types::{Idx, PdoOffset, Result, SlavePos, SubIdx};
use derive_new::new;
use std::time::Duration;

/// A network adapter the engine can open.
#[derive(Debug, Clone, new)]
pub struct Adapter {
    pub name: String,
    pub desc: String,
}

/// Blocking primitives of the underlying fieldbus engine. One operation is
/// in flight at a time; every method takes `&mut self` and returns only on
/// completion or timeout.
pub trait Transport {
    /// Opens the network on the given adapter and discovers the slaves.
    /// Returns the slave count.
    fn open(&mut self, adapter: &str) -> Result<u32>;

    fn close(&mut self) -> Result<()>;

    /// Raw state code of a slave, error flag included.
    fn get_state(&mut self, slave: SlavePos) -> Result<u8>;

    /// Requests a state; does not wait for the device to follow.
    fn set_state(&mut self, slave: SlavePos, code: u8) -> Result<()>;

    /// Blocks up to `timeout` for the slave to reach `target`, returning
    /// the state code actually observed afterwards.
    fn state_check(&mut self, slave: SlavePos, target: u8, timeout: Duration) -> Result<u8>;

    /// (Re)computes the host-side process image layout. Idempotent.
    /// Returns the image size in bytes.
    fn configure_io_map(&mut self) -> Result<usize>;

    fn start_cyclic_exchange(&mut self) -> Result<()>;

    fn stop_cyclic_exchange(&mut self) -> Result<()>;

    fn send_process_data(&mut self) -> Result<()>;

    fn receive_process_data(&mut self, timeout: Duration) -> Result<()>;

    /// Reads up to `byte_width` bytes of a configuration object. With
    /// `complete_access` the whole object is transferred in one request
    /// and the subindex is ignored by the device.
    fn config_object_read(
        &mut self,
        slave: SlavePos,
        idx: Idx,
        sub: SubIdx,
        complete_access: bool,
        byte_width: usize,
    ) -> Result<Vec<u8>>;

    fn config_object_write(
        &mut self,
        slave: SlavePos,
        idx: Idx,
        sub: SubIdx,
        complete_access: bool,
        data: &[u8],
    ) -> Result<()>;

    /// Reads `byte_width` bytes of the process image at a mapped offset.
    fn process_object_read(
        &mut self,
        slave: SlavePos,
        offset: PdoOffset,
        byte_width: usize,
    ) -> Result<Vec<u8>>;

    fn process_object_write(&mut self, slave: SlavePos, offset: PdoOffset, data: &[u8])
        -> Result<()>;

    /// Pops the most recent entry off the engine's error stack as
    /// `(error type, error code)`. `None` if the stack is empty.
    fn last_error(&mut self) -> Option<(u8, u32)>;

    /// AL status code of the slave, as kept by the engine's slave table.
    fn device_status(&mut self, slave: SlavePos) -> u16;

    fn slave_name(&mut self, slave: SlavePos) -> Result<String>;

    fn eeprom_manufacturer(&mut self, slave: SlavePos) -> Result<u32>;

    fn eeprom_product(&mut self, slave: SlavePos) -> Result<u32>;

    fn eeprom_revision(&mut self, slave: SlavePos) -> Result<u32>;
}
