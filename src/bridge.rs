//! I2C bus access tunneled through the HID adapter.
//!
//! The adapter firmware understands a small set of single-byte
//! sub-commands: three for the I2C peripheral and four for the reset and
//! chip-select pins wired to the target MCU. Every operation is exactly one
//! HID write followed by one HID read; the first reply byte echoes the
//! sub-command on success. There is no batching and no retrying at this
//! layer.

use crate::error::{Error, Result};
use crate::hid::{HidTransport, REPORT_SIZE};

/// Adapter sub-command: configure the I2C peripheral.
pub(crate) const CMD_I2C_INIT: u8 = 0x20;

/// Adapter sub-command: read bytes from an I2C slave.
pub(crate) const CMD_I2C_READ: u8 = 0x21;

/// Adapter sub-command: write bytes to an I2C slave.
pub(crate) const CMD_I2C_WRITE: u8 = 0x22;

/// Adapter sub-command: configure the reset line as an output.
pub(crate) const CMD_RST_CONFIGURE: u8 = 0x10;

/// Adapter sub-command: pulse the reset line.
pub(crate) const CMD_RST_PULSE: u8 = 0x11;

/// Adapter sub-command: configure the chip-select line as an output.
pub(crate) const CMD_CS_CONFIGURE: u8 = 0x14;

/// Adapter sub-command: drive the chip-select line to a level.
pub(crate) const CMD_CS_WRITE: u8 = 0x16;

/// I2C address the bootloader answers reads on.
pub(crate) const DEV_READ: u8 = 0x91;

/// I2C address the bootloader accepts writes on.
pub(crate) const DEV_WRITE: u8 = 0x90;

/// I2C bus master backed by the HID adapter.
pub struct Bridge<T: HidTransport> {
    hid: T,
}

impl<T: HidTransport> Bridge<T> {
    pub fn new(hid: T) -> Self {
        Self { hid }
    }

    /// Configures the adapter's I2C peripheral. Required once before any
    /// bus traffic.
    pub fn init(&mut self) -> Result<()> {
        if self.exchange(&[CMD_I2C_INIT])? == CMD_I2C_INIT {
            Ok(())
        } else {
            Err(Error::BridgeInit)
        }
    }

    /// Writes a byte sequence to the bootloader's I2C write address.
    pub fn write(&mut self, payload: &[u8]) -> Result<()> {
        let mut report = Vec::with_capacity(3 + payload.len());
        report.push(CMD_I2C_WRITE);
        report.push(DEV_WRITE);
        report.push(payload.len() as u8);
        report.extend_from_slice(payload);
        if self.exchange(&report)? == CMD_I2C_WRITE {
            Ok(())
        } else {
            Err(Error::BridgeWrite)
        }
    }

    /// Reads back up to `max_length` bytes from the bootloader's I2C read
    /// address. The reply report is returned verbatim, echoed sub-command
    /// byte included; interpreting its content is the caller's job.
    pub fn read(&mut self, max_length: u8) -> Result<[u8; REPORT_SIZE]> {
        self.hid.write_report(&[CMD_I2C_READ, DEV_READ, max_length])?;
        let mut reply = [0u8; REPORT_SIZE];
        self.hid.read_report(&mut reply)?;
        log::trace!("i2c read <- {:02x?}", &reply[..8]);
        Ok(reply)
    }

    /// Sends a pin-control command and returns the first reply byte without
    /// interpreting it. The boot mode entry handshake runs over this before
    /// the bootloader is listening on I2C.
    pub fn control(&mut self, command: &[u8]) -> Result<u8> {
        self.exchange(command)
    }

    // One HID write followed by one HID read; the first reply byte carries
    // the adapter's echo of the sub-command.
    fn exchange(&mut self, report: &[u8]) -> Result<u8> {
        log::trace!("adapter -> {:02x?}", report);
        self.hid.write_report(report)?;
        let mut reply = [0u8; REPORT_SIZE];
        self.hid.read_report(&mut reply)?;
        Ok(reply[0])
    }
}
