//! Low-level communication with the bootloader: command framing, the boot
//! mode entry handshake and acknowledgment handling.

use crate::bootloader_info::BootloaderInfo;
use crate::bridge::{self, Bridge};
use crate::error::{BootStep, Error, Result};
use crate::flash::{byte_address, HALF_ROW_WORDS};
use crate::hid::HidTransport;
use crate::image::FirmwareImage;

/// Number of reply bytes requested from the bootloader for every
/// acknowledgment and info read.
const REPLY_LENGTH: u8 = 50;

/// Commands understood by the HID-I2C bootloader. See the protocol
/// description in the bootloader firmware for details about each command.
///
/// A command frame is `<CMD:2><ADDRESS:2><COUNT:2><DATA:COUNT>` with the
/// address, count and data fields present only where a command calls for
/// them; all multi-byte fields are little-endian. Acknowledgments echo the
/// command code in the second reply byte, except for [`Info`] (the reply
/// body is the info payload itself) and [`Reboot`] (no reply at all).
///
/// [`Info`]: Command::Info
/// [`Reboot`]: Command::Reboot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Sync = 1,
    Info = 2,
    /// Listed in the bootloader's command table, but entry into boot mode
    /// is performed through the reset handshake instead.
    #[allow(dead_code)]
    Boot = 3,
    Reboot = 4,
    Write = 11,
    Erase = 21,
}

/// Owns the open adapter connection and performs raw bootloader commands.
///
/// Every operation is a single synchronous request/response exchange;
/// nothing here sequences commands or retries. That is [`Target`]'s job.
///
/// [`Target`]: crate::Target
pub struct TargetHandle<T: HidTransport> {
    bridge: Bridge<T>,
}

impl<T: HidTransport> TargetHandle<T> {
    pub fn new(hid: T) -> Self {
        Self {
            bridge: Bridge::new(hid),
        }
    }

    /// Resets the MCU into its bootloader.
    ///
    /// The bootloader is not listening on I2C yet, so the four handshake
    /// steps talk straight to the adapter: configure the reset line,
    /// configure chip-select, drive chip-select low, pulse reset. Each step
    /// must echo its opcode back; a mismatch aborts with the remaining
    /// steps skipped.
    pub fn enter_boot_mode(&mut self) -> Result<()> {
        let steps: [(&[u8], BootStep); 4] = [
            (&[bridge::CMD_RST_CONFIGURE], BootStep::ResetConfigure),
            (&[bridge::CMD_CS_CONFIGURE], BootStep::ChipSelectConfigure),
            (&[bridge::CMD_CS_WRITE, 0], BootStep::ChipSelectLow),
            (&[bridge::CMD_RST_PULSE], BootStep::ResetPulse),
        ];
        for (command, step) in steps {
            if self.bridge.control(command)? != command[0] {
                return Err(Error::BootEntry(step));
            }
        }
        Ok(())
    }

    /// Initializes the adapter's I2C peripheral.
    pub fn init_i2c(&mut self) -> Result<()> {
        self.bridge.init()
    }

    /// Synchronizes with the bootloader. Acknowledged upon reception.
    pub fn sync(&mut self) -> Result<()> {
        self.send(Command::Sync, &[])?;
        let reply = self.bridge.read(REPLY_LENGTH)?;
        if reply[1] == Command::Sync as u8 {
            Ok(())
        } else {
            Err(Error::MalformedResponse)
        }
    }

    /// Queries the bootloader's capability record.
    ///
    /// INFO is the one command without an acknowledgment byte; the reply
    /// body is the tagged info payload itself.
    pub fn bootloader_info(&mut self) -> Result<BootloaderInfo> {
        self.send(Command::Info, &[])?;
        let reply = self.bridge.read(REPLY_LENGTH)?;
        BootloaderInfo::decode(&reply)
    }

    /// Erases one erase block starting at the given word address.
    ///
    /// An acknowledgment mismatch is fatal for the programming run; flash
    /// erase cannot be rolled back.
    pub fn erase(&mut self, address: u16) -> Result<()> {
        log::debug!("erase block at {:#06x}", address);
        let mut args = [0u8; 4];
        args[..2].copy_from_slice(&address.to_le_bytes());
        args[2..].copy_from_slice(&1u16.to_le_bytes()); // block count
        self.send(Command::Erase, &args)?;
        let reply = self.bridge.read(REPLY_LENGTH)?;
        if reply[1] == Command::Erase as u8 {
            Ok(())
        } else {
            Err(Error::Erase { address })
        }
    }

    /// Writes one half-row of 16 words from the image, starting at the
    /// given word address. The flash row must already be erased.
    pub fn write_half_row(&mut self, address: u16, image: &FirmwareImage) -> Result<()> {
        log::debug!("write half-row at {:#06x}", address);
        let mut args = Vec::with_capacity(4 + usize::from(HALF_ROW_WORDS) * 2);
        args.extend_from_slice(&address.to_le_bytes());
        args.extend_from_slice(&HALF_ROW_WORDS.to_le_bytes());
        let base = byte_address(address);
        for offset in 0..u32::from(HALF_ROW_WORDS) * 2 {
            args.push(image.get(base + offset));
        }
        self.send(Command::Write, &args)?;
        let reply = self.bridge.read(REPLY_LENGTH)?;
        if reply[1] == Command::Write as u8 {
            Ok(())
        } else {
            Err(Error::Write { address })
        }
    }

    /// Takes the MCU out of boot mode and restarts it into the
    /// application.
    ///
    /// Chip-select is driven high again first; REBOOT itself is never
    /// acknowledged, and the connection is closed afterwards.
    pub fn reboot(mut self) -> Result<()> {
        if self.bridge.control(&[bridge::CMD_CS_WRITE, 1])? != bridge::CMD_CS_WRITE {
            log::warn!("chip-select release was not acknowledged");
        }
        self.send(Command::Reboot, &[])
    }

    // Frames a command and pushes it through the I2C bridge.
    fn send(&mut self, command: Command, args: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(2 + args.len());
        payload.extend_from_slice(&(command as u16).to_le_bytes());
        payload.extend_from_slice(args);
        self.bridge.write(&payload)
    }
}
