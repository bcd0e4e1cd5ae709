//! Contains data structures for information the bootloader reports back to
//! the connecting PC.
//!
//! The INFO response carries a stream of tagged fields. Tags occupy the
//! same 16-bit little-endian cell as command codes; the payload width is
//! fixed per tag. Decoding walks the stream front to back and fails fast on
//! anything outside the known table.

use std::fmt;

use crate::error::{Error, Result};

/// MCU families the bootloader protocol can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McuFamily {
    Pic16,
    Pic18,
    Pic18Fj,
    Pic24,
    DsPic,
    Pic32,

    /// Family code missing from the known table. Reported, but not fatal.
    Unknown(u8),
}

impl From<u8> for McuFamily {
    fn from(code: u8) -> Self {
        match code {
            1 => McuFamily::Pic16,
            2 => McuFamily::Pic18,
            3 => McuFamily::Pic18Fj,
            4 => McuFamily::Pic24,
            10 => McuFamily::DsPic,
            20 => McuFamily::Pic32,
            code => McuFamily::Unknown(code),
        }
    }
}

impl Default for McuFamily {
    fn default() -> Self {
        McuFamily::Unknown(0)
    }
}

impl fmt::Display for McuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McuFamily::Pic16 => f.write_str("PIC16"),
            McuFamily::Pic18 => f.write_str("PIC18"),
            McuFamily::Pic18Fj => f.write_str("PIC18FJ"),
            McuFamily::Pic24 => f.write_str("PIC24"),
            McuFamily::DsPic => f.write_str("dsPIC"),
            McuFamily::Pic32 => f.write_str("PIC32"),
            McuFamily::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

// Info field tags, in the order the bootloader usually sends them.
const TAG_MCU_FAMILY: u8 = 1;
const TAG_MCU_ID: u8 = 2;
const TAG_ERASE_BLOCK: u8 = 3;
const TAG_WRITE_BLOCK: u8 = 4;
const TAG_REVISION: u8 = 5;
const TAG_BOOT_START: u8 = 6;
const TAG_DESCRIPTION: u8 = 7;
const TAG_FLASH_SIZE: u8 = 8;

/// Width of the fixed-size device description field.
const DESCRIPTION_LENGTH: usize = 10;

/// Capability record read back from the bootloader.
///
/// Populated once right after connecting and read-only afterwards. All
/// sizes and addresses are in words; byte addresses in the firmware image
/// are twice the word address.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootloaderInfo {
    /// Family of the target MCU.
    pub mcu_family: McuFamily,

    /// Total flash size, in words.
    pub flash_size: u16,

    /// Words per flash erase block.
    pub erase_block: u16,

    /// Words per flash write block.
    pub write_block: u16,

    /// Bootloader firmware revision, informational.
    pub revision: u16,

    /// Word address where the bootloader resides. All application code lies
    /// below this address; it must be a multiple of both the erase block
    /// size and the write transaction size (assumed, not re-checked).
    pub boot_start: u16,

    /// Fixed-width ASCII device description.
    pub device_description: String,
}

impl BootloaderInfo {
    /// Decodes an INFO reply into a fresh record.
    pub fn decode(reply: &[u8]) -> Result<Self> {
        let mut info = Self::default();
        info.decode_into(reply)?;
        Ok(info)
    }

    /// Decodes an INFO reply field by field into `self`.
    ///
    /// On failure, the fields decoded before the offending position are
    /// left in place; such a partial record must not be used for
    /// programming.
    pub fn decode_into(&mut self, reply: &[u8]) -> Result<()> {
        // Byte 2 holds the total response size; the tag stream starts at
        // byte 4.
        let total = *reply.get(2).ok_or(Error::MalformedResponse)? as usize;
        if total > reply.len() {
            return Err(Error::MalformedResponse);
        }

        let mut index = 4;
        while index < total {
            let tag = reply[index];
            let data = index + 2;
            index = match tag {
                TAG_MCU_FAMILY => {
                    self.mcu_family = McuFamily::from(byte_field(reply, data)?);
                    if let McuFamily::Unknown(code) = self.mcu_family {
                        log::warn!("MCU family code {} not recognized", code);
                    }
                    data + 1
                }
                TAG_MCU_ID => return Err(Error::DeprecatedInfoField),
                TAG_ERASE_BLOCK => {
                    self.erase_block = word_field(reply, data)?;
                    data + 2
                }
                TAG_WRITE_BLOCK => {
                    self.write_block = word_field(reply, data)?;
                    data + 2
                }
                TAG_REVISION => {
                    self.revision = word_field(reply, data)?;
                    data + 2
                }
                TAG_BOOT_START => {
                    self.boot_start = word_field(reply, data)?;
                    data + 2
                }
                TAG_DESCRIPTION => {
                    let bytes = reply
                        .get(data..data + DESCRIPTION_LENGTH)
                        .ok_or(Error::MalformedResponse)?;
                    self.device_description = String::from_utf8_lossy(bytes).into_owned();
                    data + DESCRIPTION_LENGTH
                }
                TAG_FLASH_SIZE => {
                    self.flash_size = word_field(reply, data)?;
                    data + 2
                }
                tag => return Err(Error::UnknownInfoField { tag, offset: index }),
            };
        }
        Ok(())
    }
}

impl fmt::Display for BootloaderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MCU family: {}", self.mcu_family)?;
        writeln!(f, "Device: {}", self.device_description.trim_end())?;
        writeln!(f, "Flash size: {} words", self.flash_size)?;
        writeln!(f, "Erase block: {} words", self.erase_block)?;
        writeln!(f, "Write block: {} words", self.write_block)?;
        writeln!(f, "Bootloader revision: {:#06x}", self.revision)?;
        writeln!(f, "Bootloader start: {:#06x}", self.boot_start)
    }
}

fn byte_field(reply: &[u8], index: usize) -> Result<u8> {
    reply.get(index).copied().ok_or(Error::MalformedResponse)
}

fn word_field(reply: &[u8], index: usize) -> Result<u16> {
    let bytes = reply
        .get(index..index + 2)
        .ok_or(Error::MalformedResponse)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}
