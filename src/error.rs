use std::fmt;

use thiserror::Error;

/// Errors which can occur during target discovery, communication and
/// programming.
///
/// All of these are fatal for the running session. The bounded probe loop in
/// [`Context::wait_for_target`] is the only place where a failure is
/// retried.
///
/// [`Context::wait_for_target`]: crate::Context::wait_for_target
#[derive(Debug, Error)]
pub enum Error {
    /// The adapter did not acknowledge the I2C bus initialization command.
    #[error("I2C bridge initialization was not acknowledged")]
    BridgeInit,

    /// The adapter did not acknowledge an I2C write.
    #[error("I2C bridge write was not acknowledged")]
    BridgeWrite,

    /// One of the boot mode entry handshake steps was not echoed back. The
    /// remaining steps are skipped.
    #[error("boot mode entry failed at the {0} step")]
    BootEntry(BootStep),

    /// The INFO response contained a tag outside the known field table.
    /// Fields decoded before this point are kept, but the record must not
    /// be used for programming.
    #[error("info field {tag} at offset {offset} not recognized")]
    UnknownInfoField { tag: u8, offset: usize },

    /// The INFO response contained the retired MCU id field.
    #[error("retired MCU id info field present in response")]
    DeprecatedInfoField,

    /// A response could not be interpreted at all (e.g. a truncated INFO
    /// payload).
    #[error("malformed response from the bootloader")]
    MalformedResponse,

    /// The bootloader did not acknowledge erasing the block at this word
    /// address.
    #[error("erase of block at word address {address:#06x} failed")]
    Erase { address: u16 },

    /// The bootloader did not acknowledge writing the half-row at this word
    /// address.
    #[error("write of half-row at word address {address:#06x} failed")]
    Write { address: u16 },

    /// No bootloader adapter was found before the probe loop ran out of
    /// attempts.
    #[error("bootloader device not found")]
    DeviceNotFound,

    /// The firmware image could not be parsed.
    #[error("invalid firmware image at line {line}: {reason}")]
    ImageLoad { line: usize, reason: &'static str },

    /// An error occurred while reading the firmware image file.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An error occurred during the raw USB communication.
    #[error("USB communication error: {0}")]
    Usb(#[from] rusb::Error),
}

/// The four boot mode entry handshake steps, in the order they are
/// performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStep {
    /// Configure the reset line as an output.
    ResetConfigure,

    /// Configure the chip-select line as an output.
    ChipSelectConfigure,

    /// Drive chip-select low to request boot mode.
    ChipSelectLow,

    /// Pulse the reset line to restart the MCU into its bootloader.
    ResetPulse,
}

impl fmt::Display for BootStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BootStep::ResetConfigure => "reset-configure",
            BootStep::ChipSelectConfigure => "chip-select-configure",
            BootStep::ChipSelectLow => "chip-select-low",
            BootStep::ResetPulse => "reset-pulse",
        })
    }
}

/// Shorthand for a Result with the crate's own Error type.
pub type Result<T> = std::result::Result<T, Error>;
