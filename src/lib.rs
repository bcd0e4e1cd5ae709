//! This crate provides a way to program a PIC microcontroller through the
//! HID-I2C bootloader found on Clicker-style boards: a USB HID adapter in
//! front of the MCU tunnels I2C bus traffic inside fixed-size reports, and
//! a resident bootloader on the other end of the bus erases and rewrites
//! the application flash.
//!
//! # Example: Basic flashing
//! ```rust, no_run
//! use clickboot::{Context, FirmwareImage, Operation, Target};
//! use clickboot::{PROBE_ATTEMPTS, PROBE_INTERVAL};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Parse the firmware image
//! let mut image = FirmwareImage::from_hex_file("firmware.hex")?;
//!
//! // Wait for a board and reset it into its bootloader
//! let context = Context::new()?;
//! let hid = context.wait_for_target(PROBE_ATTEMPTS, PROBE_INTERVAL)?;
//! let mut target = Target::connect(hid)?;
//! println!("{}", target.bootloader_info);
//!
//! // Relocate the reset vector and rewrite the application flash
//! target.program(&mut image).execute()?;
//!
//! // Leave boot mode and start the application
//! target.reboot()?;
//! println!("Done!");
//! # Ok(())
//! # }
//! ```
//!
//! In addition to this very basic API, [`Target::program`] returns an
//! iterator-style [`Operation`] for progress feedback during flashing.

mod bootloader_info;
mod bridge;
mod context;
mod error;
mod flash;
mod hid;
mod image;
mod operation;
mod target;
mod target_handle;

pub use bootloader_info::{BootloaderInfo, McuFamily};
pub use context::{Context, PROBE_ATTEMPTS, PROBE_INTERVAL, PRODUCT_ID, VENDOR_ID};
pub use error::{BootStep, Error, Result};
pub use flash::{Step, HALF_ROW_WORDS};
pub use hid::{HidDevice, HidTransport, REPORT_SIZE};
pub use image::{FirmwareImage, ERASED};
pub use operation::{Operation, Program};
pub use target::Target;
pub use target_handle::TargetHandle;

/// Timeout for all USB transactions.
const TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);
