//! Finding and opening the HID adapter.

use std::thread;
use std::time::Duration;

use rusb::UsbContext;

use crate::error::{Error, Result};
use crate::hid::HidDevice;

/// USB vendor id of the HID adapter (Microchip).
pub const VENDOR_ID: u16 = 0x04d8;

/// USB product id of the Clicker-style adapter.
pub const PRODUCT_ID: u16 = 0x003f;

/// Default number of probe attempts while waiting for a board.
pub const PROBE_ATTEMPTS: usize = 20;

/// Default pause between probe attempts.
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Entry point for device discovery.
pub struct Context {
    usb_context: rusb::Context,
}

impl Context {
    pub fn new() -> Result<Self> {
        Ok(Context {
            usb_context: rusb::Context::new()?,
        })
    }

    /// Checks for adapter presence with a direct open/close attempt.
    pub fn probe(&self) -> bool {
        self.open().is_ok()
    }

    /// Opens the adapter's HID interface.
    pub fn open(&self) -> Result<HidDevice> {
        match self
            .usb_context
            .open_device_with_vid_pid(VENDOR_ID, PRODUCT_ID)
        {
            Some(handle) => HidDevice::claim(handle),
            None => Err(Error::DeviceNotFound),
        }
    }

    /// Keeps probing until an adapter shows up.
    ///
    /// Sleeps `interval` between attempts and gives up with
    /// [`Error::DeviceNotFound`] after `attempts` failed probes. This
    /// bounded loop is the only retry behavior in the crate; everything
    /// after a successful open fails fast.
    pub fn wait_for_target(&self, attempts: usize, interval: Duration) -> Result<HidDevice> {
        retry(attempts, interval, || self.open())
    }
}

// Bounded blocking retry loop. Succeeds on the first attempt that does,
// sleeps only between attempts.
fn retry<T>(
    attempts: usize,
    interval: Duration,
    mut operation: impl FnMut() -> Result<T>,
) -> Result<T> {
    for attempt in 1..=attempts {
        match operation() {
            Ok(value) => return Ok(value),
            Err(error) => log::debug!("probe {}/{} failed: {}", attempt, attempts, error),
        }
        if attempt < attempts {
            log::info!("no board found, reset it and keep waiting");
            thread::sleep(interval);
        }
    }
    Err(Error::DeviceNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_gives_up_after_the_configured_number_of_attempts() {
        let mut calls = 0;
        let result: Result<()> = retry(5, Duration::ZERO, || {
            calls += 1;
            Err(Error::DeviceNotFound)
        });
        assert!(matches!(result, Err(Error::DeviceNotFound)));
        assert_eq!(calls, 5);
    }

    #[test]
    fn retry_stops_probing_on_first_success() {
        let mut calls = 0;
        let result = retry(10, Duration::ZERO, || {
            calls += 1;
            if calls == 3 {
                Ok(calls)
            } else {
                Err(Error::DeviceNotFound)
            }
        });
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn retry_with_zero_attempts_fails_immediately() {
        let result: Result<()> = retry(0, Duration::ZERO, || panic!("must not probe"));
        assert!(matches!(result, Err(Error::DeviceNotFound)));
    }
}
