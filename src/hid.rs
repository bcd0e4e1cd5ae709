//! Raw USB HID transport to the adapter.
//!
//! The adapter exposes a vendor HID interface with one interrupt endpoint
//! per direction and a fixed report size. Everything above this module is
//! expressed in terms of [`HidTransport`], so the protocol and programming
//! layers can be driven by a scripted transport in tests.

use rusb::DeviceHandle;

use crate::error::Result;
use crate::TIMEOUT;

/// Size of a single HID report, in bytes. All adapter traffic consists of
/// exactly one report per transfer.
pub const REPORT_SIZE: usize = 64;

/// Interrupt OUT endpoint of the adapter's HID interface.
const ENDPOINT_OUT: u8 = 0x01;

/// Interrupt IN endpoint of the adapter's HID interface.
const ENDPOINT_IN: u8 = 0x81;

/// Sends and receives fixed-size HID reports.
pub trait HidTransport {
    /// Sends one report. Payloads shorter than [`REPORT_SIZE`] are padded
    /// with zeroes.
    fn write_report(&mut self, data: &[u8]) -> Result<()>;

    /// Receives one report into `buffer` and returns the number of bytes
    /// read.
    fn read_report(&mut self, buffer: &mut [u8]) -> Result<usize>;
}

impl<T: HidTransport> HidTransport for &mut T {
    fn write_report(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_report(data)
    }

    fn read_report(&mut self, buffer: &mut [u8]) -> Result<usize> {
        (**self).read_report(buffer)
    }
}

/// An open handle to the adapter's HID interface.
pub struct HidDevice {
    usb_device_handle: DeviceHandle<rusb::Context>,
}

impl HidDevice {
    /// Claims the HID interface of an opened USB device. The kernel HID
    /// driver is detached first where the platform supports it.
    pub(crate) fn claim(mut usb_device_handle: DeviceHandle<rusb::Context>) -> Result<Self> {
        match usb_device_handle.set_auto_detach_kernel_driver(true) {
            Ok(()) | Err(rusb::Error::NotSupported) => {}
            Err(error) => return Err(error.into()),
        }
        usb_device_handle.claim_interface(0)?;
        Ok(Self { usb_device_handle })
    }
}

impl HidTransport for HidDevice {
    fn write_report(&mut self, data: &[u8]) -> Result<()> {
        debug_assert!(data.len() <= REPORT_SIZE);
        let mut report = [0u8; REPORT_SIZE];
        report[..data.len()].copy_from_slice(data);
        self.usb_device_handle
            .write_interrupt(ENDPOINT_OUT, &report, TIMEOUT)?;
        Ok(())
    }

    fn read_report(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let read = self
            .usb_device_handle
            .read_interrupt(ENDPOINT_IN, buffer, TIMEOUT)?;
        Ok(read)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! A scripted stand-in for the adapter, for driving the protocol and
    //! programming layers without hardware.

    use std::collections::VecDeque;

    use super::{HidTransport, REPORT_SIZE};
    use crate::bridge::{CMD_I2C_READ, CMD_I2C_WRITE};
    use crate::error::Result;

    /// Records every written report and answers reads like a well-behaved
    /// board: adapter commands are echoed, bootloader commands are
    /// acknowledged. Individual replies can be overridden.
    pub struct MockHid {
        /// Every report sent so far, without padding.
        pub written: Vec<Vec<u8>>,

        /// Replies consumed before any synthesized ones.
        pub replies: VecDeque<Vec<u8>>,

        /// Zero-based index of the bootloader command whose acknowledgment
        /// is corrupted.
        pub nack_command: Option<usize>,

        /// Adapter opcode whose echo byte is corrupted.
        pub bad_echo: Option<u8>,

        last_command: u8,
        commands_seen: usize,
        corrupt_current: bool,
    }

    impl MockHid {
        pub fn new() -> Self {
            Self {
                written: Vec::new(),
                replies: VecDeque::new(),
                nack_command: None,
                bad_echo: None,
                last_command: 0,
                commands_seen: 0,
                corrupt_current: false,
            }
        }

        /// Queues a verbatim reply for the next read.
        pub fn queue_reply(&mut self, reply: &[u8]) {
            self.replies.push_back(reply.to_vec());
        }

        /// All bootloader command payloads written through the I2C bridge,
        /// in order (command code and arguments, without the bridge
        /// framing).
        pub fn command_payloads(&self) -> Vec<Vec<u8>> {
            self.written
                .iter()
                .filter(|report| report.first() == Some(&CMD_I2C_WRITE))
                .map(|report| report[3..].to_vec())
                .collect()
        }
    }

    impl HidTransport for MockHid {
        fn write_report(&mut self, data: &[u8]) -> Result<()> {
            if data.first() == Some(&CMD_I2C_WRITE) {
                self.last_command = data[3];
                self.corrupt_current = self.nack_command == Some(self.commands_seen);
                self.commands_seen += 1;
            }
            self.written.push(data.to_vec());
            Ok(())
        }

        fn read_report(&mut self, buffer: &mut [u8]) -> Result<usize> {
            if let Some(reply) = self.replies.pop_front() {
                let length = reply.len().min(buffer.len());
                buffer[..length].copy_from_slice(&reply[..length]);
                return Ok(length);
            }

            for byte in buffer.iter_mut() {
                *byte = 0;
            }
            let last = self.written.last().expect("read without prior write");
            match last[0] {
                CMD_I2C_READ => {
                    buffer[0] = CMD_I2C_READ;
                    buffer[1] = if self.corrupt_current {
                        !self.last_command
                    } else {
                        self.last_command
                    };
                }
                opcode if self.bad_echo == Some(opcode) => buffer[0] = !opcode,
                opcode => buffer[0] = opcode,
            }
            Ok(buffer.len().min(REPORT_SIZE))
        }
    }
}
