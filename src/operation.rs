//! Progress feedback for the programming sequence.
//!
//! Programming consists of many individual protocol transactions. Instead
//! of blocking until everything is done, [`Program`] performs one
//! transaction per iteration step and yields the number of completed steps,
//! so a front-end can drive a progress display. Use [`Operation::execute`]
//! when no feedback is needed.

use crate::error::Result;
use crate::flash::Step;
use crate::hid::HidTransport;
use crate::image::FirmwareImage;
use crate::target_handle::TargetHandle;

/// Implemented by operations that consist of many protocol transactions
/// and report progress after each one.
pub trait Operation: Iterator<Item = Result<usize>> {
    /// Total number of transactions this operation will perform.
    fn total(&self) -> usize;

    /// Runs the operation to completion, discarding progress information.
    fn execute(&mut self) -> Result<()> {
        if let Some(Err(error)) = self.last() {
            Err(error)
        } else {
            Ok(())
        }
    }
}

/// Runs a programming plan against a target, one erase or write
/// transaction per iteration step.
///
/// The iterator is fused on the first error: a failed transaction is
/// yielded and no further erase or write is attempted, leaving the device
/// exactly as the failing step left it.
pub struct Program<'d, 'a, T: HidTransport> {
    handle: &'a mut TargetHandle<T>,
    image: &'d FirmwareImage,
    steps: Vec<Step>,
    position: usize,
    done: bool,
}

impl<T: HidTransport> Operation for Program<'_, '_, T> {
    fn total(&self) -> usize {
        self.steps.len()
    }
}

impl<T: HidTransport> Iterator for Program<'_, '_, T> {
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.position >= self.steps.len() {
            self.done = true;
            return None;
        }

        let step = self.steps[self.position];
        self.position += 1;

        let result = match step {
            Step::Erase(address) => self.handle.erase(address),
            Step::Write(address) => self.handle.write_half_row(address, self.image),
        };
        Some(match result {
            Ok(()) => Ok(self.position),
            Err(error) => {
                // Ensure that the iterator is fused after an error occurs
                self.done = true;
                Err(error)
            }
        })
    }
}

impl<'d, 'a, T: HidTransport> Program<'d, 'a, T> {
    pub(crate) fn new(
        handle: &'a mut TargetHandle<T>,
        image: &'d FirmwareImage,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            handle,
            image,
            done: steps.is_empty(),
            position: 0,
            steps,
        }
    }
}
