//! A connected target whose bootloader is active.

use crate::bootloader_info::BootloaderInfo;
use crate::error::Result;
use crate::flash;
use crate::hid::HidTransport;
use crate::image::FirmwareImage;
use crate::operation::Program;
use crate::target_handle::TargetHandle;

/// A target in boot mode with its capabilities known.
///
/// Constructing one runs the complete connection sequence; afterwards the
/// session only moves forward. Any failure along the way is terminal -
/// there is no reconnect or partial retry, only the outer probe loop in
/// [`Context`] ever tries again.
///
/// [`Context`]: crate::Context
pub struct Target<T: HidTransport> {
    /// Handle for the low-level communication.
    handle: TargetHandle<T>,

    /// Capability record decoded during connection, read-only afterwards.
    pub bootloader_info: BootloaderInfo,
}

impl<T: HidTransport> Target<T> {
    /// Resets the MCU into its bootloader, brings up the I2C bridge and
    /// fetches the capability record.
    pub fn connect(hid: T) -> Result<Self> {
        let mut handle = TargetHandle::new(hid);
        handle.enter_boot_mode()?;
        handle.init_i2c()?;
        log::info!("I2C bridge initialized");
        let bootloader_info = handle.bootloader_info()?;
        log::info!(
            "connected to a {} bootloader, revision {:#06x}",
            bootloader_info.mcu_family,
            bootloader_info.revision
        );
        Ok(Self {
            handle,
            bootloader_info,
        })
    }

    /// Prepares programming `image` into the application flash.
    ///
    /// The image's reset vector is relocated so the bootloader regains
    /// control on subsequent boots, then the erase/write sequence is laid
    /// out. The returned [`Program`] performs one transaction per
    /// iteration step; call [`Operation::execute`] to run it to
    /// completion.
    ///
    /// [`Operation::execute`]: crate::Operation::execute
    pub fn program<'d>(&mut self, image: &'d mut FirmwareImage) -> Program<'d, '_, T> {
        flash::relocate_reset_vector(image, self.bootloader_info.boot_start);
        let steps = flash::program_steps(&self.bootloader_info, image);
        log::info!("programming {} transactions", steps.len());
        Program::new(&mut self.handle, image, steps)
    }

    /// Restarts the MCU into the freshly programmed application and closes
    /// the session.
    pub fn reboot(self) -> Result<()> {
        log::info!("rebooting the MCU");
        self.handle.reboot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mock::MockHid;
    use crate::operation::Operation;

    // INFO reply for a PIC16 with 32-word erase blocks and the bootloader
    // at word 0x0e00.
    fn info_reply() -> Vec<u8> {
        let mut reply = vec![
            0x21, 0, 19, 0, // echo, pad, size, pad
            1, 0, 1, // family PIC16
            3, 0, 32, 0, // erase block
            6, 0, 0x00, 0x0e, // boot start
            8, 0, 0x00, 0x10, // flash size
        ];
        reply.resize(64, 0);
        reply
    }

    fn connect(hid: &mut MockHid) -> Target<&mut MockHid> {
        hid.queue_reply(&[0x10]); // handshake echoes
        hid.queue_reply(&[0x14]);
        hid.queue_reply(&[0x16]);
        hid.queue_reply(&[0x11]);
        hid.queue_reply(&[0x20]); // bridge init echo
        hid.queue_reply(&[0x22]); // INFO command write echo
        hid.queue_reply(&info_reply());
        Target::connect(hid).unwrap()
    }

    #[test]
    fn connect_runs_handshake_bridge_init_and_info() {
        let mut hid = MockHid::new();
        let target = connect(&mut hid);
        assert_eq!(target.bootloader_info.boot_start, 0x0e00);
        assert_eq!(target.bootloader_info.erase_block, 32);
        drop(target);

        // Raw handshake, I2C init, then the INFO exchange.
        assert_eq!(hid.written[0], vec![0x10]);
        assert_eq!(hid.written[4], vec![0x20]);
        assert_eq!(hid.command_payloads(), vec![vec![2, 0]]);
    }

    #[test]
    fn program_patches_the_vector_and_runs_the_full_sequence() {
        let mut hid = MockHid::new();
        let mut target = connect(&mut hid);

        let mut image = FirmwareImage::new();
        image.set(0, 0x12);
        image.set(1, 0x34);

        target.program(&mut image).execute().unwrap();

        // The vector was relocated before any transaction was issued.
        assert_eq!(image.get(0x1bfc), 0x12);
        assert_eq!(image.get(0x1bfd), 0x34);
        assert_eq!(image.get(0), 0x8e);
        assert_eq!(image.get(1), 0x31);

        drop(target);
        // boot_start/erase_block - 1 erases, then block 0: erase plus its
        // two half-rows, one INFO command up front.
        let commands: Vec<u8> = hid
            .command_payloads()
            .iter()
            .map(|payload| payload[0])
            .collect();
        assert_eq!(commands[0], 2);
        assert_eq!(commands.iter().filter(|&&code| code == 21).count(), 112);
        assert_eq!(commands.iter().filter(|&&code| code == 11).count(), 3);
    }
}
