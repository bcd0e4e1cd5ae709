//! Flash geometry and the erase/write sequence.

use crate::bootloader_info::BootloaderInfo;
use crate::image::{FirmwareImage, ERASED};

/// Words per write transaction. A full write row does not fit into a single
/// 64-byte HID report together with its framing, so rows are transferred in
/// halves of 16 words.
pub const HALF_ROW_WORDS: u16 = 16;

/// Opcode of the PIC16 page-select instruction placed into the patched
/// reset vector.
const MOVLP: u8 = 0x31;

/// Byte address in the image for a word address on the device.
pub fn byte_address(word: u16) -> u32 {
    u32::from(word) * 2
}

/// Redirects the image's reset vector into the bootloader.
///
/// The application's own vector (the first two instruction words) is copied
/// to just below the bootloader, where the bootloader expects to find it
/// when chaining into the application. The vector itself is replaced with a
/// `MOVLP`/`GOTO` pair targeting `boot_start`, so the bootloader regains
/// control on every reset. The encoding is specific to the PIC16 14-bit
/// instruction set, stored low byte first.
pub fn relocate_reset_vector(image: &mut FirmwareImage, boot_start: u16) {
    let saved = byte_address(boot_start) - 4;
    for offset in 0..4 {
        image.set(saved + offset, image.get(offset));
    }

    let [low, high] = boot_start.to_le_bytes();
    image.set(0, 0x80 | high);
    image.set(1, MOVLP);
    image.set(2, low);
    image.set(3, 0x28 | (high & 0x7));
}

/// True iff the half-row starting at word address `word` is entirely in the
/// erased state.
pub fn blank_half_row(image: &FirmwareImage, word: u16) -> bool {
    let base = byte_address(word);
    (0..u32::from(HALF_ROW_WORDS) * 2).all(|offset| image.get(base + offset) == ERASED)
}

/// One transaction of the programming sequence, at a word address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Erase the erase block starting at this address.
    Erase(u16),

    /// Write the half-row starting at this address.
    Write(u16),
}

/// Lays out the complete erase/write sequence for `image`.
///
/// Blocks are erased and rewritten in ascending address order, except for
/// block 0: it holds the patched reset vector, so it is erased only after
/// every other block has been rewritten and its rows are written without
/// blank elision. Aborting between its erase and its rewrite would leave
/// the device without a way back into the bootloader, which is why nothing
/// else is scheduled in between.
pub fn program_steps(info: &BootloaderInfo, image: &FirmwareImage) -> Vec<Step> {
    let mut steps = Vec::new();

    // Application blocks above block 0, ascending.
    let last_block = info.boot_start / info.erase_block;
    for block in 1..last_block {
        steps.push(Step::Erase(block * info.erase_block));
    }

    // Their half-rows, skipping the ones the erase already left correct.
    let rows_per_block = info.erase_block / HALF_ROW_WORDS;
    let last_row = info.boot_start / HALF_ROW_WORDS;
    for row in rows_per_block..last_row {
        let address = row * HALF_ROW_WORDS;
        if !blank_half_row(image, address) {
            steps.push(Step::Write(address));
        }
    }

    // Block 0 last, rewritten in full.
    steps.push(Step::Erase(0));
    for row in 0..rows_per_block {
        steps.push(Step::Write(row * HALF_ROW_WORDS));
    }

    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(erase_block: u16, boot_start: u16) -> BootloaderInfo {
        BootloaderInfo {
            erase_block,
            boot_start,
            ..Default::default()
        }
    }

    #[test]
    fn reset_vector_is_saved_below_the_bootloader() {
        let mut image = FirmwareImage::new();
        for (address, value) in [(0, 0xaa), (1, 0xbb), (2, 0xcc), (3, 0xdd)] {
            image.set(address, value);
        }

        relocate_reset_vector(&mut image, 0x0e00);

        // Original vector moved to boot_start * 2 - 4.
        assert_eq!(image.get(0x1bfc), 0xaa);
        assert_eq!(image.get(0x1bfd), 0xbb);
        assert_eq!(image.get(0x1bfe), 0xcc);
        assert_eq!(image.get(0x1bff), 0xdd);

        // MOVLP 0x0e, GOTO 0x600 -> jump to word 0x0e00.
        assert_eq!(image.get(0), 0x8e);
        assert_eq!(image.get(1), 0x31);
        assert_eq!(image.get(2), 0x00);
        assert_eq!(image.get(3), 0x2e);
    }

    #[test]
    fn blank_detection_requires_every_byte_erased() {
        let mut image = FirmwareImage::new();
        assert!(blank_half_row(&image, 0x40));

        // A single programmed byte anywhere in the 32-byte range forces a
        // write, even at the very end.
        image.set(byte_address(0x40) + 31, 0x00);
        assert!(!blank_half_row(&image, 0x40));
        assert!(blank_half_row(&image, 0x50));
    }

    #[test]
    fn erase_order_is_ascending_with_block_zero_last() {
        let image = FirmwareImage::new();
        let steps = program_steps(&info(64, 640), &image);
        let erases: Vec<u16> = steps
            .iter()
            .filter_map(|step| match step {
                Step::Erase(address) => Some(*address),
                Step::Write(_) => None,
            })
            .collect();
        assert_eq!(erases, [64, 128, 192, 256, 320, 384, 448, 512, 576, 0]);
    }

    #[test]
    fn blank_rows_are_elided_outside_block_zero() {
        let mut image = FirmwareImage::new();
        // One programmed byte in the row at word 0x60; everything else
        // blank.
        image.set(byte_address(0x60), 0x12);

        let steps = program_steps(&info(64, 640), &image);
        let writes: Vec<u16> = steps
            .iter()
            .filter_map(|step| match step {
                Step::Write(address) => Some(*address),
                Step::Erase(_) => None,
            })
            .collect();

        // The single non-blank application row, then all four rows of block
        // 0 regardless of content.
        assert_eq!(writes, [0x60, 0, 16, 32, 48]);
    }

    #[test]
    fn block_zero_is_erased_after_all_writes_above_it() {
        let mut image = FirmwareImage::new();
        image.set(byte_address(0x100), 0x01);
        let steps = program_steps(&info(64, 640), &image);

        let erase_zero = steps.iter().position(|step| *step == Step::Erase(0));
        let last_app_write = steps
            .iter()
            .rposition(|step| matches!(step, Step::Write(address) if *address >= 64));
        assert!(erase_zero > last_app_write);
    }
}
