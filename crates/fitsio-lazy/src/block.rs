/// FITS logical record size in bytes.
pub const BLOCK_SIZE: usize = 2880;

/// FITS card (keyword record) size in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of cards that fit in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Padding byte used for header blocks (ASCII space).
pub const HEADER_PAD_BYTE: u8 = 0x20;

/// Padding byte used for data blocks (zero).
pub const DATA_PAD_BYTE: u8 = 0x00;

/// Returns the number of FITS blocks required to hold `num_bytes` bytes.
pub const fn blocks_needed(num_bytes: u64) -> u64 {
    num_bytes.div_ceil(BLOCK_SIZE as u64)
}

/// Returns `num_bytes` rounded up to a whole number of blocks.
///
/// Data segments in a FITS stream are always followed by enough padding to
/// reach the next block boundary, so this is also the distance from the
/// start of one HDU's data to the next HDU's header.
pub const fn padded_byte_len(num_bytes: u64) -> u64 {
    blocks_needed(num_bytes) * BLOCK_SIZE as u64
}

/// Appends `pad_byte` to `buf` until its length is a multiple of [`BLOCK_SIZE`].
pub fn pad_to_block(buf: &mut alloc::vec::Vec<u8>, pad_byte: u8) {
    let target = padded_byte_len(buf.len() as u64) as usize;
    buf.resize(target, pad_byte);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn blocks_needed_boundaries() {
        assert_eq!(blocks_needed(0), 0);
        assert_eq!(blocks_needed(1), 1);
        assert_eq!(blocks_needed(2880), 1);
        assert_eq!(blocks_needed(2881), 2);
        assert_eq!(blocks_needed(5761), 3);
    }

    #[test]
    fn padded_byte_len_rounds_up() {
        assert_eq!(padded_byte_len(0), 0);
        assert_eq!(padded_byte_len(1), 2880);
        assert_eq!(padded_byte_len(3200), 5760);
    }

    #[test]
    fn constant_relationships() {
        assert_eq!(CARDS_PER_BLOCK, 36);
        assert_eq!(CARDS_PER_BLOCK * CARD_SIZE, BLOCK_SIZE);
    }

    #[test]
    fn pad_to_block_fills_with_pad_byte() {
        let mut buf = vec![1u8; 100];
        pad_to_block(&mut buf, HEADER_PAD_BYTE);
        assert_eq!(buf.len(), BLOCK_SIZE);
        assert!(buf[100..].iter().all(|&b| b == HEADER_PAD_BYTE));

        let mut aligned = vec![0u8; BLOCK_SIZE];
        pad_to_block(&mut aligned, DATA_PAD_BYTE);
        assert_eq!(aligned.len(), BLOCK_SIZE);
    }
}
