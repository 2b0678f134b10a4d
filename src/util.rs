use crate::{config::*, error::*};

/// Bit of `x` taken at tree level `level`, most significant domain bit first.
pub fn get_bit(x: u64, range_size: usize, level: usize) -> bool {
    (x >> (range_size - 1 - level)) & 1 == 1
}

pub fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

pub fn read_block(bytes: &[u8]) -> u128 {
    let mut buf = [0u8; BLOCK_SIZE];
    buf.copy_from_slice(&bytes[..BLOCK_SIZE]);
    u128::from_le_bytes(buf)
}

pub fn write_block(out: &mut [u8], block: u128) {
    out[..BLOCK_SIZE].copy_from_slice(&block.to_le_bytes());
}

pub fn blocks_to_bytes(blocks: &[u128]) -> Vec<u8> {
    blocks.iter().flat_map(|b| b.to_le_bytes()).collect()
}

pub fn in_domain(index: u64, range_size: usize) -> bool {
    range_size >= MAX_RANGE_BITS || index >> range_size == 0
}

/// Byte length of `count` outputs of `data_size` bytes each.
pub fn output_len(count: usize, data_size: usize) -> Result<usize> {
    count
        .checked_mul(data_size)
        .ok_or(FssError::InputSize { expected: usize::MAX, actual: data_size })
}

/// Special indices must lie in the domain and be strictly increasing.
pub fn check_indices(indices: &[u64], range_size: usize) -> Result<()> {
    for (position, &index) in indices.iter().enumerate() {
        if !in_domain(index, range_size) {
            return Err(FssError::IndexOutOfDomain { index, range_size });
        }
        if position > 0 && indices[position - 1] >= index {
            return Err(FssError::UnorderedInput { position });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bit_msb_first() {
        // 0b1011 in a 4-bit domain
        let bits: Vec<bool> = (0..4).map(|i| get_bit(0b1011, 4, i)).collect();
        assert_eq!(bits, vec![true, false, true, true]);
        assert!(get_bit(1 << 63, 64, 0));
    }

    #[test]
    fn test_block_round_trip() {
        let mut buf = [0u8; 20];
        let block = 0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10u128;
        write_block(&mut buf[2..], block);
        assert_eq!(read_block(&buf[2..]), block);
        assert_eq!(buf[2], 0x10);
    }

    #[test]
    fn test_output_len() {
        assert_eq!(output_len(5, 16), Ok(80));
        assert_eq!(output_len(0, usize::MAX), Ok(0));
        assert_eq!(
            output_len(3, usize::MAX / 2),
            Err(FssError::InputSize { expected: usize::MAX, actual: usize::MAX / 2 })
        );
    }

    #[test]
    fn test_check_indices() {
        assert!(check_indices(&[0, 3, 7, 15], 4).is_ok());
        assert_eq!(
            check_indices(&[0, 3, 3], 4),
            Err(FssError::UnorderedInput { position: 2 })
        );
        assert_eq!(
            check_indices(&[5, 2], 4),
            Err(FssError::UnorderedInput { position: 1 })
        );
        assert_eq!(
            check_indices(&[16], 4),
            Err(FssError::IndexOutOfDomain { index: 16, range_size: 4 })
        );
        assert!(check_indices(&[u64::MAX], 64).is_ok());
    }
}
