use crate::error::*;

pub const BLOCK_SIZE: usize = 16;

pub const DPF_CW_SIZE: usize = 18; //seed CW + left bit + right bit
pub const DMPF_CW_SIZE: usize = 24; //seed CW + left sign + right sign

pub const MAX_RANGE_BITS: usize = 64; //indices are u64
pub const MAX_FULL_DOMAIN_BITS: usize = 32;
pub const MAX_RANGE_POINTS: usize = 32; //sign vectors are u32

pub const HASH1_OUT_BLOCKS: usize = 4;
pub const HASH2_OUT_BLOCKS: usize = 4;
pub const PROOF_CORRECTION_SIZE: usize = HASH1_OUT_BLOCKS * BLOCK_SIZE;
pub const PROOF_SIZE: usize = 32; //sha256 digest of the accumulator

pub fn random_block() -> u128 {
    rand::random::<u128>()
}

/// Mask selecting the low `points` bits of a sign vector.
pub fn sign_mask(points: usize) -> u32 {
    if points >= 32 {
        u32::MAX
    } else {
        (1u32 << points) - 1
    }
}

pub fn check_range_size(range_size: usize) -> Result<()> {
    if range_size > MAX_RANGE_BITS {
        return Err(FssError::DomainTooLarge {
            range_size,
            max: MAX_RANGE_BITS,
        });
    }
    Ok(())
}

// array-producing calls allocate 2^range_size blocks
pub fn check_full_domain(range_size: usize) -> Result<()> {
    if range_size > MAX_FULL_DOMAIN_BITS {
        return Err(FssError::DomainTooLarge {
            range_size,
            max: MAX_FULL_DOMAIN_BITS,
        });
    }
    Ok(())
}

pub fn check_point_count(points: usize) -> Result<()> {
    if points == 0 || points > MAX_RANGE_POINTS {
        return Err(FssError::PointCount {
            points,
            max: MAX_RANGE_POINTS,
        });
    }
    Ok(())
}

pub fn check_payload(data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(FssError::InputSize {
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_mask() {
        assert_eq!(sign_mask(1), 0b1);
        assert_eq!(sign_mask(4), 0b1111);
        assert_eq!(sign_mask(32), u32::MAX);
    }

    #[test]
    fn test_full_domain_limit() {
        assert!(check_full_domain(32).is_ok());
        assert!(matches!(
            check_full_domain(33),
            Err(FssError::DomainTooLarge { range_size: 33, max: 32 })
        ));
        assert!(check_range_size(64).is_ok());
        assert!(check_range_size(65).is_err());
    }

    #[test]
    fn test_point_count_limits() {
        assert!(check_point_count(0).is_err());
        assert!(check_point_count(1).is_ok());
        assert!(check_point_count(32).is_ok());
        assert!(check_point_count(33).is_err());
    }
}
