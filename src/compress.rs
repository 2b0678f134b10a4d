//! Compressed multi point keys.
//!
//! The two keys of a generated pair differ only in their root seed and party
//! byte, so a compressed key stores both roots next to a single copy of the
//! shared body. Decompression evaluates both parties over the whole domain
//! and returns the combined output.

use tracing::{debug, instrument};
use crate::{config::*, dmpf::*, error::*, layout::*, prg::*, util::*};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedDmpfKey {
    pub bytes: Vec<u8>,
    pub data_size: usize,
    pub range_size: usize,
    pub range_points: usize,
}

const SHARED_FIELDS: [KeyField; 4] = [
    KeyField::RangeSize,
    KeyField::RangePoints,
    KeyField::LevelCorrections,
    KeyField::Payload,
];

impl CompressedDmpfKey {
    pub fn new(bytes: Vec<u8>, data_size: usize, range_size: usize, range_points: usize) -> Self {
        Self { bytes, data_size, range_size, range_points }
    }

    pub fn required_key_size(data_size: usize, range_size: usize, range_points: usize) -> Result<usize> {
        Ok(KeyLayout::compressed(range_size, range_points, data_size)?.size())
    }

    fn checked_layout(&self) -> Result<KeyLayout> {
        check_range_size(self.range_size)?;
        check_point_count(self.range_points)?;
        let layout = KeyLayout::compressed(self.range_size, self.range_points, self.data_size)?;
        layout.check(&self.bytes)?;
        layout.check_header(&self.bytes, KeyField::RangeSize, self.range_size)?;
        layout.check_header(&self.bytes, KeyField::RangePoints, self.range_points)?;
        Ok(layout)
    }

    /// Re-encode a generated pair; `key_a` must be party A's key.
    pub fn from_pair(key_a: &DmpfKey, key_b: &DmpfKey) -> Result<Self> {
        MultiKeyParts::parse(key_a, false)?;
        MultiKeyParts::parse(key_b, false)?;
        if key_a.range_size != key_b.range_size {
            return Err(FssError::KeyPairMismatch { field: KeyField::RangeSize.name() });
        }
        if key_a.range_points != key_b.range_points {
            return Err(FssError::KeyPairMismatch { field: KeyField::RangePoints.name() });
        }
        if key_a.data_size != key_b.data_size {
            return Err(FssError::KeyPairMismatch { field: "data size" });
        }

        let (range_size, points, data_size) = (key_a.range_size, key_a.range_points, key_a.data_size);
        let plain = KeyLayout::multi_point(range_size, points, data_size, false)?;
        if plain.field(&key_a.bytes, KeyField::Party) != [0]
            || plain.field(&key_b.bytes, KeyField::Party) != [1]
        {
            return Err(FssError::KeyPairMismatch { field: KeyField::Party.name() });
        }
        for field in SHARED_FIELDS {
            if plain.field(&key_a.bytes, field) != plain.field(&key_b.bytes, field) {
                return Err(FssError::KeyPairMismatch { field: field.name() });
            }
        }

        let layout = KeyLayout::compressed(range_size, points, data_size)?;
        let mut bytes = layout.alloc();
        for field in SHARED_FIELDS {
            layout
                .field_mut(&mut bytes, field)
                .copy_from_slice(plain.field(&key_a.bytes, field));
        }
        layout
            .field_mut(&mut bytes, KeyField::RootSeed)
            .copy_from_slice(plain.field(&key_a.bytes, KeyField::RootSeed));
        layout
            .field_mut(&mut bytes, KeyField::RootSeedB)
            .copy_from_slice(plain.field(&key_b.bytes, KeyField::RootSeed));

        Ok(Self::new(bytes, data_size, range_size, points))
    }

    /// Recover the two uncompressed keys.
    pub fn split(&self) -> Result<(DmpfKey, DmpfKey)> {
        let layout = self.checked_layout()?;
        let plain = KeyLayout::multi_point(self.range_size, self.range_points, self.data_size, false)?;

        let [key_a, key_b] = [(0u8, KeyField::RootSeed), (1, KeyField::RootSeedB)].map(|(party, root)| {
            let mut bytes = plain.alloc();
            for field in SHARED_FIELDS {
                plain
                    .field_mut(&mut bytes, field)
                    .copy_from_slice(layout.field(&self.bytes, field));
            }
            plain
                .field_mut(&mut bytes, KeyField::RootSeed)
                .copy_from_slice(layout.field(&self.bytes, root));
            plain.field_mut(&mut bytes, KeyField::Party)[0] = party;
            DmpfKey::new(bytes, self.data_size, self.range_size, self.range_points)
        });
        Ok((key_a, key_b))
    }

    /// Combined output of both parties over the whole domain.
    #[instrument(skip_all, fields(range_size = self.range_size, points = self.range_points))]
    pub fn decompress(&self, prg: &PrgContext) -> Result<Vec<u8>> {
        check_full_domain(self.range_size)?;
        let layout = self.checked_layout()?;

        let cws = decode_corrections(layout.field(&self.bytes, KeyField::LevelCorrections));
        let payload = layout.field(&self.bytes, KeyField::Payload);
        let mut combined = vec![0u8; output_len(1usize << self.range_size, self.data_size)?];

        for (root_sign, root) in [(0u32, KeyField::RootSeed), (1, KeyField::RootSeedB)] {
            let parts = MultiKeyParts {
                root_seed: read_block(layout.field(&self.bytes, root)),
                root_sign,
                cws: cws.clone(),
                payload,
                proof_cs: &[],
                points: self.range_points,
            };
            xor_into(
                &mut combined,
                &full_domain_output(prg, &parts, self.range_size, self.data_size),
            );
        }

        debug!(bytes = combined.len(), "decompressed multi point key");
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
        a.iter().zip(b).map(|(x, y)| x ^ y).collect()
    }

    #[test]
    fn test_four_points_round_trip() {
        let prf_key = generate_prf_key();
        let dmpf = Dmpf::new(&prf_key).unwrap();
        let prg = PrgContext::new(&prf_key).unwrap();
        let indices = [1u64, 4, 9, 15];
        let data = [0x11u8, 0x22, 0x33, 0x44];

        let compressed = dmpf.compress(&indices, 4, 4, 1, &data).unwrap();
        assert_eq!(compressed.bytes.len(), 34 + 24 * 4 * 4 + 4);
        assert_eq!(compressed.bytes.len(), CompressedDmpfKey::required_key_size(1, 4, 4).unwrap());

        let decompressed = compressed.decompress(&prg).unwrap();
        let (key_a, key_b) = compressed.split().unwrap();
        let combined = xor(
            &dmpf.full_domain_eval(&key_a).unwrap(),
            &dmpf.full_domain_eval(&key_b).unwrap(),
        );
        assert_eq!(decompressed, combined);

        let mut expected = vec![0u8; 16];
        for (k, &index) in indices.iter().enumerate() {
            expected[index as usize] = data[k];
        }
        assert_eq!(decompressed, expected);
    }

    #[test]
    fn test_split_recovers_pair() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
        let data: Vec<u8> = (0..3 * 5).map(|_| rand::random::<u8>()).collect();
        let (key_a, key_b) = dmpf.gen(&[2, 30, 31], 6, 3, 5, &data).unwrap();

        let compressed = CompressedDmpfKey::from_pair(&key_a, &key_b).unwrap();
        assert_eq!(compressed.split().unwrap(), (key_a.clone(), key_b.clone()));

        let layout = KeyLayout::compressed(6, 3, 5).unwrap();
        let plain = KeyLayout::multi_point(6, 3, 5, false).unwrap();
        assert_eq!(
            layout.field(&compressed.bytes, KeyField::RootSeedB),
            plain.field(&key_b.bytes, KeyField::RootSeed)
        );
    }

    #[test]
    fn test_decompress_with_other_context_differs() {
        let dmpf = Dmpf::new(&[1u8; 16]).unwrap();
        let compressed = dmpf.compress(&[3], 3, 1, 4, &[1, 2, 3, 4]).unwrap();

        let right = compressed.decompress(dmpf.prg()).unwrap();
        let wrong = compressed.decompress(&PrgContext::new(&[2u8; 16]).unwrap()).unwrap();
        assert_eq!(&right[12..16], &[1, 2, 3, 4]);
        assert_ne!(right, wrong);
    }

    #[test]
    fn test_pair_mismatch() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
        let (key_a, key_b) = dmpf.gen(&[1, 2], 4, 2, 1, &[7, 8]).unwrap();
        let (other_a, _) = dmpf.gen(&[1, 2], 4, 2, 1, &[7, 8]).unwrap();
        let (wide_a, _) = dmpf.gen(&[1, 2], 5, 2, 1, &[7, 8]).unwrap();

        assert_eq!(
            CompressedDmpfKey::from_pair(&key_b, &key_a).unwrap_err(),
            FssError::KeyPairMismatch { field: "party" }
        );
        assert_eq!(
            CompressedDmpfKey::from_pair(&other_a, &key_b).unwrap_err(),
            FssError::KeyPairMismatch { field: "level corrections" }
        );
        assert_eq!(
            CompressedDmpfKey::from_pair(&wide_a, &key_b).unwrap_err(),
            FssError::KeyPairMismatch { field: "range size" }
        );
    }

    #[test]
    fn test_compressed_key_errors() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
        let mut compressed = dmpf.compress(&[0, 5], 4, 2, 2, &[1, 2, 3, 4]).unwrap();

        let oversized = CompressedDmpfKey::new(vec![], 1, 33, 1);
        assert_eq!(
            oversized.decompress(dmpf.prg()).unwrap_err(),
            FssError::DomainTooLarge { range_size: 33, max: 32 }
        );

        let huge = usize::MAX / 2 + 1;
        assert_eq!(
            CompressedDmpfKey::new(vec![], huge, 4, 2).split().unwrap_err(),
            FssError::InputSize { expected: usize::MAX, actual: huge }
        );
        assert!(CompressedDmpfKey::required_key_size(huge, 4, 2).is_err());

        compressed.bytes[0] = 5;
        assert!(matches!(
            compressed.split(),
            Err(FssError::KeyHeaderMismatch { field: "range size", expected: 4, actual: 5 })
        ));

        compressed.bytes.push(0);
        assert!(matches!(
            compressed.decompress(dmpf.prg()),
            Err(FssError::KeyCorruption { .. })
        ));
    }
}
