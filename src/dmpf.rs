//! Multi-point function over a single GGM tree.
//!
//! Every node carries a seed and a `points`-bit sign vector per party. On the
//! path to special index `k` the two parties' sign vectors differ in exactly
//! bit `k`; everywhere else both states are identical. A party corrects a node
//! with the XOR of the level's [`SignCorrection`]s selected by its sign bits,
//! so evaluation stays a single descent regardless of the number of points.

use tracing::{debug, instrument};
use crate::{compress::*, config::*, error::*, layout::*, prg::*, util::*};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DmpfKey {
    pub bytes: Vec<u8>,
    pub data_size: usize,
    pub range_size: usize,
    pub range_points: usize,
}

impl DmpfKey {
    pub fn new(bytes: Vec<u8>, data_size: usize, range_size: usize, range_points: usize) -> Self {
        Self { bytes, data_size, range_size, range_points }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SignCorrection {
    pub seed: u128,
    pub sign_left: u32,
    pub sign_right: u32,
}

impl SignCorrection {
    pub fn encode(&self, out: &mut [u8]) {
        write_block(out, self.seed);
        out[BLOCK_SIZE..BLOCK_SIZE + 4].copy_from_slice(&self.sign_left.to_le_bytes());
        out[BLOCK_SIZE + 4..BLOCK_SIZE + 8].copy_from_slice(&self.sign_right.to_le_bytes());
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let word = |offset: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[offset..offset + 4]);
            u32::from_le_bytes(buf)
        };
        Self {
            seed: read_block(bytes),
            sign_left: word(BLOCK_SIZE),
            sign_right: word(BLOCK_SIZE + 4),
        }
    }

    fn xor(&self, other: &Self) -> Self {
        Self {
            seed: self.seed ^ other.seed,
            sign_left: self.sign_left ^ other.sign_left,
            sign_right: self.sign_right ^ other.sign_right,
        }
    }
}

/// Positions of the set bits of a sign vector, lowest first.
pub(crate) fn set_bits(mut bits: u32) -> impl Iterator<Item = usize> {
    std::iter::from_fn(move || {
        if bits == 0 {
            return None;
        }
        let position = bits.trailing_zeros() as usize;
        bits &= bits - 1;
        Some(position)
    })
}

fn combine(level: &[SignCorrection], sign: u32) -> SignCorrection {
    set_bits(sign)
        .filter_map(|k| level.get(k))
        .fold(SignCorrection::default(), |acc, cw| acc.xor(cw))
}

type SignExpansion = (u128, u32, u128, u32);

fn apply(children: SignExpansion, sign: u32, level: &[SignCorrection], mask: u32) -> SignExpansion {
    let (sl, gl, sr, gr) = children;
    let cw = combine(level, sign);
    (sl ^ cw.seed, (gl ^ cw.sign_left) & mask, sr ^ cw.seed, (gr ^ cw.sign_right) & mask)
}

// distinct prefixes of the sorted indices at `depth`, still sorted
fn active_prefixes(indices: &[u64], range_size: usize, depth: usize) -> Vec<u64> {
    let mut prefixes: Vec<u64> = indices
        .iter()
        .map(|&x| x.checked_shr((range_size - depth) as u32).unwrap_or(0))
        .collect();
    prefixes.dedup();
    prefixes
}

/// Output of multi point generation before serialization.
pub(crate) struct MultiShares {
    pub roots: [u128; 2],
    pub cws: Vec<SignCorrection>,
    pub leaves: [Vec<u128>; 2],
    pub payload: Vec<u8>,
}

/// Serialized material one tree traversal needs, wherever it was parsed from.
pub(crate) struct MultiKeyParts<'a> {
    pub root_seed: u128,
    pub root_sign: u32,
    pub cws: Vec<SignCorrection>,
    pub payload: &'a [u8],
    pub proof_cs: &'a [u8],
    pub points: usize,
}

impl<'a> MultiKeyParts<'a> {
    pub fn parse(key: &'a DmpfKey, verifiable: bool) -> Result<Self> {
        check_range_size(key.range_size)?;
        check_point_count(key.range_points)?;
        let layout = KeyLayout::multi_point(key.range_size, key.range_points, key.data_size, verifiable)?;
        layout.check(&key.bytes)?;
        layout.check_header(&key.bytes, KeyField::RangeSize, key.range_size)?;
        layout.check_header(&key.bytes, KeyField::RangePoints, key.range_points)?;

        Ok(Self {
            root_seed: read_block(layout.field(&key.bytes, KeyField::RootSeed)),
            root_sign: (layout.field(&key.bytes, KeyField::Party)[0] & 1) as u32,
            cws: decode_corrections(layout.field(&key.bytes, KeyField::LevelCorrections)),
            payload: layout.field(&key.bytes, KeyField::Payload),
            proof_cs: layout.field(&key.bytes, KeyField::ProofCorrection),
            points: key.range_points,
        })
    }

    pub fn level(&self, level: usize) -> &[SignCorrection] {
        &self.cws[level * self.points..(level + 1) * self.points]
    }
}

pub(crate) fn decode_corrections(bytes: &[u8]) -> Vec<SignCorrection> {
    bytes.chunks_exact(DMPF_CW_SIZE).map(SignCorrection::decode).collect()
}

pub(crate) fn encode_corrections(cws: &[SignCorrection], out: &mut [u8]) {
    for (cw, chunk) in cws.iter().zip(out.chunks_exact_mut(DMPF_CW_SIZE)) {
        cw.encode(chunk);
    }
}

pub(crate) fn encode_multi_keys(
    shares: &MultiShares,
    range_size: usize,
    range_points: usize,
    data_size: usize,
    proof_cs: Option<&[u8]>,
) -> Result<(DmpfKey, DmpfKey)> {
    let layout = KeyLayout::multi_point(range_size, range_points, data_size, proof_cs.is_some())?;
    let mut shared = layout.alloc();

    layout.field_mut(&mut shared, KeyField::RangeSize)[0] = range_size as u8;
    layout.field_mut(&mut shared, KeyField::RangePoints)[0] = range_points as u8;
    encode_corrections(&shares.cws, layout.field_mut(&mut shared, KeyField::LevelCorrections));
    layout
        .field_mut(&mut shared, KeyField::Payload)
        .copy_from_slice(&shares.payload);
    if let Some(cs) = proof_cs {
        layout
            .field_mut(&mut shared, KeyField::ProofCorrection)
            .copy_from_slice(cs);
    }

    let [key_a, key_b] = [0usize, 1].map(|party| {
        let mut bytes = shared.clone();
        write_block(layout.field_mut(&mut bytes, KeyField::RootSeed), shares.roots[party]);
        layout.field_mut(&mut bytes, KeyField::Party)[0] = party as u8;
        DmpfKey::new(bytes, data_size, range_size, range_points)
    });
    Ok((key_a, key_b))
}

pub struct Dmpf {
    prg: PrgContext,
}

impl Dmpf {
    pub fn new(prf_key: &[u8]) -> Result<Self> {
        Ok(Self::from_context(PrgContext::new(prf_key)?))
    }

    pub fn from_context(prg: PrgContext) -> Self {
        Self { prg }
    }

    pub fn prg(&self) -> &PrgContext {
        &self.prg
    }

    pub fn required_key_size(data_size: usize, range_size: usize, range_points: usize) -> Result<usize> {
        Ok(KeyLayout::multi_point(range_size, range_points, data_size, false)?.size())
    }

    /// Generate keys for `f(indices[k]) = data[k * data_size..(k + 1) * data_size]`.
    ///
    /// `indices` must be strictly increasing and hold exactly `range_points` entries.
    #[instrument(skip_all, fields(range_size = range_size, points = range_points, data_size = data_size))]
    pub fn gen(
        &self,
        indices: &[u64],
        range_size: usize,
        range_points: usize,
        data_size: usize,
        data: &[u8],
    ) -> Result<(DmpfKey, DmpfKey)> {
        let shares = self.gen_shares(indices, range_size, range_points, data_size, data)?;
        let keys = encode_multi_keys(&shares, range_size, range_points, data_size, None)?;
        debug!(key_size = keys.0.bytes.len(), "generated multi point function keys");
        Ok(keys)
    }

    pub(crate) fn gen_shares(
        &self,
        indices: &[u64],
        range_size: usize,
        range_points: usize,
        data_size: usize,
        data: &[u8],
    ) -> Result<MultiShares> {
        check_range_size(range_size)?;
        check_point_count(range_points)?;
        if indices.len() != range_points {
            return Err(FssError::InputSize { expected: range_points, actual: indices.len() });
        }
        check_payload(data, output_len(range_points, data_size)?)?;
        check_indices(indices, range_size)?;

        let mask = sign_mask(range_points);
        let roots = [random_block(), random_block()];
        // per active node: (seed, sign) of party A and party B
        let mut states = vec![[(roots[0], 0u32), (roots[1], 1u32)]];
        let mut cws = Vec::with_capacity(range_size * range_points);

        for depth in 0..range_size {
            let current = active_prefixes(indices, range_size, depth);
            let next = active_prefixes(indices, range_size, depth + 1);

            let expansions: Vec<[SignExpansion; 2]> = states
                .iter()
                .map(|node| [0, 1].map(|party| self.prg.expand_signs(node[party].0, range_points)))
                .collect();

            let mut level = vec![SignCorrection::default(); range_points];
            let mut children = Vec::with_capacity(current.len());
            for (j, &prefix) in current.iter().enumerate() {
                let (s0l, g0l, s0r, g0r) = expansions[j][0];
                let (s1l, g1l, s1r, g1r) = expansions[j][1];
                let left = next.binary_search(&(prefix << 1)).ok();
                let right = next.binary_search(&(prefix << 1 | 1)).ok();

                let mut cw = SignCorrection {
                    seed: 0,
                    sign_left: g0l ^ g1l,
                    sign_right: g0r ^ g1r,
                };
                match (left, right) {
                    (Some(dl), Some(dr)) => {
                        cw.seed = random_block();
                        cw.sign_left ^= 1 << dl;
                        cw.sign_right ^= 1 << dr;
                    }
                    (Some(dl), None) => {
                        cw.seed = s0r ^ s1r;
                        cw.sign_left ^= 1 << dl;
                    }
                    (None, Some(dr)) => {
                        cw.seed = s0l ^ s1l;
                        cw.sign_right ^= 1 << dr;
                    }
                    (None, None) => unreachable!(),
                }
                level[j] = cw;
                children.push((left, right));
            }

            let mut next_states = vec![[(0u128, 0u32); 2]; next.len()];
            for (j, &(left, right)) in children.iter().enumerate() {
                for party in 0..2 {
                    let sign = states[j][party].1;
                    let (sl, gl, sr, gr) = apply(expansions[j][party], sign, &level, mask);
                    if let Some(dl) = left {
                        next_states[dl][party] = (sl, gl);
                    }
                    if let Some(dr) = right {
                        next_states[dr][party] = (sr, gr);
                    }
                }
            }

            states = next_states;
            cws.extend(level);
        }

        let leaves = [0usize, 1].map(|party| states.iter().map(|node| node[party].0).collect::<Vec<_>>());
        let mut payload = data.to_vec();
        let mut mask_block = vec![0u8; data_size];
        for k in 0..range_points {
            let chunk = &mut payload[k * data_size..(k + 1) * data_size];
            for party_leaves in &leaves {
                self.prg.expand_block(party_leaves[k], &mut mask_block);
                xor_into(chunk, &mask_block);
            }
        }

        Ok(MultiShares { roots, cws, leaves, payload })
    }

    pub fn eval(&self, key: &DmpfKey, index: u64) -> Result<Vec<u8>> {
        let parts = MultiKeyParts::parse(key, false)?;
        if !in_domain(index, key.range_size) {
            return Err(FssError::IndexOutOfDomain { index, range_size: key.range_size });
        }

        let (seed, sign) = descend(&self.prg, &parts, key.range_size, index);
        let mut out = vec![0u8; key.data_size];
        leaf_output(&self.prg, seed, sign, parts.payload, &mut out);
        Ok(out)
    }

    #[instrument(skip_all, fields(range_size = key.range_size, points = key.range_points))]
    pub fn full_domain_eval(&self, key: &DmpfKey) -> Result<Vec<u8>> {
        check_full_domain(key.range_size)?;
        let parts = MultiKeyParts::parse(key, false)?;
        let out = full_domain_output(&self.prg, &parts, key.range_size, key.data_size);
        debug!(bytes = out.len(), "multi point full domain evaluation done");
        Ok(out)
    }

    /// Generate a key pair and re-encode it as one compressed key.
    #[instrument(skip_all, fields(range_size = range_size, points = range_points, data_size = data_size))]
    pub fn compress(
        &self,
        indices: &[u64],
        range_size: usize,
        range_points: usize,
        data_size: usize,
        data: &[u8],
    ) -> Result<CompressedDmpfKey> {
        let (key_a, key_b) = self.gen(indices, range_size, range_points, data_size, data)?;
        CompressedDmpfKey::from_pair(&key_a, &key_b)
    }
}

pub(crate) fn descend(prg: &PrgContext, parts: &MultiKeyParts, range_size: usize, index: u64) -> (u128, u32) {
    let mask = sign_mask(parts.points);
    let mut seed = parts.root_seed;
    let mut sign = parts.root_sign;

    for depth in 0..range_size {
        let children = prg.expand_signs(seed, parts.points);
        let (sl, gl, sr, gr) = apply(children, sign, parts.level(depth), mask);
        (seed, sign) = if get_bit(index, range_size, depth) { (sr, gr) } else { (sl, gl) };
    }
    (seed, sign)
}

// breadth-first, leaves come out in ascending index order
pub(crate) fn expand_domain(prg: &PrgContext, parts: &MultiKeyParts, range_size: usize) -> Vec<(u128, u32)> {
    let mask = sign_mask(parts.points);
    let mut nodes = vec![(parts.root_seed, parts.root_sign)];

    for depth in 0..range_size {
        let level = parts.level(depth);
        let mut next = Vec::with_capacity(nodes.len() * 2);
        for &(seed, sign) in &nodes {
            let children = prg.expand_signs(seed, parts.points);
            let (sl, gl, sr, gr) = apply(children, sign, level, mask);
            next.push((sl, gl));
            next.push((sr, gr));
        }
        nodes = next;
    }
    nodes
}

pub(crate) fn full_domain_output(
    prg: &PrgContext,
    parts: &MultiKeyParts,
    range_size: usize,
    data_size: usize,
) -> Vec<u8> {
    let leaves = expand_domain(prg, parts, range_size);
    let mut out = vec![0u8; leaves.len() * data_size];
    for (i, &(seed, sign)) in leaves.iter().enumerate() {
        leaf_output(prg, seed, sign, parts.payload, &mut out[i * data_size..(i + 1) * data_size]);
    }
    out
}

pub(crate) fn leaf_output(prg: &PrgContext, seed: u128, sign: u32, payload: &[u8], out: &mut [u8]) {
    let data_size = out.len();
    prg.expand_block(seed, out);
    for k in set_bits(sign) {
        if let Some(word) = payload.get(k * data_size..(k + 1) * data_size) {
            xor_into(out, word);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
        a.iter().zip(b).map(|(x, y)| x ^ y).collect()
    }

    fn random_indices(points: usize, range_size: usize) -> Vec<u64> {
        let mut indices = Vec::with_capacity(points);
        while indices.len() < points {
            let index = rand::random::<u64>() % (1 << range_size);
            if !indices.contains(&index) {
                indices.push(index);
            }
        }
        indices.sort();
        indices
    }

    fn expected_at(indices: &[u64], data: &[u8], data_size: usize, index: u64) -> Vec<u8> {
        match indices.iter().position(|&x| x == index) {
            Some(k) => data[k * data_size..(k + 1) * data_size].to_vec(),
            None => vec![0u8; data_size],
        }
    }

    #[test]
    fn test_four_points_one_byte() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
        let indices = random_indices(4, 4);
        let data: Vec<u8> = (0..4).map(|_| rand::random::<u8>()).collect();

        let (key_a, key_b) = dmpf.gen(&indices, 4, 4, 1, &data).unwrap();
        assert_eq!(key_a.bytes.len(), 24 * 4 * 4 + 19 + 4);
        assert_eq!(key_a.bytes.len(), Dmpf::required_key_size(1, 4, 4).unwrap());

        for index in 0..16u64 {
            let combined = xor(&dmpf.eval(&key_a, index).unwrap(), &dmpf.eval(&key_b, index).unwrap());
            assert_eq!(combined, expected_at(&indices, &data, 1, index), "index {}", index);
        }
    }

    #[test]
    fn test_many_points_random_trials() {
        for _ in 0..10 {
            let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
            let range_size = 3 + rand::random::<usize>() % 5;
            let points = 1 + rand::random::<usize>() % 8;
            let indices = random_indices(points, range_size);
            let data: Vec<u8> = (0..points * 6).map(|_| rand::random::<u8>()).collect();

            let (key_a, key_b) = dmpf.gen(&indices, range_size, points, 6, &data).unwrap();
            let full_a = dmpf.full_domain_eval(&key_a).unwrap();
            let full_b = dmpf.full_domain_eval(&key_b).unwrap();

            for index in 0..(1u64 << range_size) {
                let i = index as usize;
                let share_a = dmpf.eval(&key_a, index).unwrap();
                assert_eq!(&full_a[i * 6..(i + 1) * 6], &share_a[..]);
                assert_eq!(
                    xor(&full_a[i * 6..(i + 1) * 6], &full_b[i * 6..(i + 1) * 6]),
                    expected_at(&indices, &data, 6, index)
                );
            }
        }
    }

    #[test]
    fn test_dense_and_maximal_points() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();

        // every index of a 3-bit domain
        let indices: Vec<u64> = (0..8).collect();
        let data: Vec<u8> = (1..=8).collect();
        let (key_a, key_b) = dmpf.gen(&indices, 3, 8, 1, &data).unwrap();
        let combined = xor(&dmpf.full_domain_eval(&key_a).unwrap(), &dmpf.full_domain_eval(&key_b).unwrap());
        assert_eq!(combined, data);

        let indices = random_indices(MAX_RANGE_POINTS, 10);
        let data: Vec<u8> = (0..MAX_RANGE_POINTS as u8).map(|b| b | 0x80).collect();
        let (key_a, key_b) = dmpf.gen(&indices, 10, MAX_RANGE_POINTS, 1, &data).unwrap();
        for (k, &index) in indices.iter().enumerate() {
            let combined = xor(&dmpf.eval(&key_a, index).unwrap(), &dmpf.eval(&key_b, index).unwrap());
            assert_eq!(combined, vec![data[k]]);
        }
    }

    #[test]
    fn test_single_point_and_wide_domain() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
        let indices = [0u64, 1 << 40, u64::MAX];
        let data = [1u8, 2, 3, 4, 5, 6];
        let (key_a, key_b) = dmpf.gen(&indices, 64, 3, 2, &data).unwrap();

        for (k, &index) in indices.iter().enumerate() {
            let combined = xor(&dmpf.eval(&key_a, index).unwrap(), &dmpf.eval(&key_b, index).unwrap());
            assert_eq!(combined, data[k * 2..k * 2 + 2].to_vec());
        }
        let combined = xor(&dmpf.eval(&key_a, 12345).unwrap(), &dmpf.eval(&key_b, 12345).unwrap());
        assert_eq!(combined, vec![0, 0]);

        let (key_a, key_b) = dmpf.gen(&[0], 0, 1, 3, &[9, 8, 7]).unwrap();
        let combined = xor(&dmpf.eval(&key_a, 0).unwrap(), &dmpf.eval(&key_b, 0).unwrap());
        assert_eq!(combined, vec![9, 8, 7]);
    }

    #[test]
    fn test_sign_correction_bytes() {
        let cw = SignCorrection { seed: 0xdead_beef, sign_left: 0x0102_0304, sign_right: u32::MAX };
        let mut buf = [0u8; DMPF_CW_SIZE];
        cw.encode(&mut buf);
        assert_eq!(buf[16..20], [4, 3, 2, 1]);
        assert_eq!(SignCorrection::decode(&buf), cw);
        assert_eq!(set_bits(0b1010_0001).collect::<Vec<_>>(), vec![0, 5, 7]);
    }

    #[test]
    fn test_generation_errors() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
        assert_eq!(
            dmpf.gen(&[3, 1], 4, 2, 1, &[0, 0]).unwrap_err(),
            FssError::UnorderedInput { position: 1 }
        );
        assert_eq!(
            dmpf.gen(&[1, 1], 4, 2, 1, &[0, 0]).unwrap_err(),
            FssError::UnorderedInput { position: 1 }
        );
        assert_eq!(
            dmpf.gen(&[1, 2], 4, 2, 1, &[0]).unwrap_err(),
            FssError::InputSize { expected: 2, actual: 1 }
        );
        assert_eq!(
            dmpf.gen(&[1, 2, 3], 4, 2, 1, &[0, 0]).unwrap_err(),
            FssError::InputSize { expected: 2, actual: 3 }
        );
        assert_eq!(
            dmpf.gen(&[1, 2], 4, 2, usize::MAX / 2 + 1, &[0u8; 2]).unwrap_err(),
            FssError::InputSize { expected: usize::MAX, actual: usize::MAX / 2 + 1 }
        );
        assert_eq!(
            dmpf.gen(&[], 4, 0, 1, &[]).unwrap_err(),
            FssError::PointCount { points: 0, max: MAX_RANGE_POINTS }
        );
        let too_many: Vec<u64> = (0..33).collect();
        assert!(matches!(
            dmpf.gen(&too_many, 8, 33, 1, &[0u8; 33]),
            Err(FssError::PointCount { points: 33, .. })
        ));
        assert!(matches!(
            dmpf.gen(&[1, 20], 4, 2, 1, &[0, 0]),
            Err(FssError::IndexOutOfDomain { index: 20, range_size: 4 })
        ));
    }

    #[test]
    fn test_evaluation_errors() {
        let dmpf = Dmpf::new(&generate_prf_key()).unwrap();
        let (key_a, _) = dmpf.gen(&[1, 5], 4, 2, 3, &[0u8; 6]).unwrap();

        let mut truncated = key_a.clone();
        truncated.bytes.truncate(50);
        assert!(matches!(dmpf.eval(&truncated, 0), Err(FssError::KeyCorruption { actual: 50, .. })));

        let mut bad_points = key_a.clone();
        bad_points.bytes[1] = 3;
        assert_eq!(
            dmpf.eval(&bad_points, 0).unwrap_err(),
            FssError::KeyHeaderMismatch { field: "range points", expected: 2, actual: 3 }
        );

        assert!(matches!(
            dmpf.full_domain_eval(&DmpfKey::new(vec![], 1, 33, 2)),
            Err(FssError::DomainTooLarge { range_size: 33, max: 32 })
        ));
        assert!(matches!(dmpf.eval(&key_a, 16), Err(FssError::IndexOutOfDomain { .. })));
    }
}
