//! Two-party distributed point function over a GGM tree.
//!
//! Each level carries one [`CorrectionWord`]; a party applies it whenever its
//! running control bit is set, which keeps both parties' states equal off the
//! special path and distinct (with opposite control bits) on it.

use tracing::{debug, instrument};
use crate::{config::*, error::*, layout::*, prg::*, util::*};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DpfKey {
    pub bytes: Vec<u8>,
    pub data_size: usize,
    pub range_size: usize,
}

impl DpfKey {
    pub fn new(bytes: Vec<u8>, data_size: usize, range_size: usize) -> Self {
        Self { bytes, data_size, range_size }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CorrectionWord {
    pub seed: u128,
    pub bit_left: bool,
    pub bit_right: bool,
}

impl CorrectionWord {
    pub fn encode(&self, out: &mut [u8]) {
        write_block(out, self.seed);
        out[BLOCK_SIZE] = self.bit_left as u8;
        out[BLOCK_SIZE + 1] = self.bit_right as u8;
    }

    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            seed: read_block(bytes),
            bit_left: bytes[BLOCK_SIZE] & 1 == 1,
            bit_right: bytes[BLOCK_SIZE + 1] & 1 == 1,
        }
    }
}

type Expansion = (u128, bool, u128, bool);

// correct both children when the parent's control bit is set
fn apply(children: Expansion, bit: bool, cw: &CorrectionWord) -> Expansion {
    let (sl, tl, sr, tr) = children;
    if bit {
        (sl ^ cw.seed, tl ^ cw.bit_left, sr ^ cw.seed, tr ^ cw.bit_right)
    } else {
        children
    }
}

/// Output of key generation before serialization.
pub(crate) struct PointShares {
    pub roots: [u128; 2],
    pub cws: Vec<CorrectionWord>,
    pub leaves: [u128; 2],
    pub last_cw: Vec<u8>,
}

/// One party's key, parsed through its layout.
pub(crate) struct PointKeyParts<'a> {
    pub root_seed: u128,
    pub root_bit: bool,
    pub cws: Vec<CorrectionWord>,
    pub last_cw: &'a [u8],
    pub proof_cs: &'a [u8],
}

impl<'a> PointKeyParts<'a> {
    pub fn parse(key: &'a DpfKey, verifiable: bool) -> Result<Self> {
        check_range_size(key.range_size)?;
        let layout = KeyLayout::point(key.range_size, key.data_size, verifiable)?;
        layout.check(&key.bytes)?;
        layout.check_header(&key.bytes, KeyField::RangeSize, key.range_size)?;

        let cws = layout
            .field(&key.bytes, KeyField::LevelCorrections)
            .chunks_exact(DPF_CW_SIZE)
            .map(CorrectionWord::decode)
            .collect();

        Ok(Self {
            root_seed: read_block(layout.field(&key.bytes, KeyField::RootSeed)),
            root_bit: layout.field(&key.bytes, KeyField::RootBit)[0] & 1 == 1,
            cws,
            last_cw: layout.field(&key.bytes, KeyField::Payload),
            proof_cs: layout.field(&key.bytes, KeyField::ProofCorrection),
        })
    }
}

pub(crate) fn encode_point_keys(
    shares: &PointShares,
    range_size: usize,
    data_size: usize,
    proof_cs: Option<&[u8]>,
) -> Result<(DpfKey, DpfKey)> {
    let layout = KeyLayout::point(range_size, data_size, proof_cs.is_some())?;
    let mut shared = layout.alloc();

    layout.field_mut(&mut shared, KeyField::RangeSize)[0] = range_size as u8;
    let cw_bytes = layout.field_mut(&mut shared, KeyField::LevelCorrections);
    for (cw, chunk) in shares.cws.iter().zip(cw_bytes.chunks_exact_mut(DPF_CW_SIZE)) {
        cw.encode(chunk);
    }
    layout
        .field_mut(&mut shared, KeyField::Payload)
        .copy_from_slice(&shares.last_cw);
    if let Some(cs) = proof_cs {
        layout
            .field_mut(&mut shared, KeyField::ProofCorrection)
            .copy_from_slice(cs);
    }

    let [key_a, key_b] = [0usize, 1].map(|party| {
        let mut bytes = shared.clone();
        write_block(layout.field_mut(&mut bytes, KeyField::RootSeed), shares.roots[party]);
        layout.field_mut(&mut bytes, KeyField::RootBit)[0] = party as u8;
        DpfKey::new(bytes, data_size, range_size)
    });
    Ok((key_a, key_b))
}

pub struct Dpf {
    prg: PrgContext,
}

impl Dpf {
    pub fn new(prf_key: &[u8]) -> Result<Self> {
        Ok(Self::from_context(PrgContext::new(prf_key)?))
    }

    pub fn from_context(prg: PrgContext) -> Self {
        Self { prg }
    }

    pub fn prg(&self) -> &PrgContext {
        &self.prg
    }

    pub fn required_key_size(data_size: usize, range_size: usize) -> Result<usize> {
        Ok(KeyLayout::point(range_size, data_size, false)?.size())
    }

    /// Generate the key pair for `f(special_index) = data`, zero elsewhere.
    #[instrument(skip_all, fields(range_size = range_size, data_size = data_size))]
    pub fn gen(
        &self,
        special_index: u64,
        range_size: usize,
        data_size: usize,
        data: &[u8],
    ) -> Result<(DpfKey, DpfKey)> {
        let shares = self.gen_shares(special_index, range_size, data_size, data)?;
        let keys = encode_point_keys(&shares, range_size, data_size, None)?;
        debug!(key_size = keys.0.bytes.len(), "generated point function keys");
        Ok(keys)
    }

    pub(crate) fn gen_shares(
        &self,
        special_index: u64,
        range_size: usize,
        data_size: usize,
        data: &[u8],
    ) -> Result<PointShares> {
        check_range_size(range_size)?;
        check_payload(data, data_size)?;
        if !in_domain(special_index, range_size) {
            return Err(FssError::IndexOutOfDomain { index: special_index, range_size });
        }

        let roots = [random_block(), random_block()];
        let mut seeds = roots;
        let mut bits = [false, true];
        let mut cws = Vec::with_capacity(range_size);

        for level in 0..range_size {
            let children = [self.prg.expand(seeds[0]), self.prg.expand(seeds[1])];
            let (s0l, t0l, s0r, t0r) = children[0];
            let (s1l, t1l, s1r, t1r) = children[1];
            let keep_right = get_bit(special_index, range_size, level);

            // the lose side cancels, the keep side ends with opposite bits
            let cw = CorrectionWord {
                seed: if keep_right { s0l ^ s1l } else { s0r ^ s1r },
                bit_left: t0l ^ t1l ^ !keep_right,
                bit_right: t0r ^ t1r ^ keep_right,
            };

            for party in 0..2 {
                let (sl, tl, sr, tr) = apply(children[party], bits[party], &cw);
                (seeds[party], bits[party]) = if keep_right { (sr, tr) } else { (sl, tl) };
            }
            cws.push(cw);
        }

        let mut last_cw = data.to_vec();
        let mut mask = vec![0u8; data_size];
        for &leaf in &seeds {
            self.prg.expand_block(leaf, &mut mask);
            xor_into(&mut last_cw, &mask);
        }

        Ok(PointShares { roots, cws, leaves: seeds, last_cw })
    }

    /// Evaluate one party's share at `index`.
    pub fn eval(&self, key: &DpfKey, index: u64) -> Result<Vec<u8>> {
        let parts = PointKeyParts::parse(key, false)?;
        if !in_domain(index, key.range_size) {
            return Err(FssError::IndexOutOfDomain { index, range_size: key.range_size });
        }

        let (seed, bit) = self.descend(&parts, key.range_size, index);
        let mut out = vec![0u8; key.data_size];
        self.leaf_output(seed, bit, parts.last_cw, &mut out);
        Ok(out)
    }

    /// Evaluate one party's share at every index, in ascending order.
    #[instrument(skip_all, fields(range_size = key.range_size, data_size = key.data_size))]
    pub fn full_domain_eval(&self, key: &DpfKey) -> Result<Vec<u8>> {
        check_full_domain(key.range_size)?;
        let parts = PointKeyParts::parse(key, false)?;

        let leaves = self.expand_domain(&parts);
        let data_size = key.data_size;
        let mut out = vec![0u8; leaves.len() * data_size];
        for (i, &(seed, bit)) in leaves.iter().enumerate() {
            self.leaf_output(seed, bit, parts.last_cw, &mut out[i * data_size..(i + 1) * data_size]);
        }

        debug!(leaves = leaves.len(), "full domain evaluation done");
        Ok(out)
    }

    pub(crate) fn descend(&self, parts: &PointKeyParts, range_size: usize, index: u64) -> (u128, bool) {
        let mut seed = parts.root_seed;
        let mut bit = parts.root_bit;

        for (level, cw) in parts.cws.iter().enumerate() {
            let (sl, tl, sr, tr) = apply(self.prg.expand(seed), bit, cw);
            (seed, bit) = if get_bit(index, range_size, level) { (sr, tr) } else { (sl, tl) };
        }
        (seed, bit)
    }

    // breadth-first, one expansion per inner node
    pub(crate) fn expand_domain(&self, parts: &PointKeyParts) -> Vec<(u128, bool)> {
        let mut nodes = vec![(parts.root_seed, parts.root_bit)];

        for cw in &parts.cws {
            let mut next = Vec::with_capacity(nodes.len() * 2);
            for &(seed, bit) in &nodes {
                let (sl, tl, sr, tr) = apply(self.prg.expand(seed), bit, cw);
                next.push((sl, tl));
                next.push((sr, tr));
            }
            nodes = next;
        }
        nodes
    }

    pub(crate) fn leaf_output(&self, seed: u128, bit: bool, last_cw: &[u8], out: &mut [u8]) {
        self.prg.expand_block(seed, out);
        if bit {
            xor_into(out, last_cw);
        }
    }
}
