//! Verifiable point function: a [`Dpf`] plus a proof that both evaluators
//! must reproduce byte for byte when they follow the protocol.

use tracing::{debug, instrument};
use crate::{config::*, dpf::*, error::*, hash::*, layout::*, prg::*, proof::*, util::*};

pub struct Vdpf {
    dpf: Dpf,
    hash_keys: HashKeyPair,
    hashes: VerificationHashes,
}

impl Vdpf {
    pub fn new(prf_key: &[u8], hash_keys: HashKeyPair) -> Result<Self> {
        Self::from_context(PrgContext::new(prf_key)?, hash_keys)
    }

    pub fn from_context(prg: PrgContext, hash_keys: HashKeyPair) -> Result<Self> {
        Ok(Self {
            dpf: Dpf::from_context(prg),
            hashes: VerificationHashes::new(&hash_keys)?,
            hash_keys,
        })
    }

    pub fn dpf(&self) -> &Dpf {
        &self.dpf
    }

    pub fn hash_keys(&self) -> &HashKeyPair {
        &self.hash_keys
    }

    pub fn required_key_size(data_size: usize, range_size: usize) -> Result<usize> {
        Ok(KeyLayout::point(range_size, data_size, true)?.size())
    }

    #[instrument(skip_all, fields(range_size = range_size, data_size = data_size))]
    pub fn gen(
        &self,
        special_index: u64,
        range_size: usize,
        data_size: usize,
        data: &[u8],
    ) -> Result<(DpfKey, DpfKey)> {
        let shares = self.dpf.gen_shares(special_index, range_size, data_size, data)?;
        let cs = xor_tags(
            &self.hashes.leaf_tag(special_index, shares.leaves[0]),
            &self.hashes.leaf_tag(special_index, shares.leaves[1]),
        );

        let keys = encode_point_keys(&shares, range_size, data_size, Some(&tag_to_bytes(&cs)))?;
        debug!(key_size = keys.0.bytes.len(), "generated verifiable point function keys");
        Ok(keys)
    }

    /// Output share and proof at a single index.
    pub fn eval(&self, key: &DpfKey, index: u64) -> Result<(Vec<u8>, Vec<u8>)> {
        self.ver_eval_indices(key, &[index])
    }

    /// Output shares for `indices`, concatenated in order, plus one proof for the batch.
    pub fn batch_ver_eval(&self, key: &DpfKey, indices: &[u64]) -> Result<(Vec<u8>, Vec<u8>)> {
        check_full_domain(key.range_size)?;
        self.ver_eval_indices(key, indices)
    }

    fn ver_eval_indices(&self, key: &DpfKey, indices: &[u64]) -> Result<(Vec<u8>, Vec<u8>)> {
        let parts = PointKeyParts::parse(key, true)?;
        if let Some(&index) = indices.iter().find(|&&i| !in_domain(i, key.range_size)) {
            return Err(FssError::IndexOutOfDomain { index, range_size: key.range_size });
        }

        let cs = tag_from_bytes(parts.proof_cs);
        let mut proof = self.hashes.accumulator(cs);
        let data_size = key.data_size;
        let mut out = vec![0u8; output_len(indices.len(), data_size)?];

        for (i, &index) in indices.iter().enumerate() {
            let (seed, bit) = self.dpf.descend(&parts, key.range_size, index);
            self.dpf
                .leaf_output(seed, bit, parts.last_cw, &mut out[i * data_size..(i + 1) * data_size]);
            proof.absorb(&self.correct_tag(index, seed, bit, &cs));
        }

        Ok((out, proof.finish()))
    }

    #[instrument(skip_all, fields(range_size = key.range_size, data_size = key.data_size))]
    pub fn full_domain_ver_eval(&self, key: &DpfKey) -> Result<(Vec<u8>, Vec<u8>)> {
        check_full_domain(key.range_size)?;
        let parts = PointKeyParts::parse(key, true)?;

        let cs = tag_from_bytes(parts.proof_cs);
        let mut proof = self.hashes.accumulator(cs);
        let leaves = self.dpf.expand_domain(&parts);
        let data_size = key.data_size;
        let mut out = vec![0u8; leaves.len() * data_size];

        for (i, &(seed, bit)) in leaves.iter().enumerate() {
            self.dpf
                .leaf_output(seed, bit, parts.last_cw, &mut out[i * data_size..(i + 1) * data_size]);
            proof.absorb(&self.correct_tag(i as u64, seed, bit, &cs));
        }

        debug!(leaves = leaves.len(), "verified full domain evaluation done");
        Ok((out, proof.finish()))
    }

    fn correct_tag(&self, index: u64, seed: u128, bit: bool, cs: &ProofTag) -> ProofTag {
        let tag = self.hashes.leaf_tag(index, seed);
        if bit {
            xor_tags(&tag, cs)
        } else {
            tag
        }
    }
}
