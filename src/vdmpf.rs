//! Verifiable multi point function.
//!
//! Each point `k` stores the proof correction `cs_k`; a leaf tag is corrected
//! by every `cs_k` its sign vector selects, which cancels the single sign bit
//! in which the two parties differ on a special path.

use tracing::{debug, instrument};
use crate::{config::*, dmpf::*, error::*, hash::*, layout::*, prg::*, proof::*, util::*};

pub struct Vdmpf {
    dmpf: Dmpf,
    hash_keys: HashKeyPair,
    hashes: VerificationHashes,
}

impl Vdmpf {
    pub fn new(prf_key: &[u8], hash_keys: HashKeyPair) -> Result<Self> {
        Self::from_context(PrgContext::new(prf_key)?, hash_keys)
    }

    pub fn from_context(prg: PrgContext, hash_keys: HashKeyPair) -> Result<Self> {
        Ok(Self {
            dmpf: Dmpf::from_context(prg),
            hashes: VerificationHashes::new(&hash_keys)?,
            hash_keys,
        })
    }

    pub fn dmpf(&self) -> &Dmpf {
        &self.dmpf
    }

    pub fn hash_keys(&self) -> &HashKeyPair {
        &self.hash_keys
    }

    pub fn required_key_size(data_size: usize, range_size: usize, range_points: usize) -> Result<usize> {
        Ok(KeyLayout::multi_point(range_size, range_points, data_size, true)?.size())
    }

    #[instrument(skip_all, fields(range_size = range_size, points = range_points, data_size = data_size))]
    pub fn gen(
        &self,
        indices: &[u64],
        range_size: usize,
        range_points: usize,
        data_size: usize,
        data: &[u8],
    ) -> Result<(DmpfKey, DmpfKey)> {
        let shares = self.dmpf.gen_shares(indices, range_size, range_points, data_size, data)?;

        let mut cs = Vec::with_capacity(PROOF_CORRECTION_SIZE * range_points);
        for (k, &index) in indices.iter().enumerate() {
            let tag = xor_tags(
                &self.hashes.leaf_tag(index, shares.leaves[0][k]),
                &self.hashes.leaf_tag(index, shares.leaves[1][k]),
            );
            cs.extend(tag_to_bytes(&tag));
        }

        let keys = encode_multi_keys(&shares, range_size, range_points, data_size, Some(&cs))?;
        debug!(key_size = keys.0.bytes.len(), "generated verifiable multi point function keys");
        Ok(keys)
    }

    pub fn eval(&self, key: &DmpfKey, index: u64) -> Result<(Vec<u8>, Vec<u8>)> {
        self.ver_eval_indices(key, &[index])
    }

    pub fn batch_ver_eval(&self, key: &DmpfKey, indices: &[u64]) -> Result<(Vec<u8>, Vec<u8>)> {
        check_full_domain(key.range_size)?;
        self.ver_eval_indices(key, indices)
    }

    fn ver_eval_indices(&self, key: &DmpfKey, indices: &[u64]) -> Result<(Vec<u8>, Vec<u8>)> {
        let parts = MultiKeyParts::parse(key, true)?;
        if let Some(&index) = indices.iter().find(|&&i| !in_domain(i, key.range_size)) {
            return Err(FssError::IndexOutOfDomain { index, range_size: key.range_size });
        }

        let corrections = point_corrections(parts.proof_cs);
        let mut proof = self.hashes.accumulator(initial_proof(&corrections));
        let data_size = key.data_size;
        let mut out = vec![0u8; output_len(indices.len(), data_size)?];

        for (i, &index) in indices.iter().enumerate() {
            let (seed, sign) = descend(self.dmpf.prg(), &parts, key.range_size, index);
            let block = &mut out[i * data_size..(i + 1) * data_size];
            leaf_output(self.dmpf.prg(), seed, sign, parts.payload, block);
            proof.absorb(&self.correct_tag(index, seed, sign, &corrections));
        }

        Ok((out, proof.finish()))
    }

    #[instrument(skip_all, fields(range_size = key.range_size, points = key.range_points))]
    pub fn full_domain_ver_eval(&self, key: &DmpfKey) -> Result<(Vec<u8>, Vec<u8>)> {
        check_full_domain(key.range_size)?;
        let parts = MultiKeyParts::parse(key, true)?;

        let corrections = point_corrections(parts.proof_cs);
        let mut proof = self.hashes.accumulator(initial_proof(&corrections));
        let leaves = expand_domain(self.dmpf.prg(), &parts, key.range_size);
        let data_size = key.data_size;
        let mut out = vec![0u8; leaves.len() * data_size];

        for (i, &(seed, sign)) in leaves.iter().enumerate() {
            let block = &mut out[i * data_size..(i + 1) * data_size];
            leaf_output(self.dmpf.prg(), seed, sign, parts.payload, block);
            proof.absorb(&self.correct_tag(i as u64, seed, sign, &corrections));
        }

        debug!(leaves = leaves.len(), "verified multi point full domain evaluation done");
        Ok((out, proof.finish()))
    }

    fn correct_tag(&self, index: u64, seed: u128, sign: u32, corrections: &[ProofTag]) -> ProofTag {
        set_bits(sign)
            .filter_map(|k| corrections.get(k))
            .fold(self.hashes.leaf_tag(index, seed), |tag, cs| xor_tags(&tag, cs))
    }
}

fn point_corrections(bytes: &[u8]) -> Vec<ProofTag> {
    bytes.chunks_exact(PROOF_CORRECTION_SIZE).map(tag_from_bytes).collect()
}

fn initial_proof(corrections: &[ProofTag]) -> ProofTag {
    corrections
        .iter()
        .fold([0u128; HASH1_OUT_BLOCKS], |acc, cs| xor_tags(&acc, cs))
}
