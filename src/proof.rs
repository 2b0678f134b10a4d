//! Proof accumulation shared by the verifiable point and multi point evaluators.
//!
//! Every evaluated leaf contributes a tag `H1(index, seed)`, corrected on the
//! special paths so that honest parties fold identical tags. Tags are folded
//! into a 4-block state with `pi ^= H2(pi ^ tag)`; the proof is SHA-256 of the
//! final state.

use sha2::{Digest, Sha256};
use crate::{config::*, error::*, hash::*, util::*};

pub type ProofTag = [u128; HASH1_OUT_BLOCKS];

fn to_tag(blocks: Vec<u128>) -> ProofTag {
    let mut tag = [0u128; HASH1_OUT_BLOCKS];
    for (dst, src) in tag.iter_mut().zip(blocks) {
        *dst = src;
    }
    tag
}

pub fn xor_tags(a: &ProofTag, b: &ProofTag) -> ProofTag {
    std::array::from_fn(|i| a[i] ^ b[i])
}

pub fn tag_from_bytes(bytes: &[u8]) -> ProofTag {
    let mut tag = [0u128; HASH1_OUT_BLOCKS];
    for (dst, chunk) in tag.iter_mut().zip(bytes.chunks_exact(BLOCK_SIZE)) {
        *dst = read_block(chunk);
    }
    tag
}

pub fn tag_to_bytes(tag: &ProofTag) -> Vec<u8> {
    blocks_to_bytes(tag)
}

/// H1 and H2 instantiated from one [`HashKeyPair`].
pub struct VerificationHashes {
    h1: MmoHash,
    h2: MmoHash,
}

impl VerificationHashes {
    pub fn new(keys: &HashKeyPair) -> Result<Self> {
        Ok(Self {
            h1: MmoHash::new(&keys.h1, HASH1_OUT_BLOCKS)?,
            h2: MmoHash::new(&keys.h2, HASH2_OUT_BLOCKS)?,
        })
    }

    pub fn leaf_tag(&self, index: u64, seed: u128) -> ProofTag {
        to_tag(self.h1.hash(&[index as u128, seed]))
    }

    pub fn accumulator(&self, initial: ProofTag) -> ProofAccumulator<'_> {
        ProofAccumulator { hashes: self, pi: initial }
    }
}

pub struct ProofAccumulator<'a> {
    hashes: &'a VerificationHashes,
    pi: ProofTag,
}

impl<'a> ProofAccumulator<'a> {
    pub fn absorb(&mut self, tag: &ProofTag) {
        let folded = to_tag(self.hashes.h2.hash(&xor_tags(&self.pi, tag)));
        self.pi = xor_tags(&self.pi, &folded);
    }

    pub fn finish(self) -> Vec<u8> {
        Sha256::digest(tag_to_bytes(&self.pi)).to_vec()
    }
}
