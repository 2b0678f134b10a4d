//! Keyed Matyas-Meyer-Oseas hash used by the verification layer.
//!
//! `H1` maps `(index, leaf seed)` to [`HASH1_OUT_BLOCKS`] blocks, `H2` folds the
//! running proof. Both evaluators must hold byte-identical [`HashKeyPair`]s.

use aes::{Aes128, cipher::{BlockEncrypt, KeyInit}};
use aes::cipher::generic_array::GenericArray;
use rand::RngCore;
use crate::{config::*, error::*};

pub type HashKey = [u8; BLOCK_SIZE];

/// The two public hash keys of a verifiable protocol run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashKeyPair {
    pub h1: HashKey,
    pub h2: HashKey,
}

impl HashKeyPair {
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let mut h1 = [0u8; BLOCK_SIZE];
        let mut h2 = [0u8; BLOCK_SIZE];
        rng.fill_bytes(&mut h1);
        rng.fill_bytes(&mut h2);
        Self { h1, h2 }
    }

    pub fn from_slices(h1: &[u8], h2: &[u8]) -> Result<Self> {
        Ok(Self {
            h1: to_hash_key(h1)?,
            h2: to_hash_key(h2)?,
        })
    }
}

fn to_hash_key(bytes: &[u8]) -> Result<HashKey> {
    bytes
        .try_into()
        .map_err(|_| FssError::Configuration { actual: bytes.len() })
}

pub struct MmoHash {
    cipher: Aes128,
    out_blocks: usize,
}

impl MmoHash {
    pub fn new(key: &[u8], out_blocks: usize) -> Result<Self> {
        if key.len() != BLOCK_SIZE {
            return Err(FssError::Configuration { actual: key.len() });
        }
        Ok(Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
            out_blocks,
        })
    }

    pub fn out_blocks(&self) -> usize {
        self.out_blocks
    }

    fn compress(&self, chain: u128) -> u128 {
        let mut block = GenericArray::from(chain.to_le_bytes());
        self.cipher.encrypt_block(&mut block);
        let bytes: [u8; BLOCK_SIZE] = block.into();
        u128::from_le_bytes(bytes) ^ chain
    }

    /// Output block `i` is the MMO chain over `input` started from the tag `i`.
    pub fn hash(&self, input: &[u128]) -> Vec<u128> {
        (0..self.out_blocks)
            .map(|i| {
                input
                    .iter()
                    .fold(i as u128, |chain, &block| self.compress(chain ^ block))
            })
            .collect()
    }
}
