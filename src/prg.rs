use aes::{Aes128, cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher}};
use aes::cipher::generic_array::GenericArray;
use ctr::Ctr128BE;
use rand::RngCore;
use crate::{config::*, error::*};

type Aes128Ctr = Ctr128BE<Aes128>;

pub type PrfKey = [u8; BLOCK_SIZE];

pub fn generate_prf_key() -> PrfKey {
    let mut key = [0u8; BLOCK_SIZE];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Fixed-key AES context driving the GGM tree expansion.
///
/// One context is owned by one engine; it is released on drop.
pub struct PrgContext {
    cipher: Aes128,
}

impl PrgContext {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != BLOCK_SIZE {
            return Err(FssError::Configuration { actual: key.len() });
        }
        let cipher = Aes128::new(GenericArray::from_slice(key));
        Ok(Self { cipher })
    }

    fn encrypt(&self, input: u128) -> u128 {
        let mut block = GenericArray::from(input.to_le_bytes());
        self.cipher.encrypt_block(&mut block);
        let bytes: [u8; BLOCK_SIZE] = block.into();
        u128::from_le_bytes(bytes)
    }

    //Matyas-Meyer-Oseas
    fn mmo(&self, input: u128) -> u128 {
        self.encrypt(input) ^ input
    }

    /// Expand a seed into (left seed, left bit, right seed, right bit).
    pub fn expand(&self, seed: u128) -> (u128, bool, u128, bool) {
        let base = seed & !1;
        let left = self.mmo(base);
        let right = self.mmo(base | 1);

        (left & !1, left & 1 == 1, right & !1, right & 1 == 1)
    }

    /// Expand a seed into two child seeds and two `points`-bit sign vectors.
    pub fn expand_signs(&self, seed: u128, points: usize) -> (u128, u32, u128, u32) {
        let base = seed & !3;
        let left = self.mmo(base);
        let right = self.mmo(base | 1);
        let signs = self.mmo(base | 2);
        let mask = sign_mask(points);

        (left, signs as u32 & mask, right, (signs >> 32) as u32 & mask)
    }

    /// Fill `out` with the payload mask derived from a leaf seed.
    pub fn expand_block(&self, seed: u128, out: &mut [u8]) {
        let key_bytes = self.encrypt(seed).to_le_bytes();
        let nonce = GenericArray::from([0u8; BLOCK_SIZE]);
        let mut cipher = Aes128Ctr::new(GenericArray::from_slice(&key_bytes), &nonce);

        out.fill(0);
        cipher.apply_keystream(out);
    }
}
