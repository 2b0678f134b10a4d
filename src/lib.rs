pub mod config;
pub mod error;
pub mod prg;
pub mod hash;
pub mod util;
pub mod layout;
pub mod dpf;
pub mod proof;
pub mod vdpf;
pub mod dmpf;
pub mod vdmpf;
pub mod compress;

pub use config::*;
pub use error::*;
pub use prg::{generate_prf_key, PrfKey, PrgContext};
pub use hash::{HashKey, HashKeyPair, MmoHash};
pub use layout::{KeyField, KeyLayout};
pub use dpf::{CorrectionWord, Dpf, DpfKey};
pub use proof::ProofAccumulator;
pub use vdpf::Vdpf;
pub use dmpf::{Dmpf, DmpfKey, SignCorrection};
pub use vdmpf::Vdmpf;
pub use compress::CompressedDmpfKey;

pub mod fss {
    use super::*;

    /// Combine two output shares into the function value
    ///
    /// # Arguments
    /// * `share_a` - Output of party A's key
    /// * `share_b` - Output of party B's key, same length
    ///
    /// # Returns
    /// * `Ok(value)` - XOR of the two shares
    /// * `Err(FssError::InputSize)` - Shares of different length
    pub fn reconstruct(share_a: &[u8], share_b: &[u8]) -> Result<Vec<u8>> {
        check_payload(share_b, share_a.len())?;
        let mut value = share_a.to_vec();
        util::xor_into(&mut value, share_b);
        Ok(value)
    }

    /// Evaluate both keys of a point function pair at `index`
    ///
    /// # Returns
    /// * Function value at `index`: the payload at the special index, zeros elsewhere
    pub fn evaluate_pair(dpf: &Dpf, key_a: &DpfKey, key_b: &DpfKey, index: u64) -> Result<Vec<u8>> {
        reconstruct(&dpf.eval(key_a, index)?, &dpf.eval(key_b, index)?)
    }

    /// Evaluate both keys of a multi point function pair at `index`
    pub fn evaluate_multi_pair(dmpf: &Dmpf, key_a: &DmpfKey, key_b: &DmpfKey, index: u64) -> Result<Vec<u8>> {
        reconstruct(&dmpf.eval(key_a, index)?, &dmpf.eval(key_b, index)?)
    }
}
