//! Key material for the slot simulator
//!
//! Keys carry no lattice data. A secret key is an identifier drawn from the
//! context's RNG; every derived key records that identifier so the evaluator
//! can reject operands from a different key pair, the same way real key
//! switching would produce garbage.
//!
//! ## Galois Automorphisms
//!
//! A rotation by k slots corresponds to the Galois automorphism σ_g with
//! g = 5^k mod 2N. Rotation keys are stored by Galois element, so `k` and
//! `k ± N/2` share a key.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use crate::rotations::galois_element_for_rotation;

/// Secret key (client only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretKey {
    pub(crate) id: u64,
}

/// Public encryption key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub key_id: u64,
}

/// Relinearization (evaluation) key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelinearizationKey {
    pub key_id: u64,
}

/// Key-switching key for one Galois automorphism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationKey {
    pub key_id: u64,
    pub galois_element: usize,
}

/// Rotation keys indexed by Galois element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationKeys {
    pub keys: HashMap<usize, RotationKey>,
    /// Ring dimension
    pub n: usize,
}

impl RotationKeys {
    pub fn new(n: usize) -> Self {
        Self {
            keys: HashMap::new(),
            n,
        }
    }

    pub fn add_key(&mut self, key: RotationKey) {
        self.keys.insert(key.galois_element, key);
    }

    pub fn get_key(&self, galois_element: usize) -> Option<&RotationKey> {
        self.keys.get(&galois_element)
    }

    /// Key for a rotation by `k` slots, if present
    pub fn for_rotation(&self, k: i64) -> Option<&RotationKey> {
        self.get_key(galois_element_for_rotation(k, self.n))
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }
}

/// Everything the server needs to evaluate: no secret material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicKeySet {
    pub params: crate::params::CkksParams,
    pub public_key: PublicKey,
    pub relin_key: Option<RelinearizationKey>,
    pub rotation_keys: RotationKeys,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_lookup() {
        let mut keys = RotationKeys::new(16);
        let g = galois_element_for_rotation(-2, 16);
        keys.add_key(RotationKey {
            key_id: 9,
            galois_element: g,
        });
        assert!(keys.for_rotation(6).is_some());
        assert!(keys.for_rotation(2).is_none());
        assert_eq!(keys.num_keys(), 1);
    }
}
