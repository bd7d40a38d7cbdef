//! Plaintexts and ciphertexts of the slot simulator
//!
//! Both hold the slot vector directly together with the bookkeeping a real
//! RNS-CKKS implementation carries: level, scale and (for ciphertexts) the
//! polynomial degree and the key they are bound to.

use serde::{Deserialize, Serialize};

/// Plaintext in slot form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plaintext {
    pub(crate) values: Vec<f64>,
    pub(crate) level: usize,
    pub(crate) scale: f64,
}

impl Plaintext {
    /// Quantize `values` (zero-padded to `slots`) at `scale`
    ///
    /// Each value is rounded to the nearest multiple of `1/scale`, the
    /// precision an integer coefficient encoding would keep.
    pub(crate) fn encode(values: &[f64], slots: usize, level: usize, scale: f64) -> Self {
        let mut slot_values = vec![0.0; slots];
        for (slot, &v) in slot_values.iter_mut().zip(values) {
            *slot = (v * scale).round() / scale;
        }
        Self {
            values: slot_values,
            level,
            scale,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// Ciphertext in slot form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub(crate) values: Vec<f64>,
    pub(crate) level: usize,
    pub(crate) scale: f64,
    /// 1 after encryption or relinearization, 2 after a ciphertext product
    pub(crate) degree: usize,
    pub(crate) key_id: u64,
}

impl Ciphertext {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn slots(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_pads_and_quantizes() {
        let pt = Plaintext::encode(&[0.3, -1.25], 4, 2, 4.0);
        // 0.3·4 = 1.2 rounds to 1
        assert_eq!(pt.values(), &[0.25, -1.25, 0.0, 0.0]);
        assert_eq!(pt.level(), 2);
        assert_eq!(pt.scale(), 4.0);
    }

    #[test]
    fn test_encode_truncates_excess() {
        let pt = Plaintext::encode(&[1.0, 2.0, 3.0], 2, 0, 1024.0);
        assert_eq!(pt.values(), &[1.0, 2.0]);
    }
}
