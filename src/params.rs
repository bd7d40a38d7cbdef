//! CKKS parameter sets
//!
//! A parameter set fixes the ring dimension N (slot capacity N/2), the moduli
//! chain used for leveled rescaling, and the default scale Δ.
//!
//! **Moduli chain layout:**
//! - `moduli[0]`: base prime, never dropped
//! - `moduli[1..]`: scaling primes, each ≈ Δ; rescaling at level ℓ divides by `moduli[ℓ]`
//!
//! The maximum multiplicative depth is therefore `moduli.len() - 1`.

use serde::{Deserialize, Serialize};

use crate::core::{HennError, Result};

/// CKKS parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CkksParams {
    /// Ring dimension (polynomial degree), power of two
    pub n: usize,

    /// Ciphertext modulus chain (for leveled FHE)
    pub moduli: Vec<u64>,

    /// Default scaling factor Δ
    pub scale: f64,

    /// Standard deviation for error distribution
    pub error_std: f64,
}

impl CkksParams {
    /// Test parameters (N=1024, depth-2)
    ///
    /// **Modulus chain:**
    /// - q₀ = 1152921504606584833 (60-bit)
    /// - q₁, q₂ ≈ 2^40 scaling primes
    pub fn new_test_1024() -> Self {
        Self {
            n: 1024,
            moduli: vec![
                1152921504606584833, // 60-bit: q ≡ 1 mod 2048
                1099511678977,       // 41-bit: q ≡ 1 mod 2048
                1099511683073,       // 41-bit: q ≡ 1 mod 2048
            ],
            scale: 2f64.powi(40),
            error_std: 3.2,
        }
    }

    /// Parameters for 128-bit security (N=8192, depth-8)
    pub fn new_128bit() -> Self {
        Self {
            n: 8192,
            moduli: vec![
                1152921504606994433, // 60-bit: q ≡ 1 mod 16384
                1099511922689,       // 41-bit: q ≡ 1 mod 16384
                1099512004609,
                1099512266753,
                1099512299521,
                1099512365057,
                1099512856577,
                1099512938497,
                1099513774081,
            ],
            scale: 2f64.powi(40),
            error_std: 3.2,
        }
    }

    /// Parameters sized for the MNIST network (N=8192, 4096 slots, depth-7)
    ///
    /// Conv (2 levels) + square + dense + square + dense needs depth 6; the
    /// chain leaves one level spare. Δ = 2^22 with 22-bit scaling primes keeps
    /// the chain short.
    pub fn new_mnist() -> Self {
        Self {
            n: 8192,
            moduli: vec![
                0x200038001, // 33-bit base prime
                0x438001,
                0x468001,
                0x498001,
                0x3e4001,
                0x3dc001,
                0x3ac001,
                0x390001,
            ],
            scale: 2f64.powi(22),
            error_std: 3.2,
        }
    }

    /// Number of slots in one ciphertext (N/2)
    pub fn slots(&self) -> usize {
        self.n / 2
    }

    /// Number of levels (depth) available
    pub fn max_level(&self) -> usize {
        self.moduli.len().saturating_sub(1)
    }

    /// Get the prime for a specific level in the modulus chain
    pub fn modulus_at_level(&self, level: usize) -> Result<u64> {
        self.moduli.get(level).copied().ok_or_else(|| {
            HennError::InvalidParams(format!(
                "level {} exceeds maximum {}",
                level,
                self.max_level()
            ))
        })
    }

    /// Check structural validity
    pub fn validate(&self) -> Result<()> {
        if self.n < 4 || !self.n.is_power_of_two() {
            return Err(HennError::InvalidParams(format!(
                "ring dimension must be a power of two >= 4, got {}",
                self.n
            )));
        }
        if self.moduli.is_empty() {
            return Err(HennError::InvalidParams("empty moduli chain".to_string()));
        }
        if let Some(q) = self.moduli.iter().find(|&&q| q < 2) {
            return Err(HennError::InvalidParams(format!("invalid modulus {}", q)));
        }
        if !(self.scale.is_finite() && self.scale > 1.0) {
            return Err(HennError::InvalidParams(format!(
                "scale must be finite and > 1, got {}",
                self.scale
            )));
        }
        if !(self.error_std.is_finite() && self.error_std >= 0.0) {
            return Err(HennError::InvalidParams(format!(
                "error_std must be finite and >= 0, got {}",
                self.error_std
            )));
        }
        Ok(())
    }

    /// Level and scale after rescaling toward `min_scale`
    ///
    /// Drops the last prime while the result stays at or above `min_scale / 2`.
    /// Fails when the chain bottoms out at level 0 with a scale still at least
    /// twice `min_scale` (no prime left to divide by).
    pub fn rescale_target(&self, level: usize, scale: f64, min_scale: f64) -> Result<(usize, f64)> {
        if level > self.max_level() {
            return Err(HennError::LevelMismatch {
                expected: self.max_level(),
                actual: level,
            });
        }

        let threshold = min_scale / 2.0;
        let mut level = level;
        let mut scale = scale;
        while level > 0 {
            let q = self.modulus_at_level(level)? as f64;
            if scale / q < threshold {
                break;
            }
            scale /= q;
            level -= 1;
        }

        if level == 0 && scale >= 2.0 * min_scale {
            return Err(HennError::LevelExhausted { level, scale });
        }
        Ok((level, scale))
    }
}

impl Default for CkksParams {
    fn default() -> Self {
        Self::new_128bit()
    }
}
