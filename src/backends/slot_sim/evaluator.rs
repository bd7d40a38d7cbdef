//! Server-side evaluator for the slot simulator
//!
//! Holds only evaluation keys. Every operation enforces the same preconditions
//! a lattice implementation would fail on (key identity, levels, scales,
//! ciphertext degree, presence of key-switching keys) and tracks level and
//! scale exactly as RNS-CKKS does.

use super::ckks::{Ciphertext, Plaintext};
use super::keys::{galois_element_for_rotation, PublicKeySet, RotationKeys};
use crate::core::{Encoder, Evaluator, HennError, Result};
use crate::params::CkksParams;

/// Largest relative scale difference tolerated on addition
const SCALE_TOLERANCE: f64 = 1e-6;

/// Stateless evaluator bound to a [`PublicKeySet`]
#[derive(Debug, Clone)]
pub struct SimEvaluator {
    params: CkksParams,
    key_id: u64,
    has_relin_key: bool,
    rotation_keys: RotationKeys,
}

impl SimEvaluator {
    pub fn new(keys: &PublicKeySet) -> Self {
        Self {
            params: keys.params.clone(),
            key_id: keys.public_key.key_id,
            has_relin_key: keys.relin_key.is_some(),
            rotation_keys: keys.rotation_keys.clone(),
        }
    }

    pub fn params(&self) -> &CkksParams {
        &self.params
    }

    fn check_key(&self, ct: &Ciphertext) -> Result<()> {
        if ct.key_id != self.key_id {
            return Err(HennError::KeyMismatch {
                expected: self.key_id,
                found: ct.key_id,
            });
        }
        Ok(())
    }

    fn check_degree(ct: &Ciphertext) -> Result<()> {
        if ct.degree != 1 {
            return Err(HennError::UnrelinearizedCiphertext(ct.degree));
        }
        Ok(())
    }

    /// Plaintext usable at `level`; higher-level plaintexts are truncated down
    fn check_plain_level(pt: &Plaintext, level: usize) -> Result<()> {
        if pt.level < level {
            return Err(HennError::LevelMismatch {
                expected: level,
                actual: pt.level,
            });
        }
        Ok(())
    }

    fn check_scales(left: f64, right: f64) -> Result<()> {
        if ((left - right) / left).abs() > SCALE_TOLERANCE {
            return Err(HennError::ScaleMismatch { left, right });
        }
        Ok(())
    }
}

impl Encoder for SimEvaluator {
    type Plaintext = Plaintext;

    fn slots(&self) -> usize {
        self.params.slots()
    }

    fn max_level(&self) -> usize {
        self.params.max_level()
    }

    fn default_scale(&self) -> f64 {
        self.params.scale
    }

    fn encode(&self, values: &[f64], level: usize, scale: f64) -> Result<Plaintext> {
        let slots = self.slots();
        if values.len() > slots {
            return Err(HennError::SlotOverflow {
                needed: values.len(),
                slots,
            });
        }
        if level > self.max_level() {
            return Err(HennError::LevelMismatch {
                expected: self.max_level(),
                actual: level,
            });
        }
        Ok(Plaintext::encode(values, slots, level, scale))
    }
}

impl Evaluator for SimEvaluator {
    type Ciphertext = Ciphertext;

    fn level(&self, ct: &Ciphertext) -> usize {
        ct.level
    }

    fn scale(&self, ct: &Ciphertext) -> f64 {
        ct.scale
    }

    fn add(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_key(a)?;
        self.check_key(b)?;
        Self::check_scales(a.scale, b.scale)?;

        let values = a.values.iter().zip(&b.values).map(|(x, y)| x + y).collect();
        Ok(Ciphertext {
            values,
            level: a.level.min(b.level),
            scale: a.scale,
            degree: a.degree.max(b.degree),
            key_id: a.key_id,
        })
    }

    fn add_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_key(ct)?;
        Self::check_plain_level(pt, ct.level)?;
        Self::check_scales(ct.scale, pt.scale)?;

        let values = ct.values.iter().zip(&pt.values).map(|(x, y)| x + y).collect();
        Ok(Ciphertext {
            values,
            ..ct.clone()
        })
    }

    fn mul_plain(&self, ct: &Ciphertext, pt: &Plaintext) -> Result<Ciphertext> {
        self.check_key(ct)?;
        Self::check_plain_level(pt, ct.level)?;

        let values = ct.values.iter().zip(&pt.values).map(|(x, y)| x * y).collect();
        Ok(Ciphertext {
            values,
            scale: ct.scale * pt.scale,
            ..ct.clone()
        })
    }

    fn mul(&self, a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
        self.check_key(a)?;
        self.check_key(b)?;
        Self::check_degree(a)?;
        Self::check_degree(b)?;

        let values = a.values.iter().zip(&b.values).map(|(x, y)| x * y).collect();
        Ok(Ciphertext {
            values,
            level: a.level.min(b.level),
            scale: a.scale * b.scale,
            degree: 2,
            key_id: a.key_id,
        })
    }

    fn relinearize(&self, ct: &Ciphertext) -> Result<Ciphertext> {
        self.check_key(ct)?;
        if !self.has_relin_key {
            return Err(HennError::MissingRelinearizationKey);
        }
        Ok(Ciphertext {
            degree: 1,
            ..ct.clone()
        })
    }

    fn rotate(&self, ct: &Ciphertext, k: i64) -> Result<Ciphertext> {
        self.check_key(ct)?;
        Self::check_degree(ct)?;

        let galois_element = galois_element_for_rotation(k, self.params.n);
        match self.rotation_keys.get_key(galois_element) {
            Some(key) if key.key_id == self.key_id => {}
            Some(key) => {
                return Err(HennError::KeyMismatch {
                    expected: self.key_id,
                    found: key.key_id,
                })
            }
            None => {
                return Err(HennError::MissingRotationKey {
                    rotation: k,
                    galois_element,
                })
            }
        }

        let slots = ct.values.len();
        let shift = k.rem_euclid(slots as i64) as usize;
        let mut values = ct.values.clone();
        values.rotate_left(shift);
        Ok(Ciphertext {
            values,
            ..ct.clone()
        })
    }

    fn has_rotation_key(&self, k: i64) -> bool {
        self.rotation_keys.for_rotation(k).is_some()
    }

    fn rescale_target(&self, level: usize, scale: f64, min_scale: f64) -> Result<(usize, f64)> {
        self.params.rescale_target(level, scale, min_scale)
    }

    fn rescale(&self, ct: &Ciphertext, min_scale: f64) -> Result<Ciphertext> {
        self.check_key(ct)?;
        Self::check_degree(ct)?;

        let (level, scale) = self.rescale_target(ct.level, ct.scale, min_scale)?;
        tracing::trace!(from = ct.level, to = level, scale, "rescale");
        Ok(Ciphertext {
            level,
            scale,
            ..ct.clone()
        })
    }
}
