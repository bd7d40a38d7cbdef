//! Capability traits for the homomorphic scheme
//!
//! The engine never touches ciphertext internals. Everything it needs from the
//! scheme goes through these traits, so any CKKS implementation (CPU, GPU, or
//! the bundled slot simulator) can drive the same encoded model.
//!
//! Two reductions are provided as default methods built from the primitives:
//! - [`Evaluator::group_sum`]: log-depth sum of `n` groups of `batch_size` slots
//! - [`Evaluator::linear_transform`]: baby-step/giant-step diagonal matrix-vector product
//!
//! Backends may override either with a native implementation, as long as it
//! uses the same rotation amounts (see [`crate::rotations`]).

use std::collections::BTreeMap;

use super::types::{HennError, Result};
use crate::encoding::linear::LinearTransform;

/// Plaintext encoding for one encryption context
pub trait Encoder {
    /// Plaintext type (backend-specific)
    type Plaintext: Clone + Send + Sync;

    /// Number of slots in one plaintext/ciphertext
    fn slots(&self) -> usize;

    /// Highest level of a fresh ciphertext
    fn max_level(&self) -> usize;

    /// Nominal scale Δ
    fn default_scale(&self) -> f64;

    /// Encode `values` (zero-padded to `slots`) at `level` and `scale`
    fn encode(&self, values: &[f64], level: usize, scale: f64) -> Result<Self::Plaintext>;
}

/// Homomorphic evaluator bound to evaluation keys
pub trait Evaluator: Encoder + Send + Sync {
    /// Ciphertext type (backend-specific)
    type Ciphertext: Clone + Send + Sync;

    /// Current level of `ct`
    fn level(&self, ct: &Self::Ciphertext) -> usize;

    /// Current scale of `ct`
    fn scale(&self, ct: &Self::Ciphertext) -> f64;

    fn add(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn add_plain(&self, ct: &Self::Ciphertext, pt: &Self::Plaintext) -> Result<Self::Ciphertext>;

    /// Slot-wise product with a plaintext; scales multiply
    fn mul_plain(&self, ct: &Self::Ciphertext, pt: &Self::Plaintext) -> Result<Self::Ciphertext>;

    /// Ciphertext product without relinearization (degree 2 result)
    fn mul(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    fn relinearize(&self, ct: &Self::Ciphertext) -> Result<Self::Ciphertext>;

    /// Ciphertext product followed by relinearization
    fn mul_relin(&self, a: &Self::Ciphertext, b: &Self::Ciphertext) -> Result<Self::Ciphertext> {
        let product = self.mul(a, b)?;
        self.relinearize(&product)
    }

    /// Cyclic left rotation: `out[i] = in[(i + k) mod slots]`
    fn rotate(&self, ct: &Self::Ciphertext, k: i64) -> Result<Self::Ciphertext>;

    /// Whether `rotate(_, k)` is backed by key material
    fn has_rotation_key(&self, k: i64) -> bool;

    /// Level and scale a ciphertext at (`level`, `scale`) ends up at after
    /// `rescale(_, min_scale)`, without touching any ciphertext
    fn rescale_target(&self, level: usize, scale: f64, min_scale: f64) -> Result<(usize, f64)>;

    /// Divide by the last primes until the scale is close to `min_scale`
    fn rescale(&self, ct: &Self::Ciphertext, min_scale: f64) -> Result<Self::Ciphertext>;

    /// Sum `n` groups of `batch_size` consecutive slots into the first group
    ///
    /// Computes `Σ_{t<n} rotate(ct, t·batch_size)` with O(log n) rotations:
    /// partial sums `T_{i+1} = T_i + rotate(T_i, 2^i·batch_size)` are built by
    /// doubling, and for every set bit `i` of `n` the partial sum `T_i` is
    /// shifted by the higher bits `(n − n mod 2^(i+1))·batch_size` and accumulated.
    fn group_sum(
        &self,
        ct: &Self::Ciphertext,
        batch_size: usize,
        n: usize,
    ) -> Result<Self::Ciphertext> {
        if n == 0 || batch_size == 0 {
            return Err(HennError::InvalidParams(format!(
                "group sum needs n >= 1 and batch_size >= 1, got n={} batch_size={}",
                n, batch_size
            )));
        }

        let mut acc: Option<Self::Ciphertext> = None;
        let mut partial = ct.clone();
        let mut i = 0;
        while n >> i != 0 {
            if (n >> i) & 1 == 1 {
                let shift = (n - (n & ((2 << i) - 1))) * batch_size;
                let term = if shift == 0 {
                    partial.clone()
                } else {
                    tracing::trace!(shift, "group sum: shift partial");
                    self.rotate(&partial, shift as i64)?
                };
                acc = Some(match acc {
                    None => term,
                    Some(sum) => self.add(&sum, &term)?,
                });
            }
            if n >> (i + 1) != 0 {
                let step = (1usize << i) * batch_size;
                tracing::trace!(step, "group sum: double");
                let rotated = self.rotate(&partial, step as i64)?;
                partial = self.add(&partial, &rotated)?;
            }
            i += 1;
        }

        // n >= 1 has at least one set bit
        acc.ok_or_else(|| HennError::InvalidParams("empty group sum".to_string()))
    }

    /// Matrix-vector product from pre-rotated diagonals (baby-step/giant-step)
    ///
    /// `y = Σ_g rotate( Σ_b diag'[g+b] ⊙ rotate(x, b), g )`, where `diag'` is
    /// stored pre-rotated by `−g`. Baby-step rotations of the input are
    /// computed once and shared by every giant step.
    fn linear_transform(
        &self,
        ct: &Self::Ciphertext,
        transform: &LinearTransform<Self::Plaintext>,
    ) -> Result<Self::Ciphertext> {
        let mut baby: BTreeMap<i64, Self::Ciphertext> = BTreeMap::new();
        for b in transform.baby_steps() {
            let rotated = if b == 0 {
                ct.clone()
            } else {
                self.rotate(ct, b)?
            };
            baby.insert(b, rotated);
        }

        let mut total: Option<Self::Ciphertext> = None;
        for (giant, terms) in transform.giant_steps() {
            let mut inner: Option<Self::Ciphertext> = None;
            for (b, diagonal) in terms {
                let input = baby.get(b).ok_or_else(|| {
                    HennError::InvalidParams(format!("baby step {} was not precomputed", b))
                })?;
                let product = self.mul_plain(input, diagonal)?;
                inner = Some(match inner {
                    None => product,
                    Some(sum) => self.add(&sum, &product)?,
                });
            }

            let Some(inner) = inner else { continue };
            let shifted = if giant == 0 {
                inner
            } else {
                self.rotate(&inner, giant)?
            };
            total = Some(match total {
                None => shifted,
                Some(sum) => self.add(&sum, &shifted)?,
            });
        }

        total.ok_or_else(|| {
            HennError::InvalidLayer("linear transform has no diagonals".to_string())
        })
    }
}
