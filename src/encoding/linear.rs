//! Dense layer encoding (diagonal method with baby-step/giant-step)
//!
//! A matrix-vector product `y = W·x` over slot vectors of length `S` is
//!
//! ```text
//! y = Σ_d diag[d] ⊙ rot(x, d),    diag[d][j] = W[j][(j + d) mod S]
//! ```
//!
//! For an N×M matrix only the diagonals `d ≡ c − j (mod S)` with `c < M`,
//! `j < N` can be non-zero; these are the *structural* diagonals, a set that
//! depends on the shape alone. Diagonal indices are split as `d = g + b` with
//! `g` a multiple of the giant-step width `n1` and `0 <= b < n1`, so that
//!
//! ```text
//! y = Σ_g rot( Σ_b diag'[g+b] ⊙ rot(x, b), g ),   diag'[g+b] = rot(diag[g+b], −g)
//! ```
//!
//! needs one rotation per distinct `b` and one per distinct `g`, about
//! `2·sqrt(#diagonals)` in total.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::{Encoder, Evaluator, HennError, Result};
use crate::encoding::EncodingContext;
use crate::layers::{LinearLayer, LinearShape};

/// Structural diagonals of an N×M matrix as signed rotation indices
///
/// `d` in `[0, S)` maps to `d` if `d < M`, else `d − S`.
pub(crate) fn structural_diagonals(shape: LinearShape, slots: usize) -> BTreeSet<i64> {
    let s = slots as i64;
    let m = shape.cols as i64;
    let n = shape.rows as i64;
    (-(n - 1)..m)
        .map(|offset| signed_index(offset.rem_euclid(s), m, s))
        .collect()
}

fn signed_index(d: i64, cols: i64, slots: i64) -> i64 {
    if d < cols {
        d
    } else {
        d - slots
    }
}

/// Giant-step width: next power of two of `ceil(sqrt(#structural diagonals))`
pub(crate) fn giant_step_width(shape: LinearShape, slots: usize) -> usize {
    let count = structural_diagonals(shape, slots).len();
    let mut root = (count as f64).sqrt().ceil() as usize;
    // guard against float rounding either way
    while root * root < count {
        root += 1;
    }
    while root > 1 && (root - 1) * (root - 1) >= count {
        root -= 1;
    }
    root.max(1).next_power_of_two()
}

/// Split a signed diagonal index into (giant step, baby step)
pub(crate) fn split_index(d: i64, giant_step: usize) -> (i64, i64) {
    let n1 = giant_step as i64;
    (d.div_euclid(n1) * n1, d.rem_euclid(n1))
}

/// Rotations used when every structural diagonal is present
pub(crate) fn bsgs_rotations(shape: LinearShape, slots: usize) -> BTreeSet<i64> {
    let n1 = giant_step_width(shape, slots);
    let mut rotations = BTreeSet::new();
    for d in structural_diagonals(shape, slots) {
        let (g, b) = split_index(d, n1);
        if g != 0 {
            rotations.insert(g);
        }
        if b != 0 {
            rotations.insert(b);
        }
    }
    rotations
}

/// Non-zero diagonals of a weight matrix, keyed by signed index
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalMatrix {
    pub shape: LinearShape,
    pub slots: usize,
    pub giant_step: usize,
    pub diagonals: BTreeMap<i64, Vec<f64>>,
}

impl DiagonalMatrix {
    pub fn new(layer: &LinearLayer, slots: usize) -> Result<Self> {
        let shape = layer.shape()?;
        for needed in [shape.rows, shape.cols] {
            if needed > slots {
                return Err(HennError::SlotOverflow { needed, slots });
            }
        }

        let s = slots as i64;
        let mut diagonals = BTreeMap::new();
        for d in structural_diagonals(shape, slots) {
            let start = d.rem_euclid(s) as usize;
            let mut diag = vec![0.0; slots];
            for (j, row) in layer.weights.iter().enumerate() {
                let col = (start + j) % slots;
                if col < shape.cols {
                    diag[j] = row[col];
                }
            }
            if diag.iter().any(|&v| v != 0.0) {
                diagonals.insert(d, diag);
            }
        }
        // All-zero weights still need one term so the transform has an output
        if diagonals.is_empty() {
            diagonals.insert(0, vec![0.0; slots]);
        }

        Ok(Self {
            shape,
            slots,
            giant_step: giant_step_width(shape, slots),
            diagonals,
        })
    }

    /// Encode the pre-rotated diagonals grouped by giant step
    pub fn encode<E: Encoder>(
        &self,
        encoder: &E,
        level: usize,
        scale: f64,
    ) -> Result<LinearTransform<E::Plaintext>> {
        let s = self.slots as i64;
        let mut groups: BTreeMap<i64, Vec<(i64, E::Plaintext)>> = BTreeMap::new();
        for (&d, diag) in &self.diagonals {
            let (g, b) = split_index(d, self.giant_step);
            let rotated: Vec<f64> = (0..s)
                .map(|i| diag[(i - g).rem_euclid(s) as usize])
                .collect();
            let pt = encoder.encode(&rotated, level, scale)?;
            groups.entry(g).or_default().push((b, pt));
        }

        Ok(LinearTransform {
            giant_step: self.giant_step,
            level,
            scale,
            groups,
        })
    }
}

/// Pre-rotated diagonal plaintexts grouped by giant step
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTransform<P> {
    pub giant_step: usize,
    pub level: usize,
    pub scale: f64,
    groups: BTreeMap<i64, Vec<(i64, P)>>,
}

impl<P> LinearTransform<P> {
    /// Giant steps in ascending order with their (baby step, diagonal) terms
    pub fn giant_steps(&self) -> impl Iterator<Item = (i64, &[(i64, P)])> + '_ {
        self.groups.iter().map(|(&g, terms)| (g, terms.as_slice()))
    }

    /// Distinct baby steps, including 0 when used
    pub fn baby_steps(&self) -> BTreeSet<i64> {
        self.groups
            .values()
            .flat_map(|terms| terms.iter().map(|(b, _)| *b))
            .collect()
    }

    /// Non-zero rotations performed by one evaluation
    pub fn rotations(&self) -> BTreeSet<i64> {
        self.baby_steps()
            .into_iter()
            .chain(self.groups.keys().copied())
            .filter(|&k| k != 0)
            .collect()
    }

    pub fn diagonal_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Dense layer encoded for one context
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedLinear<P> {
    pub transform: LinearTransform<P>,
    /// Length-N bias at the post-rescale level and scale
    pub bias: P,
}

/// Encode a dense layer for a ciphertext entering at `ctx`
///
/// Returns the encoded layer and the context after the layer.
pub fn encode_linear<E: Evaluator>(
    layer: &LinearLayer,
    ctx: &EncodingContext,
    evaluator: &E,
) -> Result<(EncodedLinear<E::Plaintext>, EncodingContext)> {
    let diagonals = DiagonalMatrix::new(layer, ctx.slots)?;
    let delta = evaluator.default_scale();
    let transform = diagonals.encode(evaluator, ctx.level, delta)?;

    let next = ctx.with(evaluator.rescale_target(ctx.level, ctx.scale * delta, delta)?);
    let bias = evaluator.encode(&layer.bias, next.level, next.scale)?;

    Ok((EncodedLinear { transform, bias }, next))
}
