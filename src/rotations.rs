//! Static rotation planning
//!
//! The client must generate one rotation key per distinct rotation amount the
//! server will use. Every amount is a function of layer shapes only, so the
//! plan is computed without encoding anything, without weight values and
//! without key material.

use std::collections::BTreeSet;

use crate::core::{HennError, Result};
use crate::encoding::linear::bsgs_rotations;
use crate::layers::{ConvShape, Layer, LinearLayer};

/// Galois element realizing a rotation by `k` slots in ring dimension `n`
///
/// `g = 5^k mod 2N`, with `k` normalized to `[0, N/2)` first, so negative
/// rotations map to `N/2 − |k|` and rotations congruent modulo the slot count
/// share an element (and a key).
pub fn galois_element_for_rotation(k: i64, n: usize) -> usize {
    let slots = (n / 2).max(1) as i64;
    let k_normalized = k.rem_euclid(slots) as usize;
    mod_pow(5, k_normalized, 2 * n)
}

/// Compute base^exp mod modulus using square-and-multiply
fn mod_pow(base: usize, mut exp: usize, modulus: usize) -> usize {
    if modulus == 1 {
        return 0;
    }

    let modulus = modulus as u128;
    let mut result: u128 = 1;
    let mut base = base as u128 % modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result * base % modulus;
        }
        base = base * base % modulus;
        exp >>= 1;
    }
    result as usize
}

/// Rotations keyed for `group_sum(_, batch, n)`
///
/// For every bit `i` while `n >> i != 0`: a shift by the higher bits
/// `(n − n mod 2^(i+1))·batch` when bit `i` is set, and the doubling step
/// `batch·2^i`. The default [`crate::core::Evaluator::group_sum`] never
/// doubles past the top bit, so it uses a subset of this set; a native
/// backend reduction may use all of it.
pub fn group_sum_rotations(batch: usize, n: usize) -> BTreeSet<i64> {
    let mut rotations = BTreeSet::new();
    let mut i = 0;
    while n >> i != 0 {
        if (n >> i) & 1 == 1 {
            let shift = (n - (n & ((2 << i) - 1))) * batch;
            if shift != 0 {
                rotations.insert(shift as i64);
            }
        }
        rotations.insert(((1usize << i) * batch) as i64);
        i += 1;
    }
    rotations
}

/// Rotations of one convolution: the group sum plus channel placement
pub fn conv_rotations(shape: &ConvShape) -> BTreeSet<i64> {
    let repeat = shape.repeat();
    let mut rotations = group_sum_rotations(repeat, shape.window_size());
    rotations.extend((1..shape.channels()).map(|c| -((c * repeat) as i64)));
    rotations
}

/// Rotations of one dense layer
pub fn linear_rotations(layer: &LinearLayer, slots: usize) -> Result<BTreeSet<i64>> {
    check_slots(slots)?;
    let shape = layer.shape()?;
    fits(&[shape.rows, shape.cols], slots)?;
    Ok(bsgs_rotations(shape, slots))
}

/// Rotations one layer performs at `slots` slots
///
/// # Errors
///
/// `InvalidParams` unless `slots` is a power of two, `SlotOverflow` when the
/// layer does not fit, and the layer's own validation errors.
pub fn layer_rotations(layer: &Layer, slots: usize) -> Result<BTreeSet<i64>> {
    check_slots(slots)?;
    match layer {
        Layer::Conv(conv) => {
            let shape = conv.shape()?;
            fits(&[shape.packed_len(), shape.output_len()], slots)?;
            Ok(conv_rotations(&shape))
        }
        Layer::Linear(linear) => linear_rotations(linear, slots),
        Layer::Activation(_) => Ok(BTreeSet::new()),
    }
}

fn check_slots(slots: usize) -> Result<()> {
    if !slots.is_power_of_two() {
        return Err(HennError::InvalidParams(format!(
            "slot count must be a power of two, got {}",
            slots
        )));
    }
    Ok(())
}

fn fits(lengths: &[usize], slots: usize) -> Result<()> {
    match lengths.iter().find(|&&needed| needed > slots) {
        Some(&needed) => Err(HennError::SlotOverflow { needed, slots }),
        None => Ok(()),
    }
}

/// Union of the rotations every layer performs at `slots` slots
pub fn plan_rotations(layers: &[Layer], slots: usize) -> Result<BTreeSet<i64>> {
    let mut plan = BTreeSet::new();
    for (index, layer) in layers.iter().enumerate() {
        let rotations =
            layer_rotations(layer, slots).map_err(|e| e.in_layer(index, layer.kind()))?;
        tracing::trace!(index, kind = layer.kind(), count = rotations.len(), "planned rotations");
        plan.extend(rotations);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{Activation, ConvLayer};

    fn set(values: &[i64]) -> BTreeSet<i64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_galois_element_identity() {
        assert_eq!(galois_element_for_rotation(0, 1024), 1);
        assert_eq!(galois_element_for_rotation(1, 1024), 5);
        assert_eq!(galois_element_for_rotation(2, 1024), 25);
    }

    #[test]
    fn test_galois_element_wraps_at_slot_count() {
        let n = 1024;
        assert_eq!(
            galois_element_for_rotation(-1, n),
            galois_element_for_rotation(511, n)
        );
        assert_eq!(
            galois_element_for_rotation(512 + 3, n),
            galois_element_for_rotation(3, n)
        );
    }

    #[test]
    fn test_galois_elements_distinct_within_slots() {
        // 5 has order N/2 modulo 2N
        let n = 64;
        let elements: std::collections::HashSet<usize> =
            (0..32).map(|k| galois_element_for_rotation(k, n)).collect();
        assert_eq!(elements.len(), 32);
    }

    #[test]
    fn test_group_sum_power_of_two() {
        // n = 4 = 0b100: doubling at every bit including the top one
        assert_eq!(group_sum_rotations(1, 4), set(&[1, 2, 4]));
        assert_eq!(group_sum_rotations(4, 4), set(&[4, 8, 16]));
    }

    #[test]
    fn test_group_sum_odd() {
        // n = 5 = 0b101: bit 0 shifts by 4, doubling by 1 and 2
        assert_eq!(group_sum_rotations(3, 5), set(&[3, 6, 12]));
    }

    #[test]
    fn test_group_sum_mnist_window() {
        // n = 49 = 0b110001, batch 64
        let expected = set(&[64, 128, 256, 512, 1024, 48 * 64, 32 * 64]);
        assert_eq!(group_sum_rotations(64, 49), expected);
    }

    #[test]
    fn test_group_sum_single_group() {
        assert_eq!(group_sum_rotations(8, 1), set(&[8]));
    }

    #[test]
    fn test_conv_channel_placement() {
        let conv = ConvLayer::new(3, 3, vec![vec![vec![1.0; 2]; 2]; 3], vec![0.0; 3], 1);
        let plan = conv_rotations(&conv.shape().unwrap());
        assert_eq!(plan, set(&[4, 8, 16, -4, -8]));
    }

    #[test]
    fn test_zero_slots_rejected() {
        let dense = LinearLayer::new(vec![vec![1.0, 2.0]], vec![0.0]);
        let err = plan_rotations(&[dense.into()], 0).unwrap_err();
        assert!(matches!(err.root(), HennError::InvalidParams(_)));
    }

    #[test]
    fn test_non_power_of_two_slots_rejected() {
        let err = plan_rotations(&[Activation::Square.into()], 12).unwrap_err();
        assert!(matches!(err.root(), HennError::InvalidParams(_)));
    }

    #[test]
    fn test_oversized_dense_layer() {
        let dense = LinearLayer::new(vec![vec![1.0; 9]], vec![0.0]);
        let err = plan_rotations(&[dense.into()], 8).unwrap_err();
        assert_eq!(err.root(), &HennError::SlotOverflow { needed: 9, slots: 8 });
    }

    #[test]
    fn test_oversized_conv_layer() {
        // 3x3 input, 2x2 window: 16 packed slots
        let conv = ConvLayer::new(3, 3, vec![vec![vec![1.0; 2]; 2]], vec![0.0], 1);
        let err = plan_rotations(&[conv.into()], 8).unwrap_err();
        assert_eq!(err.root(), &HennError::SlotOverflow { needed: 16, slots: 8 });
    }

    #[test]
    fn test_activation_needs_nothing() {
        let plan = plan_rotations(&[Activation::Square.into()], 1024).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_invalid_layer_carries_index() {
        let bad = LinearLayer::new(vec![vec![1.0], vec![1.0, 2.0]], vec![0.0; 2]);
        let err = plan_rotations(&[Activation::Square.into(), bad.into()], 64).unwrap_err();
        assert!(matches!(err, HennError::Layer { index: 1, kind: "linear", .. }));
    }
}
