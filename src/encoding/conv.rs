//! Convolution encoding
//!
//! Kernels are laid out to match the im2col packing of [`crate::packing`]:
//! weight `t` of a kernel (row-major over the window) fills the slot range
//! `[t·repeat, (t+1)·repeat)`. Multiplying a packed input by a packed kernel
//! and summing the `window_size` groups leaves the convolution outputs of one
//! channel in slots `[0, repeat)`.

use crate::core::{Encoder, HennError, Result};
use crate::encoding::EncodingContext;
use crate::layers::{ConvLayer, ConvShape};

/// Slot vectors of a convolution layer before encoding
#[derive(Debug, Clone, PartialEq)]
pub struct ConvPacking {
    pub shape: ConvShape,
    /// One `window_size·repeat` vector per channel
    pub kernels: Vec<Vec<f64>>,
    /// One `repeat` vector per channel
    pub biases: Vec<Vec<f64>>,
    /// Ones over the `repeat` valid post-sum slots
    pub mask: Vec<f64>,
}

impl ConvPacking {
    pub fn new(layer: &ConvLayer, slots: usize) -> Result<Self> {
        let shape = layer.shape()?;
        let repeat = shape.repeat();

        for needed in [shape.packed_len(), shape.output_len()] {
            if needed > slots {
                return Err(HennError::SlotOverflow { needed, slots });
            }
        }

        let kernels = layer
            .kernels
            .iter()
            .map(|kernel| {
                kernel
                    .iter()
                    .flatten()
                    .flat_map(|&w| std::iter::repeat(w).take(repeat))
                    .collect()
            })
            .collect();
        let biases = layer.biases.iter().map(|&b| vec![b; repeat]).collect();

        Ok(Self {
            shape,
            kernels,
            biases,
            mask: vec![1.0; repeat],
        })
    }
}

/// Convolution layer encoded for one context
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedConv<P> {
    pub window_size: usize,
    pub repeat_count: usize,
    pub channels: usize,
    pub stride: usize,
    /// Per channel, at (level, Δ)
    pub kernels: Vec<P>,
    /// Per channel, at (level, scale·Δ): added after the kernel product
    pub biases: Vec<P>,
    /// At (level, Δ)
    pub mask: P,
}

/// Encode a convolution for a ciphertext entering at `ctx`
pub fn encode_conv<E: Encoder>(
    layer: &ConvLayer,
    ctx: &EncodingContext,
    encoder: &E,
) -> Result<EncodedConv<E::Plaintext>> {
    let packing = ConvPacking::new(layer, ctx.slots)?;
    let delta = encoder.default_scale();

    let kernels = packing
        .kernels
        .iter()
        .map(|k| encoder.encode(k, ctx.level, delta))
        .collect::<Result<Vec<_>>>()?;
    let biases = packing
        .biases
        .iter()
        .map(|b| encoder.encode(b, ctx.level, ctx.scale * delta))
        .collect::<Result<Vec<_>>>()?;
    let mask = encoder.encode(&packing.mask, ctx.level, delta)?;

    Ok(EncodedConv {
        window_size: packing.shape.window_size(),
        repeat_count: packing.shape.repeat(),
        channels: packing.shape.channels(),
        stride: packing.shape.stride(),
        kernels,
        biases,
        mask,
    })
}
