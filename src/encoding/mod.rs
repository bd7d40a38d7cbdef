//! Layer encoding
//!
//! Turns plaintext layers into backend plaintexts laid out for slot-wise
//! evaluation. Encoding happens once per (layer, encryption context) and the
//! result is immutable.
//!
//! Every plaintext is encoded at the level and scale of the ciphertext it will
//! meet, which the engine works out ahead of time by walking the level/scale
//! schedule through [`EncodingContext`]s.

pub mod conv;
pub mod linear;

pub use conv::{encode_conv, ConvPacking, EncodedConv};
pub use linear::{encode_linear, DiagonalMatrix, EncodedLinear, LinearTransform};

use crate::core::{Evaluator, Result};
use crate::layers::{Activation, Layer};

/// State of the ciphertext entering a layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingContext {
    pub slots: usize,
    pub level: usize,
    pub scale: f64,
}

impl EncodingContext {
    /// Context of a freshly encrypted ciphertext
    pub fn fresh<E: Evaluator>(evaluator: &E) -> Self {
        Self {
            slots: evaluator.slots(),
            level: evaluator.max_level(),
            scale: evaluator.default_scale(),
        }
    }

    /// Same slot capacity at a new level and scale
    pub fn with(&self, (level, scale): (usize, f64)) -> Self {
        Self {
            slots: self.slots,
            level,
            scale,
        }
    }
}

/// A layer ready to run against ciphertexts
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedLayer<P> {
    Conv(EncodedConv<P>),
    Linear(EncodedLinear<P>),
    Activation(Activation),
}

impl<P> EncodedLayer<P> {
    pub fn kind(&self) -> &'static str {
        match self {
            EncodedLayer::Conv(_) => "conv",
            EncodedLayer::Linear(_) => "linear",
            EncodedLayer::Activation(_) => "activation",
        }
    }
}

/// Encode `layer` for a ciphertext entering at `ctx`
///
/// Returns the encoded layer and the context of the ciphertext leaving it.
pub fn encode_layer<E: Evaluator>(
    layer: &Layer,
    ctx: &EncodingContext,
    evaluator: &E,
) -> Result<(EncodedLayer<E::Plaintext>, EncodingContext)> {
    match layer {
        Layer::Conv(conv) => {
            let encoded = encode_conv(conv, ctx, evaluator)?;
            let delta = evaluator.default_scale();
            let next = evaluator.rescale_target(ctx.level, ctx.scale * delta * delta, delta)?;
            Ok((EncodedLayer::Conv(encoded), ctx.with(next)))
        }
        Layer::Linear(linear) => {
            let (encoded, next) = encode_linear(linear, ctx, evaluator)?;
            Ok((EncodedLayer::Linear(encoded), next))
        }
        Layer::Activation(activation) => {
            let next = activation.output_schedule(evaluator, ctx.level, ctx.scale)?;
            Ok((EncodedLayer::Activation(activation.clone()), ctx.with(next)))
        }
    }
}
