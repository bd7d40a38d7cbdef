//! Inference engine
//!
//! A model moves through three states:
//!
//! ```text
//! ModelBuilder ──build()──▶ UnboundModel ──initialize(evaluator)──▶ Model<E>
//!                                ▲                                     │
//!                                └────────────into_unbound()───────────┘
//! ```
//!
//! `UnboundModel` holds validated plaintext layers and answers questions that
//! need no keys (rotation plan, depth). `initialize` binds an evaluator, walks
//! the level/scale schedule and encodes every layer for it. Only a bound
//! `Model` can run inference, so calling `infer` before initialization does
//! not compile.
//!
//! Inference is a single sequential pass over the layers. Within a
//! convolution the channels are independent and may run on rayon's pool;
//! their results are accumulated in channel order.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::core::{Evaluator, HennError, Result};
use crate::encoding::{encode_layer, EncodedConv, EncodedLayer, EncodedLinear, EncodingContext};
use crate::layers::Layer;
use crate::rotations::{galois_element_for_rotation, layer_rotations, plan_rotations};

/// Relative scale difference accepted on the input ciphertext
const INPUT_SCALE_TOLERANCE: f64 = 1e-6;

/// Collects layers and configuration
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    layers: Vec<Layer>,
    config: EngineConfig,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one layer
    pub fn layer(mut self, layer: impl Into<Layer>) -> Self {
        self.layers.push(layer.into());
        self
    }

    /// Append several layers in order
    pub fn layers(mut self, layers: impl IntoIterator<Item = Layer>) -> Self {
        self.layers.extend(layers);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate every layer
    pub fn build(self) -> Result<UnboundModel> {
        if self.layers.is_empty() {
            return Err(HennError::InvalidLayer("model has no layers".to_string()));
        }
        for (index, layer) in self.layers.iter().enumerate() {
            layer
                .validate()
                .map_err(|e| e.in_layer(index, layer.kind()))?;
        }
        Ok(UnboundModel {
            layers: self.layers,
            config: self.config,
        })
    }
}

/// Validated model not yet bound to evaluation keys
#[derive(Debug, Clone)]
pub struct UnboundModel {
    layers: Vec<Layer>,
    config: EngineConfig,
}

impl UnboundModel {
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rotation keys the client must generate for `slots` slots
    pub fn rotations(&self, slots: usize) -> Result<BTreeSet<i64>> {
        plan_rotations(&self.layers, slots)
    }

    /// Levels consumed when every product lands near the nominal scale
    pub fn depth(&self) -> usize {
        self.layers.iter().map(Layer::depth).sum()
    }

    /// Bind `evaluator` and encode every layer for it
    ///
    /// # Errors
    ///
    /// Fails, wrapped with the layer index, if a layer does not fit the slot
    /// capacity, the chain runs out of levels, or (with
    /// `verify_rotation_keys`) a required rotation key is absent.
    pub fn initialize<E: Evaluator>(self, evaluator: E) -> Result<Model<E>> {
        let input = EncodingContext::fresh(&evaluator);
        let mut ctx = input;
        let mut encoded = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate() {
            let wrap = |e: HennError| e.in_layer(index, layer.kind());

            if self.config.verify_rotation_keys {
                for k in layer_rotations(layer, ctx.slots).map_err(wrap)? {
                    if !evaluator.has_rotation_key(k) {
                        return Err(wrap(HennError::MissingRotationKey {
                            rotation: k,
                            galois_element: galois_element_for_rotation(k, 2 * ctx.slots),
                        }));
                    }
                }
            }

            let (layer_encoded, next) = encode_layer(layer, &ctx, &evaluator).map_err(wrap)?;
            tracing::debug!(
                index,
                kind = layer.kind(),
                level = ctx.level,
                scale = ctx.scale,
                next_level = next.level,
                "encoded layer"
            );
            encoded.push(layer_encoded);
            ctx = next;
        }

        tracing::info!(
            layers = encoded.len(),
            input_level = input.level,
            output_level = ctx.level,
            "model initialized"
        );

        Ok(Model {
            layers: self.layers,
            config: self.config,
            encoded,
            evaluator,
            input,
            output: ctx,
        })
    }
}

/// Model bound to an evaluator, ready for inference
pub struct Model<E: Evaluator> {
    layers: Vec<Layer>,
    config: EngineConfig,
    encoded: Vec<EncodedLayer<E::Plaintext>>,
    evaluator: E,
    input: EncodingContext,
    output: EncodingContext,
}

impl<E: Evaluator> Model<E> {
    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn encoded_layers(&self) -> &[EncodedLayer<E::Plaintext>] {
        &self.encoded
    }

    /// Level and scale the input ciphertext must have
    pub fn input_context(&self) -> EncodingContext {
        self.input
    }

    /// Level and scale of the output ciphertext
    pub fn output_context(&self) -> EncodingContext {
        self.output
    }

    /// Drop the evaluator and encodings, keeping the plaintext layers
    pub fn into_unbound(self) -> UnboundModel {
        UnboundModel {
            layers: self.layers,
            config: self.config,
        }
    }

    /// Run `ct` through every layer
    ///
    /// The result is still encrypted; decryption is up to the key holder.
    pub fn infer(&self, ct: &E::Ciphertext) -> Result<E::Ciphertext> {
        self.check_input(ct)?;

        let mut current = ct.clone();
        for (index, layer) in self.encoded.iter().enumerate() {
            current = self
                .eval_layer(&current, layer)
                .map_err(|e| e.in_layer(index, layer.kind()))?;
            tracing::debug!(
                index,
                kind = layer.kind(),
                level = self.evaluator.level(&current),
                scale = self.evaluator.scale(&current),
                "layer done"
            );
        }
        Ok(current)
    }

    fn check_input(&self, ct: &E::Ciphertext) -> Result<()> {
        let level = self.evaluator.level(ct);
        let scale = self.evaluator.scale(ct);
        let expected = self.input;
        if level != expected.level
            || ((scale - expected.scale) / expected.scale).abs() > INPUT_SCALE_TOLERANCE
        {
            return Err(HennError::InputMismatch {
                expected_level: expected.level,
                expected_scale: expected.scale,
                level,
                scale,
            });
        }
        Ok(())
    }

    fn eval_layer(
        &self,
        ct: &E::Ciphertext,
        layer: &EncodedLayer<E::Plaintext>,
    ) -> Result<E::Ciphertext> {
        match layer {
            EncodedLayer::Conv(conv) => self.eval_conv(ct, conv),
            EncodedLayer::Linear(linear) => self.eval_linear(ct, linear),
            EncodedLayer::Activation(activation) => activation.apply(ct, &self.evaluator),
        }
    }

    /// One output channel: kernel product, group sum, bias, mask, placement
    fn eval_channel(
        &self,
        ct: &E::Ciphertext,
        conv: &EncodedConv<E::Plaintext>,
        c: usize,
    ) -> Result<E::Ciphertext> {
        let ev = &self.evaluator;
        let t = ev.mul_plain(ct, &conv.kernels[c])?;
        let t = ev.group_sum(&t, conv.repeat_count, conv.window_size)?;
        let t = ev.add_plain(&t, &conv.biases[c])?;
        let t = ev.mul_plain(&t, &conv.mask)?;
        if c == 0 {
            Ok(t)
        } else {
            ev.rotate(&t, -((c * conv.repeat_count) as i64))
        }
    }

    fn eval_conv(
        &self,
        ct: &E::Ciphertext,
        conv: &EncodedConv<E::Plaintext>,
    ) -> Result<E::Ciphertext> {
        let channels: Vec<E::Ciphertext> = if self.config.parallel_channels {
            (0..conv.channels)
                .into_par_iter()
                .map(|c| self.eval_channel(ct, conv, c))
                .collect::<Result<_>>()?
        } else {
            (0..conv.channels)
                .map(|c| self.eval_channel(ct, conv, c))
                .collect::<Result<_>>()?
        };

        let mut channels = channels.into_iter();
        let first = channels
            .next()
            .ok_or_else(|| HennError::InvalidLayer("convolution has no channels".to_string()))?;
        let total = channels.try_fold(first, |sum, out| self.evaluator.add(&sum, &out))?;

        self.evaluator.rescale(&total, self.evaluator.default_scale())
    }

    fn eval_linear(
        &self,
        ct: &E::Ciphertext,
        linear: &EncodedLinear<E::Plaintext>,
    ) -> Result<E::Ciphertext> {
        let product = self.evaluator.linear_transform(ct, &linear.transform)?;
        let rescaled = self
            .evaluator
            .rescale(&product, self.evaluator.default_scale())?;
        self.evaluator.add_plain(&rescaled, &linear.bias)
    }
}
