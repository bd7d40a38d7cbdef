//! Plaintext layer descriptions
//!
//! A model is a strictly sequential list of [`Layer`]s built from trained
//! parameters. Layers are held in the clear by the model owner and never
//! leave it; only their encoded form meets ciphertexts.

use serde::{Deserialize, Serialize};

use crate::core::{Evaluator, HennError, Result};
use crate::packing::window_count;

/// Row-major dense matrix
pub type Matrix = Vec<Vec<f64>>;

/// Validated geometry of a convolution layer
///
/// Only [`ConvShape::new`] builds one, so the window always tiles the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvShape {
    input_x: usize,
    input_y: usize,
    kernel_x: usize,
    kernel_y: usize,
    stride: usize,
    channels: usize,
}

impl ConvShape {
    /// Check that the window tiles the input exactly
    pub fn new(
        input_x: usize,
        input_y: usize,
        kernel_x: usize,
        kernel_y: usize,
        stride: usize,
        channels: usize,
    ) -> Result<Self> {
        if channels == 0 {
            return Err(HennError::InvalidLayer("convolution has no kernels".to_string()));
        }
        if window_count(input_x, kernel_x, stride).is_none()
            || window_count(input_y, kernel_y, stride).is_none()
        {
            return Err(HennError::TilingMismatch {
                rows: input_x,
                cols: input_y,
                kernel_x,
                kernel_y,
                stride,
            });
        }
        Ok(Self {
            input_x,
            input_y,
            kernel_x,
            kernel_y,
            stride,
            channels,
        })
    }

    pub fn input_x(&self) -> usize {
        self.input_x
    }

    pub fn input_y(&self) -> usize {
        self.input_y
    }

    pub fn kernel_x(&self) -> usize {
        self.kernel_x
    }

    pub fn kernel_y(&self) -> usize {
        self.kernel_y
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Output channels (one per kernel)
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of window placements (output pixels per channel)
    pub fn repeat(&self) -> usize {
        let wx = (self.input_x - self.kernel_x + self.stride) / self.stride;
        let wy = (self.input_y - self.kernel_y + self.stride) / self.stride;
        wx * wy
    }

    /// Number of weights in one kernel
    pub fn window_size(&self) -> usize {
        self.kernel_x * self.kernel_y
    }

    /// Length of the im2col-packed input
    pub fn packed_len(&self) -> usize {
        self.window_size() * self.repeat()
    }

    /// Length of the output: one `repeat`-wide region per channel
    pub fn output_len(&self) -> usize {
        self.channels * self.repeat()
    }
}

/// Convolution over an im2col-packed input, one kernel per output channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvLayer {
    /// Input rows
    pub input_x: usize,
    /// Input columns
    pub input_y: usize,
    /// One kx × ky matrix per output channel
    pub kernels: Vec<Matrix>,
    /// One bias per output channel
    pub biases: Vec<f64>,
    pub stride: usize,
}

impl ConvLayer {
    pub fn new(
        input_x: usize,
        input_y: usize,
        kernels: Vec<Matrix>,
        biases: Vec<f64>,
        stride: usize,
    ) -> Self {
        Self {
            input_x,
            input_y,
            kernels,
            biases,
            stride,
        }
    }

    /// Validate kernels and biases, returning the layer geometry
    pub fn shape(&self) -> Result<ConvShape> {
        let first = self
            .kernels
            .first()
            .ok_or_else(|| HennError::InvalidLayer("convolution has no kernels".to_string()))?;
        let kernel_x = first.len();
        let kernel_y = first.first().map_or(0, Vec::len);
        if kernel_x == 0 || kernel_y == 0 {
            return Err(HennError::InvalidLayer("empty kernel".to_string()));
        }

        for (c, kernel) in self.kernels.iter().enumerate() {
            if kernel.len() != kernel_x || kernel.iter().any(|row| row.len() != kernel_y) {
                return Err(HennError::InvalidLayer(format!(
                    "kernel {} is not {}x{}",
                    c, kernel_x, kernel_y
                )));
            }
        }
        if self.biases.len() != self.kernels.len() {
            return Err(HennError::InvalidLayer(format!(
                "{} kernels but {} biases",
                self.kernels.len(),
                self.biases.len()
            )));
        }

        ConvShape::new(
            self.input_x,
            self.input_y,
            kernel_x,
            kernel_y,
            self.stride,
            self.kernels.len(),
        )
    }
}

/// Validated geometry of a dense layer (`rows` outputs, `cols` inputs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearShape {
    pub rows: usize,
    pub cols: usize,
}

/// Dense layer `y = W·x + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearLayer {
    /// N × M weights
    pub weights: Matrix,
    /// Length-N bias
    pub bias: Vec<f64>,
}

impl LinearLayer {
    pub fn new(weights: Matrix, bias: Vec<f64>) -> Self {
        Self { weights, bias }
    }

    pub fn shape(&self) -> Result<LinearShape> {
        let rows = self.weights.len();
        let cols = self.weights.first().map_or(0, Vec::len);
        if rows == 0 || cols == 0 {
            return Err(HennError::InvalidLayer("empty weight matrix".to_string()));
        }
        if let Some(r) = self.weights.iter().position(|row| row.len() != cols) {
            return Err(HennError::InvalidLayer(format!(
                "ragged weights: row {} has {} columns, expected {}",
                r,
                self.weights[r].len(),
                cols
            )));
        }
        if self.bias.len() != rows {
            return Err(HennError::InvalidLayer(format!(
                "{} weight rows but {} biases",
                rows,
                self.bias.len()
            )));
        }
        Ok(LinearShape { rows, cols })
    }
}

/// Homomorphic-safe activation, applied with the evaluator passed at call time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// x², one level
    Square,
    /// a2·x² + a1·x + a0 with `coeffs = [a0, a1, a2]`, two levels
    Polynomial { coeffs: [f64; 3] },
}

impl Activation {
    /// Levels consumed
    pub fn depth(&self) -> usize {
        match self {
            Activation::Square => 1,
            Activation::Polynomial { .. } => 2,
        }
    }

    /// Level and scale of the output for an input at (`level`, `scale`)
    pub fn output_schedule<E: Evaluator>(
        &self,
        evaluator: &E,
        level: usize,
        scale: f64,
    ) -> Result<(usize, f64)> {
        let delta = evaluator.default_scale();
        let product_scale = match self {
            Activation::Square => scale * scale,
            Activation::Polynomial { .. } => scale * delta * scale,
        };
        evaluator.rescale_target(level, product_scale, delta)
    }

    /// Evaluate on `ct`
    pub fn apply<E: Evaluator>(&self, ct: &E::Ciphertext, evaluator: &E) -> Result<E::Ciphertext> {
        let delta = evaluator.default_scale();
        match self {
            Activation::Square => {
                let squared = evaluator.mul_relin(ct, ct)?;
                evaluator.rescale(&squared, delta)
            }
            Activation::Polynomial { coeffs: [a0, a1, a2] } => {
                // ((a2·x + a1)·x + a0): both products stay at the input level,
                // so one rescale at the end drops two primes.
                let level = evaluator.level(ct);
                let scale = evaluator.scale(ct);
                let slots = evaluator.slots();

                let a2_pt = evaluator.encode(&vec![*a2; slots], level, delta)?;
                let a1_pt = evaluator.encode(&vec![*a1; slots], level, scale * delta)?;
                let linear = evaluator.mul_plain(ct, &a2_pt)?;
                let linear = evaluator.add_plain(&linear, &a1_pt)?;

                let quadratic = evaluator.mul_relin(&linear, ct)?;
                let a0_pt =
                    evaluator.encode(&vec![*a0; slots], level, evaluator.scale(&quadratic))?;
                let shifted = evaluator.add_plain(&quadratic, &a0_pt)?;
                evaluator.rescale(&shifted, delta)
            }
        }
    }

    /// Same polynomial on a plaintext value
    pub fn eval_plain(&self, x: f64) -> f64 {
        match self {
            Activation::Square => x * x,
            Activation::Polynomial { coeffs: [a0, a1, a2] } => (a2 * x + a1) * x + a0,
        }
    }
}

/// One stage of the inference pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Layer {
    Conv(ConvLayer),
    Linear(LinearLayer),
    Activation(Activation),
}

impl Layer {
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Conv(_) => "conv",
            Layer::Linear(_) => "linear",
            Layer::Activation(_) => "activation",
        }
    }

    /// Validate the layer's shape invariants
    pub fn validate(&self) -> Result<()> {
        match self {
            Layer::Conv(conv) => conv.shape().map(|_| ()),
            Layer::Linear(linear) => linear.shape().map(|_| ()),
            Layer::Activation(_) => Ok(()),
        }
    }

    /// Levels consumed by this layer
    pub fn depth(&self) -> usize {
        match self {
            // kernel · mask on top of the input scale: Δ³ → Δ
            Layer::Conv(_) => 2,
            Layer::Linear(_) => 1,
            Layer::Activation(activation) => activation.depth(),
        }
    }
}

impl From<ConvLayer> for Layer {
    fn from(layer: ConvLayer) -> Self {
        Layer::Conv(layer)
    }
}

impl From<LinearLayer> for Layer {
    fn from(layer: LinearLayer) -> Self {
        Layer::Linear(layer)
    }
}

impl From<Activation> for Layer {
    fn from(activation: Activation) -> Self {
        Layer::Activation(activation)
    }
}
