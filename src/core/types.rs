//! Common types shared by the encoder, planner, engine and backends

/// Error type for every fallible operation in the crate
///
/// Variants fall into three groups:
/// - **configuration**: malformed layer shapes or parameters, detected before
///   any ciphertext is touched
/// - **state**: a ciphertext or model is not in the state an operation needs
/// - **capability**: the evaluator lacks key material for a requested operation
///
/// None of them is transient; callers should surface them rather than retry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HennError {
    /// Malformed layer description (ragged matrices, count mismatches, ...)
    #[error("invalid layer: {0}")]
    InvalidLayer(String),

    /// Sliding window does not tile the input exactly
    #[error(
        "size mismatch: {kernel_x}x{kernel_y} window with stride {stride} does not tile a {rows}x{cols} input"
    )]
    TilingMismatch {
        rows: usize,
        cols: usize,
        kernel_x: usize,
        kernel_y: usize,
        stride: usize,
    },

    /// Packed data needs more slots than one ciphertext holds
    #[error("{needed} values exceed slot capacity {slots}")]
    SlotOverflow { needed: usize, slots: usize },

    /// Invalid parameter configuration
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Ciphertext handed to `infer` is not at the level/scale the model was encoded for
    #[error(
        "input mismatch: expected level {expected_level} at scale {expected_scale}, got level {level} at scale {scale}"
    )]
    InputMismatch {
        expected_level: usize,
        expected_scale: f64,
        level: usize,
        scale: f64,
    },

    /// No level left to rescale into
    #[error("levels exhausted: cannot rescale scale {scale} at level {level}")]
    LevelExhausted { level: usize, scale: f64 },

    /// Operand levels are incompatible
    #[error("level mismatch: expected at least {expected}, got {actual}")]
    LevelMismatch { expected: usize, actual: usize },

    /// Operand scales differ too much to be added
    #[error("scale mismatch: {left} vs {right}")]
    ScaleMismatch { left: f64, right: f64 },

    /// Operation needs a degree-1 ciphertext
    #[error("ciphertext has degree {0}; relinearize first")]
    UnrelinearizedCiphertext(usize),

    /// Ciphertext or key material belongs to another secret key
    #[error("key mismatch: operand bound to key {found:#x}, expected {expected:#x}")]
    KeyMismatch { expected: u64, found: u64 },

    /// Rotation requested without a matching rotation key
    #[error("rotation key for k={rotation} (g={galois_element}) not found")]
    MissingRotationKey { rotation: i64, galois_element: usize },

    /// Ciphertext multiplication requested without a relinearization key
    #[error("relinearization key not available")]
    MissingRelinearizationKey,

    /// Failure inside a specific layer of the pipeline
    #[error("layer {index} ({kind}): {source}")]
    Layer {
        index: usize,
        kind: &'static str,
        #[source]
        source: Box<HennError>,
    },
}

impl HennError {
    /// Attach the position and kind of the layer in which `self` happened
    pub fn in_layer(self, index: usize, kind: &'static str) -> Self {
        HennError::Layer {
            index,
            kind,
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping `Layer` wrappers
    pub fn root(&self) -> &HennError {
        match self {
            HennError::Layer { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, HennError>;
