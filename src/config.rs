//! Configuration for the inference engine.

use serde::{Deserialize, Serialize};

/// Runtime options of a [`crate::engine::Model`].
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Evaluate the channels of a convolution on rayon's thread pool.
    pub parallel_channels: bool,

    /// Check at initialization that the evaluator holds a key for every
    /// planned rotation.
    pub verify_rotation_keys: bool,
}

impl EngineConfig {
    /// Single-threaded evaluation, otherwise default.
    pub fn sequential() -> Self {
        Self {
            parallel_channels: false,
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_channels: true,
            verify_rotation_keys: true,
        }
    }
}
