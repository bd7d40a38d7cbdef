// src/prelude.rs
//! The “everything” import for henn.
//!
//! Brings you the most commonly used types and functions with one glob:
//! ```rust
//! use henn::prelude::*;
//! ```

// model definition and execution
pub use crate::config::EngineConfig;
pub use crate::engine::{Model, ModelBuilder, UnboundModel};
pub use crate::layers::{Activation, ConvLayer, Layer, LinearLayer};

// scheme abstraction
pub use crate::core::{Encoder, Evaluator, HennError};
pub use crate::params::CkksParams;

// bundled backend
pub use crate::backends::slot_sim::{SimContext, SimEvaluator};

// planning and packing
pub use crate::packing::pack;
pub use crate::rotations::plan_rotations;
