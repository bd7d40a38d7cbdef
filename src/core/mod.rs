//! Core abstractions
//!
//! Backend-agnostic traits and the crate-wide error type.

pub mod traits;
pub mod types;

pub use traits::{Encoder, Evaluator};
pub use types::{HennError, Result};
