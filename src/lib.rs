//! # henn Quickstart
//!
//! ```rust
//! use henn::prelude::*;
//!
//! // y = W·x + b with W = [[1,2],[2,3]], b = [2,0]
//! let model = ModelBuilder::new()
//!     .layer(LinearLayer::new(vec![vec![1.0, 2.0], vec![2.0, 3.0]], vec![2.0, 0.0]))
//!     .build()
//!     .unwrap();
//!
//! // Client: keys for exactly the planned rotations
//! let params = CkksParams::new_test_1024();
//! let mut client = SimContext::with_seed(params.clone(), 7).unwrap();
//! client.gen_rotation_keys(model.rotations(params.slots()).unwrap());
//!
//! // Server: bind the evaluation keys and run
//! let model = model.initialize(SimEvaluator::new(&client.public_key_set())).unwrap();
//! let ct = client.encrypt_floats(&[1.0, 1.0]).unwrap();
//! let out = client.decrypt_floats(&model.infer(&ct).unwrap()).unwrap();
//!
//! const EPS: f64 = 1e-6;
//! assert!((out[0] - 5.0).abs() < EPS);
//! assert!((out[1] - 5.0).abs() < EPS);
//! ```
//!
#![doc = include_str!("../README.md")]

// Core modules
pub mod config;
pub mod core; // Capability traits and error type
pub mod encoding; // Conv and diagonal/BSGS layer encoders
pub mod engine;
pub mod layers;
pub mod packing; // im2col slot packing
pub mod params;
pub mod prelude;
pub mod rotations; // Static rotation-key planning
pub mod utils;

// Scheme backends
pub mod backends;

// --- Public API exports ---

pub use crate::config::EngineConfig;
pub use crate::core::{Encoder, Evaluator, HennError, Result};
pub use crate::engine::{Model, ModelBuilder, UnboundModel};
pub use crate::layers::{Activation, ConvLayer, Layer, LinearLayer, Matrix};
pub use crate::packing::{pack, pack_window};
pub use crate::params::CkksParams;
pub use crate::rotations::plan_rotations;
