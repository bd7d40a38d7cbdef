//! Slot-level CKKS simulator
//!
//! Models the observable behavior of RNS-CKKS on slot vectors: levels and a
//! moduli chain, scale growth and rescaling, ciphertext degree and
//! relinearization, rotation keys indexed by Galois element, and Gaussian
//! encryption noise. Slot values are stored in the clear, so this backend
//! provides **no confidentiality**. It exists to test encoders, rotation plans
//! and depth budgets end to end.
//!
//! ```
//! use henn::backends::slot_sim::{SimContext, SimEvaluator};
//! use henn::core::Evaluator;
//! use henn::params::CkksParams;
//!
//! let mut client = SimContext::with_seed(CkksParams::new_test_1024(), 42).unwrap();
//! client.gen_rotation_keys([1]);
//! let server = SimEvaluator::new(&client.public_key_set());
//!
//! let ct = client.encrypt_ints(&[1, 2, 3]).unwrap();
//! let rotated = server.rotate(&ct, 1).unwrap();
//! assert_eq!(&client.decrypt_ints(&rotated).unwrap()[..2], &[2, 3]);
//! ```

pub mod ckks;
pub mod context;
pub mod evaluator;
pub mod keys;

pub use ckks::{Ciphertext, Plaintext};
pub use context::SimContext;
pub use evaluator::SimEvaluator;
pub use keys::{galois_element_for_rotation, PublicKeySet, RotationKeys};
