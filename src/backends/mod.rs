//! Scheme backends implementing [`crate::core::Evaluator`]

pub mod slot_sim;
