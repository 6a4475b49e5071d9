//! Core data models for contrastset.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters
//! - I^B (Bounded): Error variants with per-example containment

mod config;
mod error;
mod label;
mod record;

pub use config::*;
pub use error::*;
pub use label::*;
pub use record::*;
