//! Pipeline module - generation, artifact persistence and normalization.

mod artifact;
mod assembler;
mod engine;
mod normalizer;

pub use artifact::*;
pub use assembler::*;
pub use engine::*;
pub use normalizer::*;
