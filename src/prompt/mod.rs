//! Prompt module - templates and the label transition registry.

mod registry;
mod template;

pub use registry::*;
pub use template::*;
