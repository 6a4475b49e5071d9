//! Corpus module - loading and example selection.

mod loader;
mod selector;

pub use loader::*;
pub use selector::*;
