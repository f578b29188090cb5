//! Supporting infrastructure.
//!
//! Error types shared across the pipeline and the presentation-only
//! format name tables used in diagnostics.

pub mod errors;
pub mod names;
