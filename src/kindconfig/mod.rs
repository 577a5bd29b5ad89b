//! kind Cluster Configuration
//!
//! Typed cluster specification plus the translator that builds it from the
//! declarative `kind_config` block.

pub mod translate;
pub mod types;

pub use translate::*;
pub use types::*;
