//! GPU Module
//!
//! Host GPU detection, shared patch state, and the adapters that make kind
//! nodes GPU-capable: node runtime patches and cluster RuntimeClass
//! registration.

pub mod context;
pub mod inventory;
pub mod node;
pub mod runtime_class;
pub mod sinks;

pub use context::*;
pub use inventory::*;
pub use node::*;
pub use runtime_class::*;
pub use sinks::*;
