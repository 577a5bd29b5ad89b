//! Domain layer - Port definitions shared by the orchestrator and adapters
//!
//! This module defines the core traits (ports) that adapters implement,
//! following hexagonal architecture principles.

pub mod ports;

pub use ports::*;
