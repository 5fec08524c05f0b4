//! Travel request aggregate - domain model and state transitions.
//!
//! This module contains the core domain logic for travel requests:
//! - Request entity, identifiers and status labels
//! - The transition table and its resolver

pub mod state;
pub mod transitions;

// Re-export commonly used types
pub use state::*;
pub use transitions::{Edge, StateHandler, StateResolver};
