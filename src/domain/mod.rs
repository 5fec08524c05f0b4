//! Core domain types for the travel request workflow.
//!
//! This module contains pure domain types with no persistence dependencies:
//! - Travel requests and their status state machine
//! - Actors, permissions and the authorization gate
//! - Ownership policy for the operations around the workflow

pub mod actor;
pub mod policy;
pub mod request;
