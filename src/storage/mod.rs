//! Persistence collaborator for travel requests.
//!
//! The workflow keeps no state between calls; the authoritative status lives behind
//! [`TravelRequestStore`]. Implementations are responsible for serializing concurrent
//! updates to the same request: [`TravelRequestStore::update_status`] is a
//! compare-and-set, so of two concurrent transitions out of the same status at most
//! one can win.

use async_trait::async_trait;

use crate::error::Result;
use crate::request::{RequestId, Status, TravelRequest, UserId};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryStore;

/// Storage trait for persisting and reloading travel requests.
#[async_trait]
pub trait TravelRequestStore: Send + Sync {
    /// Insert a freshly submitted request.
    async fn create(&self, request: &TravelRequest) -> Result<()>;

    /// Fetch the committed state of a request.
    ///
    /// # Errors
    /// - [`RequestNotFound`](crate::TravelflowError::RequestNotFound) if no such request exists
    /// - [`UnknownStatus`](crate::TravelflowError::UnknownStatus) if the stored status label is
    ///   not one the workflow knows
    async fn get(&self, id: RequestId) -> Result<TravelRequest>;

    /// Atomically move a request from `expected` to `new`.
    ///
    /// # Errors
    /// - [`StatusConflict`](crate::TravelflowError::StatusConflict) if the request is no longer
    ///   in `expected`; nothing is written in that case
    /// - [`RequestNotFound`](crate::TravelflowError::RequestNotFound) if no such request exists
    async fn update_status(&self, id: RequestId, expected: Status, new: Status) -> Result<()>;

    /// All requests owned by `owner`, most recent first.
    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<TravelRequest>>;
}
