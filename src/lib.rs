//! Status workflow for corporate travel requests.
//!
//! A travel request is submitted as `requested` and is then either `approved` or
//! `cancelled` by someone holding the `travel.manage` permission. Both outcomes are
//! final. The [`WorkflowEngine`] is the only way to change a status: it checks the
//! transition table, asks an [`AuthorizationGate`] about the actor, commits through a
//! [`TravelRequestStore`] with a compare-and-set, and triggers one notification per
//! effective change.
//!
//! Storage is pluggable: [`InMemoryStore`] for tests and embedding, and a PostgreSQL
//! store behind the `postgres` feature.

pub mod domain;
pub mod error;
pub mod metrics;
pub mod notification;
pub mod request;
pub mod storage;
pub mod workflow;

// Re-export commonly used types
pub use domain::actor::{Actor, AuthorizationGate, Permission, PermissionGate, Role, RoleGate};
pub use domain::policy::RequestPolicy;
pub use error::{Result, TransitionError, TransitionErrorKind, TravelflowError};
#[cfg(feature = "prometheus")]
pub use metrics::TravelflowMetrics;
pub use notification::{
    LogNotifier, NoticeConfig, NotificationCall, NotificationTrigger, QueueNotifier,
    RecordingNotifier, StatusChangeNotice,
};
pub use request::*;
#[cfg(feature = "postgres")]
pub use storage::postgres::PostgresStore;
pub use storage::{InMemoryStore, TravelRequestStore};
pub use workflow::{WorkflowConfig, WorkflowEngine};

/// Get the travelflow database migrator
///
/// Returns a migrator that can be run against a connection pool.
#[cfg(feature = "postgres")]
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}
