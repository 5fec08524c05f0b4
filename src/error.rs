//! Error types for the travel request workflow.

use serde::Serialize;
use thiserror::Error;

use crate::request::{RequestId, Status};

/// Result type alias using the travelflow error type.
pub type Result<T> = std::result::Result<T, TravelflowError>;

/// Category of a rejected transition.
///
/// Callers that only need a yes/no answer should use
/// [`WorkflowEngine::can_transition_to`](crate::workflow::WorkflowEngine::can_transition_to),
/// which deliberately hides this distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionErrorKind {
    /// No edge exists between the two statuses, whoever is asking.
    UndefinedTransition,
    /// The edge exists but the actor lacks the permission it requires.
    UnauthorizedActor,
}

impl TransitionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionErrorKind::UndefinedTransition => "undefined-transition",
            TransitionErrorKind::UnauthorizedActor => "unauthorized-actor",
        }
    }
}

impl std::fmt::Display for TransitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected status transition.
///
/// Neither variant is retriable: an undefined transition is a client error and an
/// unauthorized one is an access denial.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Transition from '{from}' to '{to}' is not defined")]
    Undefined { from: Status, to: Status },

    #[error("Actor is not allowed to move a request from '{from}' to '{to}'")]
    Unauthorized { from: Status, to: Status },
}

impl TransitionError {
    /// Status the request was in when the attempt was made.
    pub fn from_status(&self) -> Status {
        match self {
            TransitionError::Undefined { from, .. } | TransitionError::Unauthorized { from, .. } => {
                *from
            }
        }
    }

    /// Status the caller asked for.
    pub fn to_status(&self) -> Status {
        match self {
            TransitionError::Undefined { to, .. } | TransitionError::Unauthorized { to, .. } => *to,
        }
    }

    pub fn kind(&self) -> TransitionErrorKind {
        match self {
            TransitionError::Undefined { .. } => TransitionErrorKind::UndefinedTransition,
            TransitionError::Unauthorized { .. } => TransitionErrorKind::UnauthorizedActor,
        }
    }
}

/// Main error type for the travel request workflow.
#[derive(Error, Debug)]
pub enum TravelflowError {
    /// The workflow refused the transition
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A stored or supplied status label is not one of the known statuses.
    ///
    /// Seeing this for a stored row means the data was written around the workflow.
    #[error("Unknown travel request status: '{0}'")]
    UnknownStatus(String),

    /// Request not found
    #[error("Travel request not found: {0}")]
    RequestNotFound(RequestId),

    /// The conditional status update found the request in a different status
    #[error("Travel request {id} is in status '{actual}', expected '{expected}'")]
    StatusConflict {
        id: RequestId,
        expected: Status,
        actual: Status,
    },

    /// Validation error (e.g. inconsistent trip dates, unknown permission name)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The notification collaborator failed after the status was committed
    #[error("Notification failed: {0}")]
    Notification(#[source] anyhow::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TravelflowError {
    /// The transition rejection carried by this error, if any.
    pub fn transition_error(&self) -> Option<&TransitionError> {
        match self {
            TravelflowError::Transition(e) => Some(e),
            _ => None,
        }
    }

    /// True for the two rejection kinds the workflow itself produces.
    pub fn is_transition_rejection(&self) -> bool {
        self.transition_error().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_accessors() {
        let err = TransitionError::Unauthorized {
            from: Status::Requested,
            to: Status::Approved,
        };
        assert_eq!(err.from_status(), Status::Requested);
        assert_eq!(err.to_status(), Status::Approved);
        assert_eq!(err.kind(), TransitionErrorKind::UnauthorizedActor);
        assert_eq!(
            err.to_string(),
            "Actor is not allowed to move a request from 'requested' to 'approved'"
        );
    }

    #[test]
    fn test_transition_error_is_transparent_in_main_error() {
        let err: TravelflowError = TransitionError::Undefined {
            from: Status::Approved,
            to: Status::Cancelled,
        }
        .into();

        assert!(err.is_transition_rejection());
        assert_eq!(
            err.to_string(),
            "Transition from 'approved' to 'cancelled' is not defined"
        );
        assert_eq!(
            err.transition_error().map(TransitionError::kind),
            Some(TransitionErrorKind::UndefinedTransition)
        );
    }

    #[test]
    fn test_other_errors_are_not_rejections() {
        let err = TravelflowError::UnknownStatus("archived".to_string());
        assert!(!err.is_transition_rejection());
        assert_eq!(err.to_string(), "Unknown travel request status: 'archived'");
    }

    #[test]
    fn test_kind_serializes_as_kebab_case() {
        let json = serde_json::to_string(&TransitionErrorKind::UndefinedTransition).unwrap();
        assert_eq!(json, r#""undefined-transition""#);
    }
}
