//! Status transitions for travel requests.
//!
//! The state graph is data, not code. Every status owns one [`StateHandler`] row
//! listing the edges leaving it and the permission each edge requires:
//!
//! ```text
//!                 ┌──(travel.manage)──> approved
//!   requested ────┤
//!                 └──(travel.manage)──> cancelled
//! ```
//!
//! `approved` and `cancelled` are terminal: their rows have no edges, so every
//! target is structurally invalid from them no matter who asks.
//!
//! A single evaluator ([`StateHandler::authorize`]) checks a row in two steps:
//!
//! 1. **Structure**: is there an edge to the target at all? If not the attempt is an
//!    [`TransitionError::Undefined`], whatever the actor's permissions.
//! 2. **Authorization**: if the edge names a required permission, the
//!    [`AuthorizationGate`] must grant it, otherwise the attempt is
//!    [`TransitionError::Unauthorized`].
//!
//! Self transitions are not edges. The workflow engine short-circuits them before a
//! handler is ever consulted.
//!
//! Adding a status means adding a [`Status`] variant, a row, and one arm in each of
//! the [`StateResolver`] matches. Finer-grained rules (say, a separate permission for
//! cancelling) only need a different `required_permission` on the edge.

use crate::domain::actor::{Actor, AuthorizationGate, Permission};
use crate::error::{Result, TransitionError, TravelflowError};

use super::state::Status;

/// An outgoing edge of the state graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub to: Status,
    /// Permission the actor must hold to take this edge. `None` lets anyone take it.
    pub required_permission: Option<Permission>,
}

/// Transition rules for one status.
#[derive(Debug, PartialEq, Eq)]
pub struct StateHandler {
    status: Status,
    edges: &'static [Edge],
}

static REQUESTED: StateHandler = StateHandler {
    status: Status::Requested,
    edges: &[
        Edge {
            to: Status::Approved,
            required_permission: Some(Permission::TravelManage),
        },
        Edge {
            to: Status::Cancelled,
            required_permission: Some(Permission::TravelManage),
        },
    ],
};

static APPROVED: StateHandler = StateHandler {
    status: Status::Approved,
    edges: &[],
};

static CANCELLED: StateHandler = StateHandler {
    status: Status::Cancelled,
    edges: &[],
};

impl StateHandler {
    /// The status this handler represents.
    pub fn name(&self) -> Status {
        self.status
    }

    pub fn edges(&self) -> &'static [Edge] {
        self.edges
    }

    pub fn targets(&self) -> impl Iterator<Item = Status> + 'static {
        self.edges.iter().map(|edge| edge.to)
    }

    pub fn is_terminal(&self) -> bool {
        self.edges.is_empty()
    }

    fn edge(&self, target: Status) -> Option<&'static Edge> {
        self.edges.iter().find(|edge| edge.to == target)
    }

    /// Whether an edge to `target` exists, independent of who is asking.
    pub fn structurally_reachable(&self, target: Status) -> bool {
        self.edge(target).is_some()
    }

    /// Structural check only, as an error.
    pub fn ensure_reachable(&self, target: Status) -> std::result::Result<(), TransitionError> {
        self.edge(target)
            .map(|_| ())
            .ok_or(TransitionError::Undefined {
                from: self.status,
                to: target,
            })
    }

    /// Decide whether `actor` may move a request in this status to `target`.
    ///
    /// Undefined transitions are reported as such even for fully privileged actors;
    /// they are never "unauthorized".
    pub fn authorize<G: AuthorizationGate + ?Sized>(
        &self,
        gate: &G,
        actor: &Actor,
        target: Status,
    ) -> std::result::Result<(), TransitionError> {
        let edge = self.edge(target).ok_or(TransitionError::Undefined {
            from: self.status,
            to: target,
        })?;

        match edge.required_permission {
            Some(permission) if !gate.has_permission(actor, permission) => {
                Err(TransitionError::Unauthorized {
                    from: self.status,
                    to: target,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Picks the [`StateHandler`] for a status.
pub struct StateResolver;

impl StateResolver {
    /// Handler for a typed status. Total.
    pub fn handler(status: Status) -> &'static StateHandler {
        match status {
            Status::Requested => &REQUESTED,
            Status::Approved => &APPROVED,
            Status::Cancelled => &CANCELLED,
        }
    }

    /// Handler for a raw status label, as stored or as received from a caller.
    ///
    /// Any label other than the three known ones is [`TravelflowError::UnknownStatus`];
    /// there is no fallback handler.
    pub fn resolve(label: &str) -> Result<&'static StateHandler> {
        match label {
            "requested" => Ok(&REQUESTED),
            "approved" => Ok(&APPROVED),
            "cancelled" => Ok(&CANCELLED),
            other => Err(TravelflowError::UnknownStatus(other.to_string())),
        }
    }
}
