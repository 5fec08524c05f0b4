//! Ownership rules for the operations surrounding the status workflow.
//!
//! The workflow engine decides status changes. Listing, viewing, editing and
//! deleting requests are decided here, from the same [`AuthorizationGate`] and the
//! request's owner and status.

use crate::domain::actor::{Actor, AuthorizationGate, Permission};
use crate::domain::request::{Status, TravelRequest};

/// Access rules for travel requests.
#[derive(Debug, Clone, Default)]
pub struct RequestPolicy<G> {
    gate: G,
}

impl<G: AuthorizationGate> RequestPolicy<G> {
    pub fn new(gate: G) -> Self {
        Self { gate }
    }

    fn manages(&self, actor: &Actor) -> bool {
        self.gate.has_permission(actor, Permission::TravelManage)
    }

    fn owns(actor: &Actor, request: &TravelRequest) -> bool {
        request.owner() == actor.id
    }

    /// Whether `actor` may list requests at all.
    ///
    /// Always true for an identified actor: those without `travel.manage` only get
    /// their own requests, see [`RequestPolicy::sees_all`].
    pub fn view_any(&self, _actor: &Actor) -> bool {
        true
    }

    /// Whether listings for `actor` cover every owner rather than just themselves.
    pub fn sees_all(&self, actor: &Actor) -> bool {
        self.manages(actor)
    }

    pub fn view(&self, actor: &Actor, request: &TravelRequest) -> bool {
        self.manages(actor) || Self::owns(actor, request)
    }

    pub fn create(&self, actor: &Actor) -> bool {
        self.gate.has_permission(actor, Permission::TravelCreate) || self.manages(actor)
    }

    /// Owners may edit trip details only while the request awaits a decision.
    pub fn update(&self, actor: &Actor, request: &TravelRequest) -> bool {
        self.manages(actor) || (Self::owns(actor, request) && request.status() == Status::Requested)
    }

    /// Owners may delete anything that was not approved.
    pub fn delete(&self, actor: &Actor, request: &TravelRequest) -> bool {
        self.manages(actor) || (Self::owns(actor, request) && request.status() != Status::Approved)
    }
}
