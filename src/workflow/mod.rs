//! Workflow engine: the one entry point allowed to change a request's status.
//!
//! Three operations, from weakest to strongest:
//!
//! - [`WorkflowEngine::ensure_transition_possible`]: does an edge exist at all?
//! - [`WorkflowEngine::can_transition_to`]: may this actor take it right now?
//! - [`WorkflowEngine::transition_to`]: take it, commit, re-read and notify.
//!
//! The engine holds no state between calls. Ordering inside `transition_to` is fixed:
//! a read of the stored status, authorization against it, the conditional status
//! update, a re-read, then exactly one notification. A rejected attempt never writes
//! and never notifies.
//!
//! The two checks that do not touch storage judge the copy they are given, which
//! makes them suitable for hints on data the caller just loaded.

use std::sync::Arc;

use metrics::counter;

use crate::domain::actor::{Actor, AuthorizationGate, PermissionGate};
use crate::error::{Result, TransitionError, TravelflowError};
use crate::notification::NotificationTrigger;
use crate::request::{StateResolver, Status, TravelRequest};
use crate::storage::TravelRequestStore;

#[cfg(feature = "prometheus")]
use crate::metrics::TravelflowMetrics;

/// Configuration for the workflow engine.
///
/// Notifier settings live in [`NoticeConfig`](crate::notification::NoticeConfig), since
/// the engine only ever sees the notifier through its trait.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// When the conditional status update reports that someone else changed the
    /// request first, re-read it and judge the attempt against the fresh status.
    /// When false the [`TravelflowError::StatusConflict`] is returned as is.
    pub reevaluate_on_conflict: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            reevaluate_on_conflict: true,
        }
    }
}

/// Facade over the transition table, storage and notification collaborators.
///
/// # Example
/// ```ignore
/// let engine = WorkflowEngine::new(Arc::new(store), Arc::new(LogNotifier::default()));
///
/// if engine.can_transition_to(&request, Status::Approved, &actor) {
///     let approved = engine.transition_to(&request, Status::Approved, &actor).await?;
/// }
/// ```
pub struct WorkflowEngine<S, N, G = PermissionGate> {
    store: Arc<S>,
    notifier: Arc<N>,
    gate: Arc<G>,
    config: WorkflowConfig,
    #[cfg(feature = "prometheus")]
    metrics: Option<TravelflowMetrics>,
}

impl<S, N> WorkflowEngine<S, N, PermissionGate>
where
    S: TravelRequestStore,
    N: NotificationTrigger,
{
    /// Create an engine that trusts the permissions carried on each [`Actor`].
    ///
    /// Use [`WorkflowEngine::with_gate`] to consult another authorization source.
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self {
            store,
            notifier,
            gate: Arc::new(PermissionGate),
            config: WorkflowConfig::default(),
            #[cfg(feature = "prometheus")]
            metrics: None,
        }
    }
}

impl<S, N, G> WorkflowEngine<S, N, G>
where
    S: TravelRequestStore,
    N: NotificationTrigger,
    G: AuthorizationGate,
{
    /// Replace the authorization gate.
    pub fn with_gate<G2: AuthorizationGate>(self, gate: Arc<G2>) -> WorkflowEngine<S, N, G2> {
        WorkflowEngine {
            store: self.store,
            notifier: self.notifier,
            gate,
            config: self.config,
            #[cfg(feature = "prometheus")]
            metrics: self.metrics,
        }
    }

    /// Set a custom configuration.
    pub fn with_config(mut self, config: WorkflowConfig) -> Self {
        self.config = config;
        self
    }

    /// Also record counters in a Prometheus registry.
    #[cfg(feature = "prometheus")]
    pub fn with_metrics(mut self, metrics: TravelflowMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Structural check only: fails if no edge leads from the request's status to
    /// `target`, whoever might ask. Used for "is this ever possible" hints.
    pub fn ensure_transition_possible(&self, request: &TravelRequest, target: Status) -> Result<()> {
        StateResolver::handler(request.status())
            .ensure_reachable(target)
            .map_err(Into::into)
    }

    /// Whether `actor` could move `request` to `target` right now.
    ///
    /// Never fails. Both rejection kinds collapse into `false`, so the answer does not
    /// reveal whether the edge is missing or the actor lacks permission.
    pub fn can_transition_to(&self, request: &TravelRequest, target: Status, actor: &Actor) -> bool {
        StateResolver::handler(request.status())
            .authorize(self.gate.as_ref(), actor, target)
            .is_ok()
    }

    /// Targets `actor` could move `request` to right now, in table order.
    pub fn available_transitions(&self, request: &TravelRequest, actor: &Actor) -> Vec<Status> {
        StateResolver::handler(request.status())
            .targets()
            .filter(|target| self.can_transition_to(request, *target, actor))
            .collect()
    }

    /// Move `request` to `target` on behalf of `actor`.
    ///
    /// The caller's copy only identifies the request: its status is read from storage
    /// first, and every check below runs against that stored status.
    ///
    /// Asking for the status the request already has is a no-op: the stored request is
    /// returned, without authorization and without a notification.
    ///
    /// Otherwise the attempt is authorized against the stored status, committed with a
    /// conditional update, re-read from storage, and announced to the notifier exactly
    /// once. The re-read entity is returned.
    ///
    /// # Errors
    /// - [`TravelflowError::RequestNotFound`] when the request was never stored
    /// - [`TravelflowError::Transition`] when the edge is undefined or the actor lacks
    ///   permission; nothing is written or notified
    /// - [`TravelflowError::StatusConflict`] when another writer changed the request
    ///   between the read and the write and conflict re-evaluation is disabled
    /// - Storage errors, unchanged
    /// - Notification errors, unchanged. The status change is committed in that case
    #[tracing::instrument(
        skip(self, request, actor),
        fields(request_id = %request.id(), from = tracing::field::Empty, to = %target, actor = %actor.id)
    )]
    pub async fn transition_to(
        &self,
        request: &TravelRequest,
        target: Status,
        actor: &Actor,
    ) -> Result<TravelRequest> {
        let stored = self.store.get(request.id()).await?;
        let previous = stored.status();
        tracing::Span::current().record("from", previous.as_str());
        if previous != request.status() {
            tracing::debug!(
                held = %request.status(),
                "Caller holds a stale copy, using the stored status"
            );
        }

        if previous == target {
            tracing::debug!("Request already has the target status, nothing to do");
            return Ok(stored);
        }

        self.authorize(previous, target, actor)?;

        match self.store.update_status(request.id(), previous, target).await {
            Ok(()) => {}
            Err(TravelflowError::StatusConflict { actual, .. }) if self.config.reevaluate_on_conflict => {
                tracing::warn!(
                    actual = %actual,
                    "Request changed status concurrently, re-evaluating against stored state"
                );
                let fresh = self.store.get(request.id()).await?;
                if fresh.status() == target {
                    // Someone else already made the same change and notified for it
                    return Ok(fresh);
                }
                self.authorize(fresh.status(), target, actor)?;
                return Err(TravelflowError::StatusConflict {
                    id: request.id(),
                    expected: previous,
                    actual: fresh.status(),
                });
            }
            Err(e) => return Err(e),
        }

        let updated = self.store.get(request.id()).await?;

        counter!(
            "travelflow_transitions_total",
            "from" => previous.as_str(),
            "to" => target.as_str()
        )
        .increment(1);
        #[cfg(feature = "prometheus")]
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(previous, target);
        }
        tracing::info!(
            owner = %updated.owner(),
            committed = %updated.status(),
            "Travel request status changed"
        );

        if let Err(e) = self.notifier.notify(&updated, previous).await {
            counter!(
                "travelflow_notification_failures_total",
                "from" => previous.as_str(),
                "to" => target.as_str()
            )
            .increment(1);
            #[cfg(feature = "prometheus")]
            if let Some(metrics) = &self.metrics {
                metrics.record_notification_failure(previous, target);
            }
            tracing::error!(error = %e, "Status committed but notification failed");
            return Err(e);
        }

        Ok(updated)
    }

    /// [`WorkflowEngine::transition_to`] for a raw target label as received from a
    /// caller. Labels other than the known statuses fail with
    /// [`TravelflowError::UnknownStatus`] before anything else is checked.
    pub async fn transition_to_label(
        &self,
        request: &TravelRequest,
        target: &str,
        actor: &Actor,
    ) -> Result<TravelRequest> {
        let target = StateResolver::resolve(target)
            .inspect_err(|_| {
                tracing::error!(request_id = %request.id(), label = target, "Unknown target status")
            })?
            .name();
        self.transition_to(request, target, actor).await
    }

    fn authorize(&self, from: Status, target: Status, actor: &Actor) -> Result<()> {
        StateResolver::handler(from)
            .authorize(self.gate.as_ref(), actor, target)
            .map_err(|e| {
                self.record_rejection(&e);
                e.into()
            })
    }

    fn record_rejection(&self, error: &TransitionError) {
        counter!(
            "travelflow_transition_rejections_total",
            "from" => error.from_status().as_str(),
            "to" => error.to_status().as_str(),
            "reason" => error.kind().as_str()
        )
        .increment(1);
        #[cfg(feature = "prometheus")]
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(error);
        }
        // Rejections are expected client outcomes, not faults
        tracing::debug!(reason = %error.kind(), "Transition rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::Role;
    use crate::notification::RecordingNotifier;
    use crate::request::{NewTravelRequest, RequestId, TravelRequestData, UserId};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that serves one snapshot and counts writes, to check what the engine
    /// does without a real backend. `sneak_in` is committed right before the next
    /// conditional update, as if another writer won the race.
    struct SnapshotStore {
        snapshot: parking_lot::Mutex<TravelRequest>,
        writes: AtomicUsize,
        fail_writes: bool,
        sneak_in: parking_lot::Mutex<Option<Status>>,
    }

    impl SnapshotStore {
        fn new(request: TravelRequest) -> Self {
            Self {
                snapshot: parking_lot::Mutex::new(request),
                writes: AtomicUsize::new(0),
                fail_writes: false,
                sneak_in: parking_lot::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TravelRequestStore for SnapshotStore {
        async fn create(&self, _request: &TravelRequest) -> Result<()> {
            Ok(())
        }

        async fn get(&self, _id: RequestId) -> Result<TravelRequest> {
            Ok(self.snapshot.lock().clone())
        }

        async fn update_status(&self, id: RequestId, expected: Status, new: Status) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                return Err(TravelflowError::Other(anyhow::anyhow!("disk full")));
            }
            let mut snapshot = self.snapshot.lock();
            if let Some(winner) = self.sneak_in.lock().take() {
                snapshot.commit_status(winner, Utc::now());
            }
            if snapshot.status() != expected {
                return Err(TravelflowError::StatusConflict {
                    id,
                    expected,
                    actual: snapshot.status(),
                });
            }
            snapshot.commit_status(new, Utc::now());
            Ok(())
        }

        async fn list_for_owner(&self, _owner: UserId) -> Result<Vec<TravelRequest>> {
            Ok(vec![self.snapshot.lock().clone()])
        }
    }

    fn data() -> TravelRequestData {
        TravelRequest::submit(
            NewTravelRequest {
                owner: UserId::new(),
                requester_name: "Bruno".to_string(),
                destination: "Recife, PE, Brasil".to_string(),
                departure_date: NaiveDate::from_ymd_opt(2025, 11, 10).unwrap(),
                return_date: NaiveDate::from_ymd_opt(2025, 11, 12).unwrap(),
                notes: None,
            },
            NaiveDate::from_ymd_opt(2025, 10, 8).unwrap(),
        )
        .unwrap()
        .data
    }

    fn manager() -> Actor {
        Actor::with_role(UserId::new(), "Manager", Role::Administrator)
    }

    #[test]
    fn test_config_defaults_and_partial_deserialization() {
        let config: WorkflowConfig = serde_json::from_str("{}").unwrap();
        assert!(config.reevaluate_on_conflict);

        let config: WorkflowConfig =
            serde_json::from_str(r#"{"reevaluate_on_conflict": false}"#).unwrap();
        assert!(!config.reevaluate_on_conflict);
    }

    #[tokio::test]
    async fn test_storage_failure_propagates_without_notification() {
        let request = TravelRequest::from_storage(data(), Status::Requested, Utc::now());
        let mut store = SnapshotStore::new(request.clone());
        store.fail_writes = true;
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = WorkflowEngine::new(store.clone(), notifier.clone());

        let err = engine
            .transition_to(&request, Status::Approved, &manager())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("disk full"));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.call_count(), 0);
    }

    fn employee() -> Actor {
        Actor::with_role(UserId::new(), "Employee", Role::Employee)
    }

    #[tokio::test]
    async fn test_stale_copy_is_judged_against_stored_status() {
        // Caller still holds a `requested` copy, storage already says `approved`
        let stale = TravelRequest::from_storage(data(), Status::Requested, Utc::now());
        let stored = TravelRequest::from_storage(stale.data.clone(), Status::Approved, Utc::now());
        let store = Arc::new(SnapshotStore::new(stored));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = WorkflowEngine::new(store.clone(), notifier.clone());

        for actor in [manager(), employee()] {
            let err = engine
                .transition_to(&stale, Status::Cancelled, &actor)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                TravelflowError::Transition(TransitionError::Undefined {
                    from: Status::Approved,
                    to: Status::Cancelled,
                })
            ));
        }

        // Same target as the stored status: no-op returning the stored request
        let same = engine
            .transition_to(&stale, Status::Approved, &employee())
            .await
            .unwrap();
        assert_eq!(same.status(), Status::Approved);

        // Asking for the status the stale copy holds is a real transition attempt
        let err = engine
            .transition_to(&stale, Status::Requested, &manager())
            .await
            .unwrap_err();
        assert!(matches!(
            err.transition_error(),
            Some(TransitionError::Undefined {
                from: Status::Approved,
                to: Status::Requested,
            })
        ));

        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_conflict_is_reevaluated_against_the_winner() {
        let request = TravelRequest::from_storage(data(), Status::Requested, Utc::now());
        let store = SnapshotStore::new(request.clone());
        *store.sneak_in.lock() = Some(Status::Approved);
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = WorkflowEngine::new(Arc::new(store), notifier.clone());

        let err = engine
            .transition_to(&request, Status::Cancelled, &manager())
            .await
            .unwrap_err();
        assert!(matches!(
            err.transition_error(),
            Some(TransitionError::Undefined {
                from: Status::Approved,
                to: Status::Cancelled,
            })
        ));
        assert_eq!(notifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_losing_to_the_same_change_is_idempotent() {
        let request = TravelRequest::from_storage(data(), Status::Requested, Utc::now());
        let store = SnapshotStore::new(request.clone());
        *store.sneak_in.lock() = Some(Status::Approved);
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = WorkflowEngine::new(Arc::new(store), notifier.clone());

        let approved = engine
            .transition_to(&request, Status::Approved, &manager())
            .await
            .unwrap();
        assert_eq!(approved.status(), Status::Approved);
        assert_eq!(notifier.call_count(), 0);
    }

    #[tokio::test]
    async fn test_conflict_surfaces_when_reevaluation_is_disabled() {
        let request = TravelRequest::from_storage(data(), Status::Requested, Utc::now());
        let store = SnapshotStore::new(request.clone());
        *store.sneak_in.lock() = Some(Status::Cancelled);
        let engine = WorkflowEngine::new(Arc::new(store), Arc::new(RecordingNotifier::new()))
            .with_config(WorkflowConfig {
                reevaluate_on_conflict: false,
            });

        let err = engine
            .transition_to(&request, Status::Approved, &manager())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TravelflowError::StatusConflict {
                expected: Status::Requested,
                actual: Status::Cancelled,
                ..
            }
        ));
    }
}
