//! In-memory implementation of [`TravelRequestStore`].
//!
//! Useful for tests and for embedding the workflow without a database. The
//! compare-and-set in `update_status` runs while holding the map entry's lock, so it
//! gives the same single-winner guarantee as a conditional `UPDATE`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::TravelRequestStore;
use crate::error::{Result, TravelflowError};
use crate::request::{RequestId, Status, TravelRequest, UserId};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    requests: Arc<DashMap<RequestId, TravelRequest>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[async_trait]
impl TravelRequestStore for InMemoryStore {
    async fn create(&self, request: &TravelRequest) -> Result<()> {
        match self.requests.entry(request.id()) {
            Entry::Occupied(_) => Err(TravelflowError::Validation(format!(
                "travel request {} already exists",
                request.id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                tracing::debug!(request_id = %request.id(), "Stored new travel request");
                Ok(())
            }
        }
    }

    async fn get(&self, id: RequestId) -> Result<TravelRequest> {
        self.requests
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(TravelflowError::RequestNotFound(id))
    }

    #[tracing::instrument(skip(self), fields(request_id = %id, expected = %expected, new = %new))]
    async fn update_status(&self, id: RequestId, expected: Status, new: Status) -> Result<()> {
        let mut entry = self
            .requests
            .get_mut(&id)
            .ok_or(TravelflowError::RequestNotFound(id))?;

        let actual = entry.status();
        if actual != expected {
            tracing::debug!(actual = %actual, "Conditional status update lost the race");
            return Err(TravelflowError::StatusConflict {
                id,
                expected,
                actual,
            });
        }

        entry.commit_status(new, Utc::now());
        Ok(())
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<TravelRequest>> {
        let mut requests: Vec<TravelRequest> = self
            .requests
            .iter()
            .filter(|entry| entry.owner() == owner)
            .map(|entry| entry.value().clone())
            .collect();
        requests.sort_by(|a, b| b.data.created_at.cmp(&a.data.created_at));
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::NewTravelRequest;
    use chrono::NaiveDate;

    fn submit(owner: UserId) -> TravelRequest {
        TravelRequest::submit(
            NewTravelRequest {
                owner,
                requester_name: "Owner".to_string(),
                destination: "São Paulo, SP, Brasil".to_string(),
                departure_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
                return_date: NaiveDate::from_ymd_opt(2025, 12, 3).unwrap(),
                notes: Some("Client meeting".to_string()),
            },
            NaiveDate::from_ymd_opt(2025, 10, 8).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryStore::new();
        let request = submit(UserId::new());

        store.create(&request).await.unwrap();
        assert_eq!(store.get(request.id()).await.unwrap(), request);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_create_twice_is_rejected() {
        let store = InMemoryStore::new();
        let request = submit(UserId::new());

        store.create(&request).await.unwrap();
        assert!(matches!(
            store.create(&request).await,
            Err(TravelflowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_get_missing_request() {
        let store = InMemoryStore::new();
        let id = RequestId::new();
        assert!(matches!(
            store.get(id).await,
            Err(TravelflowError::RequestNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_update_status_compares_before_setting() {
        let store = InMemoryStore::new();
        let request = submit(UserId::new());
        store.create(&request).await.unwrap();

        store
            .update_status(request.id(), Status::Requested, Status::Approved)
            .await
            .unwrap();
        assert_eq!(
            store.get(request.id()).await.unwrap().status(),
            Status::Approved
        );

        // Second writer still believes the request is pending a decision
        let err = store
            .update_status(request.id(), Status::Requested, Status::Cancelled)
            .await
            .unwrap_err();
        match err {
            TravelflowError::StatusConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, Status::Requested);
                assert_eq!(actual, Status::Approved);
            }
            other => panic!("expected StatusConflict, got {other:?}"),
        }
        assert_eq!(
            store.get(request.id()).await.unwrap().status(),
            Status::Approved
        );
    }

    #[tokio::test]
    async fn test_update_status_on_missing_request() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store
                .update_status(RequestId::new(), Status::Requested, Status::Approved)
                .await,
            Err(TravelflowError::RequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_owner_filters_by_owner() {
        let store = InMemoryStore::new();
        let owner = UserId::new();
        let first = submit(owner);
        let second = submit(owner);
        store.create(&first).await.unwrap();
        store.create(&second).await.unwrap();
        store.create(&submit(UserId::new())).await.unwrap();

        let listed = store.list_for_owner(owner).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.owner() == owner));
        assert!(listed[0].data.created_at >= listed[1].data.created_at);
    }
}
