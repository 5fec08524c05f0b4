//! Travel request entity and its status labels.
//!
//! A [`TravelRequest`] pairs immutable trip data with the one mutable field the
//! workflow owns: its [`Status`]. The status can only be changed from inside this
//! crate, which is what lets the workflow engine guarantee that every status change
//! went through authorization.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::request::transitions::StateResolver;
use crate::error::{Result, TravelflowError};

/// Status of a travel request.
///
/// These three labels are the only status values allowed to cross the crate
/// boundary; anything else parses to [`TravelflowError::UnknownStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Requested,
    Approved,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Requested, Status::Approved, Status::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Requested => "requested",
            Status::Approved => "approved",
            Status::Cancelled => "cancelled",
        }
    }

    /// True for statuses with no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        StateResolver::handler(*self).is_terminal()
    }

    /// Statuses structurally reachable from this one, ignoring who is asking.
    pub fn targets(&self) -> Vec<Status> {
        StateResolver::handler(*self).targets().collect()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = TravelflowError;

    fn from_str(s: &str) -> Result<Self> {
        StateResolver::resolve(s).map(|handler| handler.name())
    }
}

/// Unique identifier for a travel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        RequestId(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}

impl std::ops::Deref for RequestId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Unique identifier for a user (request owner or acting user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        UserId(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        UserId(uuid)
    }
}

impl std::ops::Deref for UserId {
    type Target = Uuid;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Caller-supplied fields for a new travel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTravelRequest {
    pub owner: UserId,
    pub requester_name: String,
    /// Human readable destination, e.g. "Curitiba, PR, Brasil"
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
    pub notes: Option<String>,
}

impl NewTravelRequest {
    /// Check the trip dates against `today`.
    ///
    /// The departure may be today but not earlier, and the return must be strictly
    /// after the departure.
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        if self.requester_name.trim().is_empty() {
            return Err(TravelflowError::Validation(
                "requester name must not be empty".to_string(),
            ));
        }
        if self.departure_date < today {
            return Err(TravelflowError::Validation(format!(
                "departure date {} is before {}",
                self.departure_date, today
            )));
        }
        if self.return_date <= self.departure_date {
            return Err(TravelflowError::Validation(format!(
                "return date {} must be after departure date {}",
                self.return_date, self.departure_date
            )));
        }
        Ok(())
    }
}

/// Immutable data of a travel request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelRequestData {
    pub id: RequestId,
    pub owner: UserId,
    pub requester_name: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A travel request together with its current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TravelRequest {
    /// Trip data, fixed at submission.
    pub data: TravelRequestData,
    pub(crate) status: Status,
    pub(crate) updated_at: DateTime<Utc>,
}

impl TravelRequest {
    /// Submit a new request. Every request starts out as [`Status::Requested`].
    pub fn submit(input: NewTravelRequest, today: NaiveDate) -> Result<Self> {
        input.validate(today)?;

        let now = Utc::now();
        Ok(Self {
            data: TravelRequestData {
                id: RequestId::new(),
                owner: input.owner,
                requester_name: input.requester_name,
                destination: input.destination,
                departure_date: input.departure_date,
                return_date: input.return_date,
                notes: input.notes,
                created_at: now,
            },
            status: Status::Requested,
            updated_at: now,
        })
    }

    /// Rebuild a request from a stored snapshot.
    ///
    /// Intended for storage implementations hydrating rows. This is not a
    /// transition and notifies nobody.
    pub fn from_storage(data: TravelRequestData, status: Status, updated_at: DateTime<Utc>) -> Self {
        Self {
            data,
            status,
            updated_at,
        }
    }

    pub fn id(&self) -> RequestId {
        self.data.id
    }

    pub fn owner(&self) -> UserId {
        self.data.owner
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Record a committed status. Only storage implementations inside the crate call this.
    pub(crate) fn commit_status(&mut self, status: Status, at: DateTime<Utc>) {
        self.status = status;
        self.updated_at = at;
    }
}
