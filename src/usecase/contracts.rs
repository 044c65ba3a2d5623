use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::notification::{Disposition, Notification};
use crate::domain::vehicle::Vehicle;
use crate::repository::errors::RepositoryError;

/// Filters for the dispatcher-facing notification listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub disposition: Option<Disposition>,
    pub created_by: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

/// Filters for a single vehicle's notification feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleFeedQuery {
    pub is_read: Option<bool>,
    pub ascending: bool,
    pub limit: Option<i64>,
}

#[cfg_attr(test, mockall::automock)]
pub trait VehicleRepository: Send + Sync {
    async fn create(&self, vehicle: &Vehicle) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Vehicle>, RepositoryError>;
    async fn find_by_vehicle_number(
        &self,
        vehicle_number: &str,
    ) -> Result<Option<Vehicle>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Vehicle>, RepositoryError>;
    async fn update(&self, vehicle: &Vehicle) -> Result<(), RepositoryError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, RepositoryError>;
    async fn find_by_vehicle(
        &self,
        vehicle_id: Uuid,
        query: VehicleFeedQuery,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn list(&self, filter: NotificationFilter) -> Result<Vec<Notification>, RepositoryError>;
    /// Offers still open to anyone, plus the caller's own in-flight claims.
    async fn list_claimable(&self, user_id: Uuid) -> Result<Vec<Notification>, RepositoryError>;
    async fn list_read(&self) -> Result<Vec<Notification>, RepositoryError>;
    /// The locked notification on a route, if any, excluding the given id.
    async fn find_locked_on_route(
        &self,
        source: &str,
        destination: &str,
        exclude: Uuid,
    ) -> Result<Option<Notification>, RepositoryError>;
    /// Atomically soft-rejects the route's other unread notifications and
    /// locks the claimant. Returns `UniqueViolation` when a concurrent
    /// claim committed first.
    async fn lock_claim(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn mark_rejected(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError>;
    async fn set_reservation(
        &self,
        id: Uuid,
        reserved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn update(&self, notification: &Notification) -> Result<(), RepositoryError>;
    async fn delete_by_vehicle(&self, vehicle_id: Uuid) -> Result<u64, RepositoryError>;
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError>;
}
