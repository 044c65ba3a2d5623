use chrono::{NaiveDate, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::notification::{Disposition, NewNotification, Notification};
use crate::domain::vehicle::Vehicle;
use crate::repository::errors::RepositoryError;
use crate::usecase::contracts::{
    NotificationFilter, NotificationRepository, VehicleFeedQuery, VehicleRepository,
};
use crate::usecase::error::UsecaseError;

/// The competing assignment reported when a claim loses its route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteConflict {
    pub vehicle_id: Option<Uuid>,
    pub is_accepted: bool,
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Notification not found")]
    NotFound,
    #[error("This route is already served by another vehicle")]
    RouteTaken(RouteConflict),
    #[error("Notification is held by another driver")]
    Reserved,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A claimed offer together with its vehicle assignment. Vehicle details
/// are only attached once the notification has been read.
#[derive(Debug, Clone)]
pub struct ClaimedNotification {
    pub notification: Notification,
    pub vehicle: Option<Vehicle>,
}

/// One row of the claim board returned to drivers.
#[derive(Debug, Clone)]
pub struct ClaimBoardEntry {
    pub notification: Notification,
    pub vehicle: Option<Vehicle>,
}

#[derive(Debug, Default)]
pub struct BulkCreateOutcome {
    pub created: Vec<Notification>,
    pub errors: Vec<String>,
}

/// Patch applicable to a locked notification. Setting `is_read` to false
/// unwinds the claim and reopens the route.
#[derive(Debug, Clone, Default)]
pub struct LockedPatch {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub rate: Option<f64>,
    pub weight: Option<f64>,
    pub date: Option<NaiveDate>,
    pub message: Option<String>,
    pub contact: Option<String>,
    pub is_read: Option<bool>,
}

pub struct NotificationsUseCase<N, V>
where
    N: NotificationRepository,
    V: VehicleRepository,
{
    notification_repository: N,
    vehicle_repository: V,
}

impl<N, V> NotificationsUseCase<N, V>
where
    N: NotificationRepository,
    V: VehicleRepository,
{
    pub fn new(notification_repository: N, vehicle_repository: V) -> Self {
        Self {
            notification_repository,
            vehicle_repository,
        }
    }

    async fn vehicle_for(
        &self,
        notification: &Notification,
    ) -> Result<Option<Vehicle>, RepositoryError> {
        match notification.vehicle_id {
            Some(vehicle_id) => self.vehicle_repository.find_by_id(vehicle_id).await,
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, offer), fields(%vehicle_id, %created_by, source = %offer.source, destination = %offer.destination))]
    pub async fn create(
        &self,
        vehicle_id: Uuid,
        created_by: Uuid,
        offer: NewNotification,
    ) -> Result<Notification, UsecaseError> {
        tracing::debug!("creating delivery notification");

        self.vehicle_repository
            .find_by_id(vehicle_id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Vehicle".to_string()))?;

        let notification = Notification::new(vehicle_id, created_by, offer);
        self.notification_repository.create(&notification).await?;

        tracing::info!(notification_id = %notification.id, "notification created");
        Ok(notification)
    }

    #[tracing::instrument(skip(self, offers), fields(%created_by, vehicle_count = vehicle_ids.len(), offer_count = offers.len()))]
    pub async fn create_bulk(
        &self,
        vehicle_ids: Vec<Uuid>,
        created_by: Uuid,
        offers: Vec<NewNotification>,
    ) -> Result<BulkCreateOutcome, UsecaseError> {
        tracing::debug!("bulk creating delivery notifications");

        let mut outcome = BulkCreateOutcome::default();
        for vehicle_id in vehicle_ids {
            if self
                .vehicle_repository
                .find_by_id(vehicle_id)
                .await?
                .is_none()
            {
                outcome.errors.push(format!("Vehicle {} not found", vehicle_id));
                continue;
            }
            for offer in &offers {
                let notification = Notification::new(vehicle_id, created_by, offer.clone());
                self.notification_repository.create(&notification).await?;
                outcome.created.push(notification);
            }
        }

        tracing::info!(
            created = outcome.created.len(),
            errors = outcome.errors.len(),
            "bulk create finished"
        );
        Ok(outcome)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Notification, UsecaseError> {
        self.notification_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Notification".to_string()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        filter: NotificationFilter,
    ) -> Result<Vec<Notification>, UsecaseError> {
        tracing::debug!(?filter, "listing notifications");

        let explicit_disposition = filter.disposition.is_some();
        let notifications = self.notification_repository.list(filter).await?;

        // The default dispatcher view hides soft-rejected offers; they stay
        // queryable through an explicit disposition filter.
        let visible: Vec<Notification> = if explicit_disposition {
            notifications
        } else {
            notifications
                .into_iter()
                .filter(|n| n.disposition() != Disposition::Rejected)
                .collect()
        };

        tracing::debug!(count = visible.len(), "notifications listed");
        Ok(visible)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_read(&self) -> Result<Vec<Notification>, UsecaseError> {
        Ok(self.notification_repository.list_read().await?)
    }

    #[tracing::instrument(skip(self), fields(%vehicle_id))]
    pub async fn feed_for_vehicle(
        &self,
        vehicle_id: Uuid,
        query: VehicleFeedQuery,
    ) -> Result<(Vehicle, Vec<Notification>), UsecaseError> {
        tracing::debug!(?query, "fetching vehicle notification feed");

        let vehicle = self
            .vehicle_repository
            .find_by_id(vehicle_id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Vehicle".to_string()))?;

        let notifications = self
            .notification_repository
            .find_by_vehicle(vehicle_id, query)
            .await?;

        tracing::debug!(count = notifications.len(), "vehicle feed retrieved");
        Ok((vehicle, notifications))
    }

    /// The claim board: offers whose route is still open, plus the
    /// caller's own in-flight claims. Other drivers' claims never appear.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_claimable(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ClaimBoardEntry>, UsecaseError> {
        tracing::debug!("listing claimable notifications");

        let notifications = self.notification_repository.list_claimable(user_id).await?;

        let mut entries = Vec::with_capacity(notifications.len());
        for notification in notifications {
            // Vehicle details stay hidden until the offer has been claimed.
            let vehicle = if notification.is_read {
                self.vehicle_for(&notification).await?
            } else {
                None
            };
            entries.push(ClaimBoardEntry {
                notification,
                vehicle,
            });
        }

        tracing::debug!(count = entries.len(), "claim board assembled");
        Ok(entries)
    }

    /// Claim an offer for a driver: reserve-then-lock. Exactly one claim
    /// per route can ever succeed; losers are marked rejected and told who
    /// won. The store's partial unique index is the final arbiter when two
    /// claims race past the checks here.
    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    pub async fn claim(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<ClaimedNotification, ClaimError> {
        let now = Utc::now();
        tracing::debug!("attempting claim");

        let notification = self
            .notification_repository
            .find_by_id(id)
            .await?
            .ok_or(ClaimError::NotFound)?;

        if notification.disposition() == Disposition::Locked {
            if notification.reserved_by == Some(user_id) {
                tracing::debug!("claim repeated by current holder");
                let vehicle = self.vehicle_for(&notification).await?;
                return Ok(ClaimedNotification {
                    notification,
                    vehicle,
                });
            }
            tracing::info!("claim refused, notification already locked");
            return Err(ClaimError::RouteTaken(RouteConflict {
                vehicle_id: notification.vehicle_id,
                is_accepted: notification.is_accepted,
            }));
        }

        if notification.is_reserved_at(now) && notification.reserved_by != Some(user_id) {
            tracing::info!("claim refused, active reservation by another driver");
            return Err(ClaimError::Reserved);
        }

        // Fast path: the route may already be served by another offer.
        if let Some(winner) = self
            .notification_repository
            .find_locked_on_route(&notification.source, &notification.destination, id)
            .await?
        {
            self.notification_repository.mark_rejected(id, now).await?;
            tracing::info!(winner_id = %winner.id, "claim lost, route already locked");
            return Err(ClaimError::RouteTaken(RouteConflict {
                vehicle_id: winner.vehicle_id,
                is_accepted: winner.is_accepted,
            }));
        }

        let mut notification = notification;
        match self.notification_repository.lock_claim(id, user_id, now).await {
            Ok(()) => notification.lock(user_id, now),
            Err(RepositoryError::UniqueViolation) => {
                // Race lost at the index despite the pre-check. Same outcome
                // as the fast path: reject this record, report the winner.
                let winner = self
                    .notification_repository
                    .find_locked_on_route(&notification.source, &notification.destination, id)
                    .await?;
                self.notification_repository.mark_rejected(id, now).await?;
                tracing::info!("claim lost concurrent race on route lock");
                return Err(ClaimError::RouteTaken(RouteConflict {
                    vehicle_id: winner.as_ref().and_then(|w| w.vehicle_id),
                    is_accepted: winner.map(|w| w.is_accepted).unwrap_or(true),
                }));
            }
            Err(e) => return Err(ClaimError::Repository(e)),
        }

        let vehicle = self.vehicle_for(&notification).await?;

        tracing::info!("claim succeeded, route locked");
        Ok(ClaimedNotification {
            notification,
            vehicle,
        })
    }

    /// Time-limited hold prior to a full claim. Returns false without
    /// mutating when another driver's hold is still active.
    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    pub async fn reserve(&self, id: Uuid, user_id: Uuid) -> Result<bool, ClaimError> {
        let now = Utc::now();
        tracing::debug!("reserving notification");

        let mut notification = self
            .notification_repository
            .find_by_id(id)
            .await?
            .ok_or(ClaimError::NotFound)?;

        if !notification.reserve(user_id, now) {
            tracing::debug!("reservation already active for another driver");
            return Ok(false);
        }

        // A repeated reservation by the holder changes nothing; only a
        // freshly stamped hold is written back.
        if notification.reservation_time == Some(now) {
            self.notification_repository
                .set_reservation(id, Some(user_id), now)
                .await?;
            tracing::info!("notification reserved");
        }
        Ok(true)
    }

    /// Explicit release of an active hold. No-op when the hold is absent
    /// or already expired.
    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    pub async fn release(&self, id: Uuid) -> Result<bool, ClaimError> {
        let now = Utc::now();
        tracing::debug!("releasing reservation");

        let mut notification = self
            .notification_repository
            .find_by_id(id)
            .await?
            .ok_or(ClaimError::NotFound)?;

        if !notification.unreserve(now) {
            tracing::debug!("no active reservation to release");
            return Ok(false);
        }

        self.notification_repository
            .set_reservation(id, None, now)
            .await?;

        tracing::info!("reservation released");
        Ok(true)
    }

    /// Admin patch for a locked notification. The only sanctioned way to
    /// reopen a route: a patch carrying `is_read = false` unwinds the
    /// claim entirely.
    #[tracing::instrument(skip(self, patch), fields(notification_id = %id))]
    pub async fn update_locked(
        &self,
        id: Uuid,
        patch: LockedPatch,
    ) -> Result<Notification, UsecaseError> {
        let now = Utc::now();
        tracing::debug!("updating locked notification");

        let mut notification = self
            .notification_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Notification".to_string()))?;

        if !(notification.is_read && notification.is_accepted) {
            return Err(UsecaseError::InvalidTransition(
                "Notification can be updated only once it is read and accepted".to_string(),
            ));
        }

        if let Some(source) = patch.source {
            notification.source = source;
        }
        if let Some(destination) = patch.destination {
            notification.destination = destination;
        }
        if let Some(rate) = patch.rate {
            notification.rate = rate;
        }
        if let Some(weight) = patch.weight {
            notification.weight = weight;
        }
        if let Some(date) = patch.date {
            notification.date = Some(date);
        }
        if let Some(message) = patch.message {
            notification.message = message;
        }
        if let Some(contact) = patch.contact {
            notification.contact = contact;
        }
        notification.updated_at = now;

        if patch.is_read == Some(false) {
            notification.reopen(now);
            tracing::info!(
                source = %notification.source,
                destination = %notification.destination,
                "locked notification unwound, route reopened"
            );
        }

        self.notification_repository.update(&notification).await?;

        tracing::debug!("locked notification updated");
        Ok(notification)
    }

    #[tracing::instrument(skip(self), fields(count = ids.len()))]
    pub async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, UsecaseError> {
        tracing::debug!("bulk deleting notifications");

        let mut invalid = Vec::new();
        for id in ids {
            if self.notification_repository.find_by_id(*id).await?.is_none() {
                invalid.push(id.to_string());
            }
        }
        if !invalid.is_empty() {
            return Err(UsecaseError::Validation(format!(
                "Notification IDs are invalid: {}",
                invalid.join(", ")
            )));
        }

        let deleted = self.notification_repository.delete_many(ids).await?;

        tracing::info!(deleted, "notifications deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::RESERVATION_TTL_MINUTES;
    use crate::domain::vehicle::NewVehicle;
    use crate::usecase::contracts::{MockNotificationRepository, MockVehicleRepository};
    use chrono::Duration;

    fn make_offer(source: &str, destination: &str) -> NewNotification {
        NewNotification {
            source: source.to_string(),
            destination: destination.to_string(),
            rate: 15000.0,
            weight: 10.0,
            date: None,
            message: "Full load".to_string(),
            contact: "9876543210".to_string(),
        }
    }

    fn make_notification(source: &str, destination: &str) -> Notification {
        Notification::new(Uuid::new_v4(), Uuid::new_v4(), make_offer(source, destination))
    }

    fn make_vehicle() -> Vehicle {
        Vehicle::new(NewVehicle {
            model: "Eicher Pro".to_string(),
            name: "Sharma Logistics".to_string(),
            number: "9811111111".to_string(),
            alternate_number: "9822222222".to_string(),
            address: "Nashik".to_string(),
            vehicle_type: "close".to_string(),
            vehicle_number: "MH-15-BA-1234".to_string(),
            capacity: 7.5,
        })
    }

    #[tokio::test]
    async fn test_claim_locks_unclaimed_notification() {
        let mut notification_repo = MockNotificationRepository::new();
        let mut vehicle_repo = MockVehicleRepository::new();

        let vehicle = make_vehicle();
        let mut notification = make_notification("Mumbai", "Pune");
        notification.vehicle_id = Some(vehicle.id);
        let id = notification.id;
        let driver = Uuid::new_v4();

        let unclaimed = notification.clone();
        notification_repo
            .expect_find_by_id()
            .with(mockall::predicate::eq(id))
            .times(1)
            .returning(move |_| Ok(Some(unclaimed.clone())));
        notification_repo
            .expect_find_locked_on_route()
            .times(1)
            .returning(|_, _, _| Ok(None));
        notification_repo
            .expect_lock_claim()
            .withf(move |i, u, _| *i == id && *u == driver)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let vehicle_clone = vehicle.clone();
        vehicle_repo
            .expect_find_by_id()
            .with(mockall::predicate::eq(vehicle.id))
            .times(1)
            .returning(move |_| Ok(Some(vehicle_clone.clone())));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let claimed = usecase.claim(id, driver).await.unwrap();

        assert!(claimed.notification.is_read);
        assert!(claimed.notification.is_accepted);
        assert!(claimed.notification.location_read_lock);
        assert_eq!(claimed.notification.reserved_by, Some(driver));
        assert!(claimed.vehicle.is_some());
    }

    #[tokio::test]
    async fn test_claim_conflict_rejects_loser_and_reports_winner() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let mut winner = make_notification("Mumbai", "Pune");
        winner.lock(Uuid::new_v4(), Utc::now());
        let winner_vehicle_id = winner.vehicle_id;

        let loser = make_notification("Mumbai", "Pune");
        let loser_id = loser.id;
        let driver = Uuid::new_v4();

        notification_repo
            .expect_find_by_id()
            .with(mockall::predicate::eq(loser_id))
            .times(1)
            .returning(move |_| Ok(Some(loser.clone())));
        notification_repo
            .expect_find_locked_on_route()
            .withf(move |s, d, e| s == "Mumbai" && d == "Pune" && *e == loser_id)
            .times(1)
            .returning(move |_, _, _| Ok(Some(winner.clone())));
        notification_repo
            .expect_mark_rejected()
            .withf(move |i, _| *i == loser_id)
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let err = usecase.claim(loser_id, driver).await.unwrap_err();

        match err {
            ClaimError::RouteTaken(conflict) => {
                assert_eq!(conflict.vehicle_id, winner_vehicle_id);
                assert!(conflict.is_accepted);
            }
            other => panic!("expected RouteTaken, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_claim_race_lost_at_store_translates_to_conflict() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let notification = make_notification("Delhi", "Jaipur");
        let id = notification.id;
        let driver = Uuid::new_v4();

        let mut winner = make_notification("Delhi", "Jaipur");
        winner.lock(Uuid::new_v4(), Utc::now());
        let winner_vehicle_id = winner.vehicle_id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));

        // Pre-check sees nothing, the concurrent winner commits in between,
        // then the index refuses our lock.
        let mut locked_calls = 0;
        notification_repo
            .expect_find_locked_on_route()
            .times(2)
            .returning(move |_, _, _| {
                locked_calls += 1;
                if locked_calls == 1 {
                    Ok(None)
                } else {
                    Ok(Some(winner.clone()))
                }
            });
        notification_repo
            .expect_lock_claim()
            .times(1)
            .returning(|_, _, _| Err(RepositoryError::UniqueViolation));
        notification_repo
            .expect_mark_rejected()
            .withf(move |i, _| *i == id)
            .times(1)
            .returning(|_, _| Ok(()));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let err = usecase.claim(id, driver).await.unwrap_err();

        match err {
            ClaimError::RouteTaken(conflict) => {
                assert_eq!(conflict.vehicle_id, winner_vehicle_id);
                assert!(conflict.is_accepted);
            }
            other => panic!("expected RouteTaken, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_claim_refused_while_reserved_by_other() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let mut notification = make_notification("Surat", "Indore");
        notification.reserve(Uuid::new_v4(), Utc::now());
        let id = notification.id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let err = usecase.claim(id, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, ClaimError::Reserved));
    }

    #[tokio::test]
    async fn test_claim_idempotent_for_lock_holder() {
        let mut notification_repo = MockNotificationRepository::new();
        let mut vehicle_repo = MockVehicleRepository::new();

        let vehicle = make_vehicle();
        let driver = Uuid::new_v4();
        let mut notification = make_notification("Mumbai", "Pune");
        notification.vehicle_id = Some(vehicle.id);
        notification.lock(driver, Utc::now());
        let id = notification.id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));
        let vehicle_clone = vehicle.clone();
        vehicle_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(vehicle_clone.clone())));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let claimed = usecase.claim(id, driver).await.unwrap();

        assert!(claimed.notification.location_read_lock);
        assert!(claimed.vehicle.is_some());
    }

    #[tokio::test]
    async fn test_claim_not_found() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let err = usecase.claim(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, ClaimError::NotFound));
    }

    #[tokio::test]
    async fn test_reserve_fails_while_held_then_succeeds_after_expiry() {
        let driver_a = Uuid::new_v4();
        let driver_b = Uuid::new_v4();

        // Held 5 minutes ago: driver B is refused, nothing is written.
        {
            let mut notification_repo = MockNotificationRepository::new();
            let vehicle_repo = MockVehicleRepository::new();

            let mut notification = make_notification("Mumbai", "Nagpur");
            notification.reserve(driver_a, Utc::now() - Duration::minutes(5));
            let id = notification.id;

            notification_repo
                .expect_find_by_id()
                .times(1)
                .returning(move |_| Ok(Some(notification.clone())));

            let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
            assert!(!usecase.reserve(id, driver_b).await.unwrap());
        }

        // Held 16 minutes ago: the hold has lapsed, driver B takes over.
        {
            let mut notification_repo = MockNotificationRepository::new();
            let vehicle_repo = MockVehicleRepository::new();

            let mut notification = make_notification("Mumbai", "Nagpur");
            notification
                .reserve(driver_a, Utc::now() - Duration::minutes(RESERVATION_TTL_MINUTES + 1));
            let id = notification.id;

            notification_repo
                .expect_find_by_id()
                .times(1)
                .returning(move |_| Ok(Some(notification.clone())));
            notification_repo
                .expect_set_reservation()
                .withf(move |i, who, _| *i == id && *who == Some(driver_b))
                .times(1)
                .returning(|_, _, _| Ok(()));

            let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
            assert!(usecase.reserve(id, driver_b).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_reserve_idempotent_for_holder() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let driver = Uuid::new_v4();
        let mut notification = make_notification("Pune", "Goa");
        notification.reserve(driver, Utc::now() - Duration::minutes(2));
        let id = notification.id;

        // No set_reservation expectation: the repeat succeeds without a write.
        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        assert!(usecase.reserve(id, driver).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_clears_active_hold() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let mut notification = make_notification("Pune", "Goa");
        notification.reserve(Uuid::new_v4(), Utc::now());
        let id = notification.id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));
        notification_repo
            .expect_set_reservation()
            .withf(move |i, who, _| *i == id && who.is_none())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        assert!(usecase.release(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_noop_without_active_hold() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let notification = make_notification("Pune", "Goa");
        let id = notification.id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        assert!(!usecase.release(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_locked_rejected_on_unclaimed() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let notification = make_notification("Mumbai", "Pune");
        let id = notification.id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let err = usecase
            .update_locked(id, LockedPatch::default())
            .await
            .unwrap_err();

        assert!(matches!(err, UsecaseError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_update_locked_reopen_clears_lock() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let mut notification = make_notification("Mumbai", "Pune");
        notification.lock(Uuid::new_v4(), Utc::now());
        let id = notification.id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));
        notification_repo
            .expect_update()
            .withf(|n| {
                !n.is_read && !n.is_accepted && !n.location_read_lock && n.reserved_by.is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let patch = LockedPatch {
            is_read: Some(false),
            ..Default::default()
        };
        let updated = usecase.update_locked(id, patch).await.unwrap();

        assert_eq!(updated.disposition(), Disposition::Unclaimed);
    }

    #[tokio::test]
    async fn test_update_locked_applies_fields_verbatim() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let mut notification = make_notification("Mumbai", "Pune");
        notification.lock(Uuid::new_v4(), Utc::now());
        let id = notification.id;

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(notification.clone())));
        notification_repo
            .expect_update()
            .withf(|n| n.rate == 18000.0 && n.message == "Revised rate" && n.location_read_lock)
            .times(1)
            .returning(|_| Ok(()));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let patch = LockedPatch {
            rate: Some(18000.0),
            message: Some("Revised rate".to_string()),
            ..Default::default()
        };
        let updated = usecase.update_locked(id, patch).await.unwrap();

        // Lock stays in place when is_read is not part of the patch.
        assert!(updated.location_read_lock);
        assert_eq!(updated.rate, 18000.0);
    }

    #[tokio::test]
    async fn test_list_claimable_hides_vehicle_until_read() {
        let mut notification_repo = MockNotificationRepository::new();
        let mut vehicle_repo = MockVehicleRepository::new();

        let vehicle = make_vehicle();
        let user = Uuid::new_v4();

        let mut open = make_notification("Mumbai", "Pune");
        open.vehicle_id = Some(vehicle.id);
        let mut claimed = make_notification("Delhi", "Agra");
        claimed.vehicle_id = Some(vehicle.id);
        claimed.lock(user, Utc::now());

        let rows = vec![open.clone(), claimed.clone()];
        notification_repo
            .expect_list_claimable()
            .with(mockall::predicate::eq(user))
            .times(1)
            .returning(move |_| Ok(rows.clone()));

        let vehicle_clone = vehicle.clone();
        vehicle_repo
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(vehicle_clone.clone())));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let entries = usecase.list_claimable(user).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].vehicle.is_none());
        assert!(entries[1].vehicle.is_some());
    }

    #[tokio::test]
    async fn test_list_hides_rejected_by_default() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        let open = make_notification("Mumbai", "Pune");
        let mut rejected = make_notification("Mumbai", "Pune");
        rejected.soft_reject(Utc::now());

        let rows = vec![open.clone(), rejected.clone()];
        notification_repo
            .expect_list()
            .times(1)
            .returning(move |_| Ok(rows.clone()));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let visible = usecase.list(NotificationFilter::default()).await.unwrap();

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, open.id);
    }

    #[tokio::test]
    async fn test_create_requires_existing_vehicle() {
        let notification_repo = MockNotificationRepository::new();
        let mut vehicle_repo = MockVehicleRepository::new();

        vehicle_repo
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let err = usecase
            .create(Uuid::new_v4(), Uuid::new_v4(), make_offer("Mumbai", "Pune"))
            .await
            .unwrap_err();

        assert!(matches!(err, UsecaseError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_many_rejects_unknown_ids() {
        let mut notification_repo = MockNotificationRepository::new();
        let vehicle_repo = MockVehicleRepository::new();

        notification_repo
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let usecase = NotificationsUseCase::new(notification_repo, vehicle_repo);
        let err = usecase.delete_many(&[Uuid::new_v4()]).await.unwrap_err();

        assert!(matches!(err, UsecaseError::Validation(_)));
    }
}
