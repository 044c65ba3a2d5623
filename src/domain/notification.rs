use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a driver's hold on a notification stays active before other
/// drivers may take it over.
pub const RESERVATION_TTL_MINUTES: i64 = 15;

/// Terminal disposition of a delivery offer. Derived from the persisted
/// flags; mutated only through the transition methods below, so the
/// read-but-not-accepted combination cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Unclaimed,
    Rejected,
    Locked,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Unclaimed => "unclaimed",
            Disposition::Rejected => "rejected",
            Disposition::Locked => "locked",
        }
    }
}

/// Dispatcher-supplied fields of a new delivery offer.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub source: String,
    pub destination: String,
    pub rate: f64,
    pub weight: f64,
    pub date: Option<NaiveDate>,
    pub message: String,
    pub contact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub source: String,
    pub destination: String,
    pub rate: f64,
    pub weight: f64,
    pub date: Option<NaiveDate>,
    pub message: String,
    pub contact: String,
    pub is_read: bool,
    pub is_accepted: bool,
    pub location_read_lock: bool,
    pub reserved_by: Option<Uuid>,
    pub reservation_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(vehicle_id: Uuid, created_by: Uuid, offer: NewNotification) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            vehicle_id: Some(vehicle_id),
            created_by: Some(created_by),
            source: offer.source,
            destination: offer.destination,
            rate: offer.rate,
            weight: offer.weight,
            date: offer.date,
            message: offer.message,
            contact: offer.contact,
            is_read: false,
            is_accepted: false,
            location_read_lock: false,
            reserved_by: None,
            reservation_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn disposition(&self) -> Disposition {
        if self.location_read_lock {
            Disposition::Locked
        } else if self.is_accepted {
            Disposition::Rejected
        } else {
            Disposition::Unclaimed
        }
    }

    /// A reservation is active only while its timestamp is fresh. Computed
    /// from the stored timestamp on every call; never cached, so expiry
    /// needs no background sweep.
    pub fn is_reserved_at(&self, now: DateTime<Utc>) -> bool {
        match (self.reserved_by, self.reservation_time) {
            (Some(_), Some(since)) => since + Duration::minutes(RESERVATION_TTL_MINUTES) > now,
            _ => false,
        }
    }

    /// Takes or keeps a hold on this offer. Returns false without mutating
    /// when another driver's hold is still active. Re-reserving one's own
    /// active hold succeeds and leaves the original timestamp in place.
    pub fn reserve(&mut self, user_id: Uuid, now: DateTime<Utc>) -> bool {
        if self.is_reserved_at(now) {
            return self.reserved_by == Some(user_id);
        }
        self.reserved_by = Some(user_id);
        self.reservation_time = Some(now);
        self.updated_at = now;
        true
    }

    /// Clears an active hold. Expired or absent holds are left as they are.
    pub fn unreserve(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_reserved_at(now) {
            return false;
        }
        self.reserved_by = None;
        self.reservation_time = None;
        self.updated_at = now;
        true
    }

    /// Final claim: the offer becomes the sole accepted one for its route.
    pub fn lock(&mut self, user_id: Uuid, now: DateTime<Utc>) {
        self.is_read = true;
        self.is_accepted = true;
        self.location_read_lock = true;
        self.reserved_by = Some(user_id);
        self.reservation_time = Some(now);
        self.updated_at = now;
    }

    /// Marks a losing offer as dispositioned without ever reading or
    /// locking it.
    pub fn soft_reject(&mut self, now: DateTime<Utc>) {
        self.is_accepted = true;
        self.updated_at = now;
    }

    /// Full unwind of a locked offer: the route becomes contestable again.
    pub fn reopen(&mut self, now: DateTime<Utc>) {
        self.is_read = false;
        self.is_accepted = false;
        self.location_read_lock = false;
        self.reserved_by = None;
        self.reservation_time = None;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_notification() -> Notification {
        Notification::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            NewNotification {
                source: "Mumbai".to_string(),
                destination: "Pune".to_string(),
                rate: 12000.0,
                weight: 8.5,
                date: None,
                message: "Urgent load".to_string(),
                contact: "9876543210".to_string(),
            },
        )
    }

    #[test]
    fn test_new_notification_is_unclaimed() {
        let n = make_notification();
        assert_eq!(n.disposition(), Disposition::Unclaimed);
        assert!(!n.is_read);
        assert!(!n.is_accepted);
        assert!(!n.location_read_lock);
        assert!(n.reserved_by.is_none());
    }

    #[test]
    fn test_lock_implies_read_and_accepted() {
        let mut n = make_notification();
        let driver = Uuid::new_v4();
        n.lock(driver, Utc::now());

        assert_eq!(n.disposition(), Disposition::Locked);
        assert!(n.is_read);
        assert!(n.is_accepted);
        assert!(n.location_read_lock);
        assert_eq!(n.reserved_by, Some(driver));
    }

    #[test]
    fn test_soft_reject_never_reads_or_locks() {
        let mut n = make_notification();
        n.soft_reject(Utc::now());

        assert_eq!(n.disposition(), Disposition::Rejected);
        assert!(!n.is_read);
        assert!(n.is_accepted);
        assert!(!n.location_read_lock);
    }

    #[test]
    fn test_reopen_clears_lock_and_reservation() {
        let mut n = make_notification();
        n.lock(Uuid::new_v4(), Utc::now());
        n.reopen(Utc::now());

        assert_eq!(n.disposition(), Disposition::Unclaimed);
        assert!(!n.is_read);
        assert!(!n.is_accepted);
        assert!(!n.location_read_lock);
        assert!(n.reserved_by.is_none());
        assert!(n.reservation_time.is_none());
    }

    #[test]
    fn test_reservation_expires_after_ttl() {
        let mut n = make_notification();
        let driver = Uuid::new_v4();
        let t0 = Utc::now();
        assert!(n.reserve(driver, t0));

        assert!(n.is_reserved_at(t0 + Duration::minutes(5)));
        assert!(n.is_reserved_at(t0 + Duration::minutes(14)));
        // Exactly at the TTL the hold is gone.
        assert!(!n.is_reserved_at(t0 + Duration::minutes(RESERVATION_TTL_MINUTES)));
        assert!(!n.is_reserved_at(t0 + Duration::minutes(16)));
    }

    #[test]
    fn test_expired_reservation_fields_still_populated() {
        let mut n = make_notification();
        let driver = Uuid::new_v4();
        let t0 = Utc::now();
        n.reserve(driver, t0);

        let later = t0 + Duration::minutes(20);
        assert!(!n.is_reserved_at(later));
        assert_eq!(n.reserved_by, Some(driver));
        assert!(n.reservation_time.is_some());
    }

    #[test]
    fn test_reserve_is_idempotent_for_holder() {
        let mut n = make_notification();
        let driver = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(n.reserve(driver, t0));
        let first_time = n.reservation_time;

        assert!(n.reserve(driver, t0 + Duration::minutes(5)));
        assert_eq!(n.reserved_by, Some(driver));
        assert_eq!(n.reservation_time, first_time);
    }

    #[test]
    fn test_reserve_rejected_while_other_holds() {
        let mut n = make_notification();
        let driver_a = Uuid::new_v4();
        let driver_b = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(n.reserve(driver_a, t0));
        assert!(!n.reserve(driver_b, t0 + Duration::minutes(5)));
        assert_eq!(n.reserved_by, Some(driver_a));
    }

    #[test]
    fn test_reserve_succeeds_after_expiry() {
        let mut n = make_notification();
        let driver_a = Uuid::new_v4();
        let driver_b = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(n.reserve(driver_a, t0));
        let t1 = t0 + Duration::minutes(16);
        assert!(n.reserve(driver_b, t1));
        assert_eq!(n.reserved_by, Some(driver_b));
        assert_eq!(n.reservation_time, Some(t1));
    }

    #[test]
    fn test_unreserve_clears_active_hold_only() {
        let mut n = make_notification();
        let driver = Uuid::new_v4();
        let t0 = Utc::now();

        assert!(!n.unreserve(t0));

        n.reserve(driver, t0);
        assert!(n.unreserve(t0 + Duration::minutes(1)));
        assert!(n.reserved_by.is_none());
        assert!(n.reservation_time.is_none());

        // Expired hold: unreserve is a no-op, fields stay as they were.
        n.reserve(driver, t0);
        assert!(!n.unreserve(t0 + Duration::minutes(20)));
        assert_eq!(n.reserved_by, Some(driver));
    }
}
