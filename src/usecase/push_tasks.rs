use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::notification::Notification;

/// Payload handed to the external push-delivery worker over NATS. The
/// worker resolves the driver's devices from the vehicle and talks to the
/// gateway; this service only enqueues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushTask {
    pub notification_id: Uuid,
    pub vehicle_id: Uuid,
    pub title: String,
    pub body: String,
    pub source: String,
    pub destination: String,
    pub rate: f64,
    pub weight: f64,
    pub date: Option<String>,
    pub contact: String,
}

impl PushTask {
    /// None when the notification has lost its vehicle; there is nobody
    /// to deliver to.
    pub fn from_notification(notification: &Notification) -> Option<Self> {
        let vehicle_id = notification.vehicle_id?;
        Some(Self {
            notification_id: notification.id,
            vehicle_id,
            title: format!(
                "New Delivery: {} to {}",
                notification.source, notification.destination
            ),
            body: notification.message.clone(),
            source: notification.source.clone(),
            destination: notification.destination.clone(),
            rate: notification.rate,
            weight: notification.weight,
            date: notification.date.map(|d| d.to_string()),
            contact: notification.contact.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::notification::NewNotification;

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
    fn test_from_notification() {
        let notification = make_notification();
        let task = PushTask::from_notification(&notification).unwrap();

        assert_eq!(task.notification_id, notification.id);
        assert_eq!(task.title, "New Delivery: Mumbai to Pune");
        assert_eq!(task.body, "Urgent load");
    }

    #[test]
    fn test_from_notification_without_vehicle() {
        let mut notification = make_notification();
        notification.vehicle_id = None;

        assert!(PushTask::from_notification(&notification).is_none());
    }
}
