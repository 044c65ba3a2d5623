use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Registration fields supplied when onboarding a vehicle.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub model: String,
    pub name: String,
    pub number: String,
    pub alternate_number: String,
    pub address: String,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub capacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: Uuid,
    pub model: String,
    pub name: String,
    pub number: String,
    pub alternate_number: String,
    pub address: String,
    pub vehicle_type: String, // "open" or "close"
    pub vehicle_number: String,
    pub capacity: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(details: NewVehicle) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            model: details.model,
            name: details.name,
            number: details.number,
            alternate_number: details.alternate_number,
            address: details.address,
            vehicle_type: details.vehicle_type,
            vehicle_number: details.vehicle_number,
            capacity: details.capacity,
            status: "available".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update(
        &mut self,
        model: Option<String>,
        name: Option<String>,
        number: Option<String>,
        alternate_number: Option<String>,
        address: Option<String>,
        vehicle_type: Option<String>,
        vehicle_number: Option<String>,
        capacity: Option<f64>,
        status: Option<String>,
    ) {
        if let Some(m) = model {
            self.model = m;
        }
        if let Some(n) = name {
            self.name = n;
        }
        if let Some(n) = number {
            self.number = n;
        }
        if let Some(n) = alternate_number {
            self.alternate_number = n;
        }
        if let Some(a) = address {
            self.address = a;
        }
        if let Some(t) = vehicle_type {
            self.vehicle_type = t;
        }
        if let Some(v) = vehicle_number {
            self.vehicle_number = v;
        }
        if let Some(c) = capacity {
            self.capacity = c;
        }
        if let Some(s) = status {
            self.status = s;
        }
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_vehicle() -> Vehicle {
        Vehicle::new(NewVehicle {
            model: "Tata 407".to_string(),
            name: "Ramesh Transport".to_string(),
            number: "9811111111".to_string(),
            alternate_number: "9822222222".to_string(),
            address: "Bhiwandi, Thane".to_string(),
            vehicle_type: "open".to_string(),
            vehicle_number: "GJ-05-ES-9658".to_string(),
            capacity: 2.5,
        })
    }

    #[test]
    fn test_vehicle_creation() {
        let vehicle = make_vehicle();
        assert_eq!(vehicle.vehicle_number, "GJ-05-ES-9658");
        assert_eq!(vehicle.status, "available");
        assert_eq!(vehicle.created_at, vehicle.updated_at);
    }

    #[test]
    fn test_vehicle_partial_update() {
        let mut vehicle = make_vehicle();
        let original_updated_at = vehicle.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(10));

        vehicle.update(
            None,
            None,
            None,
            None,
            None,
            Some("close".to_string()),
            None,
            Some(3.5),
            None,
        );

        assert_eq!(vehicle.vehicle_type, "close");
        assert_eq!(vehicle.capacity, 3.5);
        assert_eq!(vehicle.model, "Tata 407");
        assert!(vehicle.updated_at > original_updated_at);
    }
}
