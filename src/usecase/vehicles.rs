use uuid::Uuid;

use crate::domain::vehicle::{NewVehicle, Vehicle};
use crate::usecase::contracts::{NotificationRepository, VehicleRepository};
use crate::usecase::error::UsecaseError;

/// Fields accepted by the vehicle update endpoint; all optional.
#[derive(Debug, Clone, Default)]
pub struct VehiclePatch {
    pub model: Option<String>,
    pub name: Option<String>,
    pub number: Option<String>,
    pub alternate_number: Option<String>,
    pub address: Option<String>,
    pub vehicle_type: Option<String>,
    pub vehicle_number: Option<String>,
    pub capacity: Option<f64>,
    pub status: Option<String>,
}

pub struct VehiclesUseCase<V, N>
where
    V: VehicleRepository,
    N: NotificationRepository,
{
    vehicle_repository: V,
    notification_repository: N,
}

impl<V, N> VehiclesUseCase<V, N>
where
    V: VehicleRepository,
    N: NotificationRepository,
{
    pub fn new(vehicle_repository: V, notification_repository: N) -> Self {
        Self {
            vehicle_repository,
            notification_repository,
        }
    }

    #[tracing::instrument(skip(self, details), fields(vehicle_number = %details.vehicle_number))]
    pub async fn create(&self, details: NewVehicle) -> Result<Vehicle, UsecaseError> {
        tracing::debug!("registering vehicle");

        if self
            .vehicle_repository
            .find_by_vehicle_number(&details.vehicle_number)
            .await?
            .is_some()
        {
            return Err(UsecaseError::Conflict(
                "Vehicle with this vehicle number already exists".to_string(),
            ));
        }

        let vehicle = Vehicle::new(details);
        self.vehicle_repository.create(&vehicle).await?;

        tracing::info!(vehicle_id = %vehicle.id, "vehicle registered");
        Ok(vehicle)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Vehicle>, UsecaseError> {
        let vehicles = self.vehicle_repository.list_all().await?;

        tracing::debug!(count = vehicles.len(), "vehicles listed");
        Ok(vehicles)
    }

    #[tracing::instrument(skip(self), fields(vehicle_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Vehicle, UsecaseError> {
        self.vehicle_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Vehicle".to_string()))
    }

    #[tracing::instrument(skip(self, patch), fields(vehicle_id = %id))]
    pub async fn update(&self, id: Uuid, patch: VehiclePatch) -> Result<Vehicle, UsecaseError> {
        tracing::debug!("updating vehicle");

        let mut vehicle = self
            .vehicle_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Vehicle".to_string()))?;

        if let Some(ref vehicle_number) = patch.vehicle_number {
            if *vehicle_number != vehicle.vehicle_number
                && self
                    .vehicle_repository
                    .find_by_vehicle_number(vehicle_number)
                    .await?
                    .is_some()
            {
                return Err(UsecaseError::Conflict(
                    "Vehicle with this vehicle number already exists".to_string(),
                ));
            }
        }

        vehicle.update(
            patch.model,
            patch.name,
            patch.number,
            patch.alternate_number,
            patch.address,
            patch.vehicle_type,
            patch.vehicle_number,
            patch.capacity,
            patch.status,
        );
        self.vehicle_repository.update(&vehicle).await?;

        tracing::debug!(vehicle_id = %id, "vehicle updated");
        Ok(vehicle)
    }

    /// Removes the vehicle and everything that hangs off it: its
    /// notifications go first, then the vehicle record itself.
    #[tracing::instrument(skip(self), fields(vehicle_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("deleting vehicle");

        self.vehicle_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Vehicle".to_string()))?;

        let removed = self.notification_repository.delete_by_vehicle(id).await?;
        self.vehicle_repository.delete(id).await?;

        tracing::info!(vehicle_id = %id, notifications_removed = removed, "vehicle deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::contracts::{MockNotificationRepository, MockVehicleRepository};

    fn make_details() -> NewVehicle {
        NewVehicle {
            model: "Ashok Leyland Dost".to_string(),
            name: "Patel Roadways".to_string(),
            number: "9833333333".to_string(),
            alternate_number: "9844444444".to_string(),
            address: "Vapi".to_string(),
            vehicle_type: "open".to_string(),
            vehicle_number: "GJ-05-ES-9658".to_string(),
            capacity: 1.5,
        }
    }

    #[tokio::test]
    async fn test_create_vehicle() {
        let mut vehicle_repo = MockVehicleRepository::new();
        let notification_repo = MockNotificationRepository::new();

        vehicle_repo
            .expect_find_by_vehicle_number()
            .times(1)
            .returning(|_| Ok(None));
        vehicle_repo.expect_create().times(1).returning(|_| Ok(()));

        let usecase = VehiclesUseCase::new(vehicle_repo, notification_repo);
        let vehicle = usecase.create(make_details()).await.unwrap();

        assert_eq!(vehicle.vehicle_number, "GJ-05-ES-9658");
        assert_eq!(vehicle.status, "available");
    }

    #[tokio::test]
    async fn test_create_vehicle_duplicate_number() {
        let mut vehicle_repo = MockVehicleRepository::new();
        let notification_repo = MockNotificationRepository::new();

        vehicle_repo
            .expect_find_by_vehicle_number()
            .times(1)
            .returning(|_| Ok(Some(Vehicle::new(make_details()))));

        let usecase = VehiclesUseCase::new(vehicle_repo, notification_repo);
        let err = usecase.create(make_details()).await.unwrap_err();

        assert!(matches!(err, UsecaseError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_notifications() {
        let mut vehicle_repo = MockVehicleRepository::new();
        let mut notification_repo = MockNotificationRepository::new();

        let vehicle = Vehicle::new(make_details());
        let vehicle_id = vehicle.id;

        vehicle_repo
            .expect_find_by_id()
            .with(mockall::predicate::eq(vehicle_id))
            .times(1)
            .returning(move |_| Ok(Some(vehicle.clone())));
        notification_repo
            .expect_delete_by_vehicle()
            .with(mockall::predicate::eq(vehicle_id))
            .times(1)
            .returning(|_| Ok(3));
        vehicle_repo
            .expect_delete()
            .with(mockall::predicate::eq(vehicle_id))
            .times(1)
            .returning(|_| Ok(()));

        let usecase = VehiclesUseCase::new(vehicle_repo, notification_repo);
        usecase.delete(vehicle_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_vehicle() {
        let mut vehicle_repo = MockVehicleRepository::new();
        let notification_repo = MockNotificationRepository::new();

        vehicle_repo
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let usecase = VehiclesUseCase::new(vehicle_repo, notification_repo);
        let err = usecase.delete(Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, UsecaseError::NotFound(_)));
    }
}
