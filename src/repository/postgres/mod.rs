use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{
    domain::notification::Notification,
    domain::vehicle::Vehicle,
    repository::errors::RepositoryError,
    usecase::contracts::{
        NotificationFilter, NotificationRepository, VehicleFeedQuery, VehicleRepository,
    },
};

const NOTIFICATION_COLUMNS: &str = "id, vehicle_id, created_by, source, destination, rate, weight, \
     date, message, contact, is_read, is_accepted, location_read_lock, \
     reserved_by, reservation_time, created_at, updated_at";

const VEHICLE_COLUMNS: &str = "id, model, name, number, alternate_number, address, vehicle_type, \
     vehicle_number, capacity, status, created_at, updated_at";

fn map_db_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return RepositoryError::UniqueViolation;
        }
    }
    RepositoryError::DatabaseError(e.to_string())
}

pub struct PostgresVehicleRepository {
    pool: PgPool,
}

impl PostgresVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl VehicleRepository for PostgresVehicleRepository {
    #[tracing::instrument(skip(self, vehicle), fields(vehicle_id = %vehicle.id))]
    async fn create(&self, vehicle: &Vehicle) -> Result<(), RepositoryError> {
        tracing::debug!("creating vehicle");

        sqlx::query(
            r#"
            INSERT INTO vehicles (id, model, name, number, alternate_number, address,
                                  vehicle_type, vehicle_number, capacity, status,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.model)
        .bind(&vehicle.name)
        .bind(&vehicle.number)
        .bind(&vehicle.alternate_number)
        .bind(&vehicle.address)
        .bind(&vehicle.vehicle_type)
        .bind(&vehicle.vehicle_number)
        .bind(vehicle.capacity)
        .bind(&vehicle.status)
        .bind(vehicle.created_at)
        .bind(vehicle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(vehicle_id = %vehicle.id, "vehicle created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(vehicle_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Vehicle>, RepositoryError> {
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(vehicle)
    }

    #[tracing::instrument(skip(self), fields(%vehicle_number))]
    async fn find_by_vehicle_number(
        &self,
        vehicle_number: &str,
    ) -> Result<Option<Vehicle>, RepositoryError> {
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE vehicle_number = $1"
        ))
        .bind(vehicle_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(vehicle)
    }

    #[tracing::instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<Vehicle>, RepositoryError> {
        let vehicles = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(count = vehicles.len(), "vehicles fetched");
        Ok(vehicles)
    }

    #[tracing::instrument(skip(self, vehicle), fields(vehicle_id = %vehicle.id))]
    async fn update(&self, vehicle: &Vehicle) -> Result<(), RepositoryError> {
        tracing::debug!("updating vehicle");

        let result = sqlx::query(
            r#"
            UPDATE vehicles
            SET model = $2, name = $3, number = $4, alternate_number = $5, address = $6,
                vehicle_type = $7, vehicle_number = $8, capacity = $9, status = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(vehicle.id)
        .bind(&vehicle.model)
        .bind(&vehicle.name)
        .bind(&vehicle.number)
        .bind(&vehicle.alternate_number)
        .bind(&vehicle.address)
        .bind(&vehicle.vehicle_type)
        .bind(&vehicle.vehicle_number)
        .bind(vehicle.capacity)
        .bind(&vehicle.status)
        .bind(vehicle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(vehicle_id = %vehicle.id, "vehicle updated successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(vehicle_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        tracing::debug!("deleting vehicle");

        let result = sqlx::query("DELETE FROM vehicles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(vehicle_id = %id, "vehicle deleted successfully");
        Ok(())
    }
}

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id))]
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        tracing::debug!("creating notification");

        sqlx::query(
            r#"
            INSERT INTO driver_notifications
                (id, vehicle_id, created_by, source, destination, rate, weight, date,
                 message, contact, is_read, is_accepted, location_read_lock,
                 reserved_by, reservation_time, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(notification.id)
        .bind(notification.vehicle_id)
        .bind(notification.created_by)
        .bind(&notification.source)
        .bind(&notification.destination)
        .bind(notification.rate)
        .bind(notification.weight)
        .bind(notification.date)
        .bind(&notification.message)
        .bind(&notification.contact)
        .bind(notification.is_read)
        .bind(notification.is_accepted)
        .bind(notification.location_read_lock)
        .bind(notification.reserved_by)
        .bind(notification.reservation_time)
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(notification_id = %notification.id, "notification created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, RepositoryError> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM driver_notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self), fields(%vehicle_id))]
    async fn find_by_vehicle(
        &self,
        vehicle_id: Uuid,
        query: VehicleFeedQuery,
    ) -> Result<Vec<Notification>, RepositoryError> {
        tracing::debug!(?query, "fetching notifications for vehicle");

        let order = if query.ascending { "ASC" } else { "DESC" };
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM driver_notifications
            WHERE vehicle_id = $1
              AND ($2::bool IS NULL OR is_read = $2)
            ORDER BY created_at {order}
            LIMIT $3
            "#,
        );

        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(vehicle_id)
            .bind(query.is_read)
            .bind(query.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(count = notifications.len(), "vehicle notifications fetched");
        Ok(notifications)
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, filter: NotificationFilter) -> Result<Vec<Notification>, RepositoryError> {
        tracing::debug!(?filter, "listing notifications");

        let disposition = filter.disposition.map(|d| d.as_str());
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM driver_notifications
            WHERE ($1::uuid IS NULL OR created_by = $1)
              AND ($2::date IS NULL OR date = $2)
              AND ($3::text IS NULL OR CASE $3
                    WHEN 'unclaimed' THEN is_read = FALSE AND is_accepted = FALSE
                    WHEN 'rejected' THEN is_read = FALSE AND is_accepted = TRUE
                                         AND location_read_lock = FALSE
                    WHEN 'locked' THEN location_read_lock = TRUE
                  END)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(filter.created_by)
        .bind(filter.date)
        .bind(disposition)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(count = notifications.len(), "notifications fetched");
        Ok(notifications)
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    async fn list_claimable(&self, user_id: Uuid) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM driver_notifications
            WHERE location_read_lock = FALSE
               OR (is_read = TRUE AND reserved_by = $1)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        tracing::debug!(count = notifications.len(), "claimable notifications fetched");
        Ok(notifications)
    }

    #[tracing::instrument(skip(self))]
    async fn list_read(&self) -> Result<Vec<Notification>, RepositoryError> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM driver_notifications
            WHERE is_read = TRUE
            ORDER BY created_at DESC
            "#,
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(notifications)
    }

    #[tracing::instrument(skip(self), fields(%source, %destination))]
    async fn find_locked_on_route(
        &self,
        source: &str,
        destination: &str,
        exclude: Uuid,
    ) -> Result<Option<Notification>, RepositoryError> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM driver_notifications
            WHERE source = $1 AND destination = $2
              AND location_read_lock = TRUE
              AND id <> $3
            LIMIT 1
            "#,
        ))
        .bind(source)
        .bind(destination)
        .bind(exclude)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(notification)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, user_id = %user_id))]
    async fn lock_claim(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        tracing::debug!("locking claim");

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let route: Option<(String, String)> = sqlx::query_as(
            "SELECT source, destination FROM driver_notifications WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let Some((source, destination)) = route else {
            return Err(RepositoryError::NotFound);
        };

        // Soft-reject the route's other live contenders so only one offer
        // per route stays visible once somebody claims.
        sqlx::query(
            r#"
            UPDATE driver_notifications
            SET is_accepted = TRUE, updated_at = $4
            WHERE source = $1 AND destination = $2 AND id <> $3
              AND is_read = FALSE AND is_accepted = FALSE
            "#,
        )
        .bind(&source)
        .bind(&destination)
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        // The partial unique index on locked (source, destination) rows
        // makes this fail with a unique violation when a concurrent claim
        // already committed.
        sqlx::query(
            r#"
            UPDATE driver_notifications
            SET is_read = TRUE, is_accepted = TRUE, location_read_lock = TRUE,
                reserved_by = $2, reservation_time = $3, updated_at = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        tracing::debug!(notification_id = %id, "claim locked successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id))]
    async fn mark_rejected(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE driver_notifications SET is_accepted = TRUE, updated_at = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(notification_id = %id, "notification marked rejected");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, ?reserved_by))]
    async fn set_reservation(
        &self,
        id: Uuid,
        reserved_by: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let reservation_time = reserved_by.map(|_| at);
        let result = sqlx::query(
            r#"
            UPDATE driver_notifications
            SET reserved_by = $2, reservation_time = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(reserved_by)
        .bind(reservation_time)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(notification_id = %id, "reservation updated");
        Ok(())
    }

    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id))]
    async fn update(&self, notification: &Notification) -> Result<(), RepositoryError> {
        tracing::debug!("updating notification");

        let result = sqlx::query(
            r#"
            UPDATE driver_notifications
            SET source = $2, destination = $3, rate = $4, weight = $5, date = $6,
                message = $7, contact = $8, is_read = $9, is_accepted = $10,
                location_read_lock = $11, reserved_by = $12, reservation_time = $13,
                updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(notification.id)
        .bind(&notification.source)
        .bind(&notification.destination)
        .bind(notification.rate)
        .bind(notification.weight)
        .bind(notification.date)
        .bind(&notification.message)
        .bind(&notification.contact)
        .bind(notification.is_read)
        .bind(notification.is_accepted)
        .bind(notification.location_read_lock)
        .bind(notification.reserved_by)
        .bind(notification.reservation_time)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(notification_id = %notification.id, "notification updated successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(%vehicle_id))]
    async fn delete_by_vehicle(&self, vehicle_id: Uuid) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM driver_notifications WHERE vehicle_id = $1")
            .bind(vehicle_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(count = result.rows_affected(), "vehicle notifications deleted");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
    async fn delete_many(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM driver_notifications WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        tracing::debug!(count = result.rows_affected(), "notifications deleted");
        Ok(result.rows_affected())
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
