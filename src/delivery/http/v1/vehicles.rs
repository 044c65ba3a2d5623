use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::delivery::http::v1::middleware::{require_admin, AuthenticatedUser};
use crate::domain::vehicle::{NewVehicle, Vehicle};
use crate::usecase::error::UsecaseError;
use crate::usecase::vehicles::VehiclePatch;
use crate::AppState;

#[derive(Serialize)]
pub struct VehicleResponse {
    pub id: Uuid,
    pub model: String,
    pub name: String,
    pub number: String,
    pub alternate_number: String,
    pub address: String,
    pub vehicle_type: String,
    pub vehicle_number: String,
    pub capacity: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Vehicle> for VehicleResponse {
    fn from(v: Vehicle) -> Self {
        Self {
            id: v.id,
            model: v.model,
            name: v.name,
            number: v.number,
            alternate_number: v.alternate_number,
            address: v.address,
            vehicle_type: v.vehicle_type,
            vehicle_number: v.vehicle_number,
            capacity: v.capacity,
            status: v.status,
            created_at: v.created_at,
            updated_at: v.updated_at,
        }
    }
}

// Registration plates look like GJ-05-ES-9658.
fn validate_vehicle_number(value: &str) -> Result<(), ValidationError> {
    let parts: Vec<&str> = value.split('-').collect();
    let ok = parts.len() == 4
        && parts[0].len() == 2
        && parts[0].chars().all(|c| c.is_ascii_uppercase())
        && parts[1].len() == 2
        && parts[1].chars().all(|c| c.is_ascii_digit())
        && parts[2].len() == 2
        && parts[2].chars().all(|c| c.is_ascii_uppercase())
        && parts[3].len() == 4
        && parts[3].chars().all(|c| c.is_ascii_digit());

    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("vehicle_number")
            .with_message("Enter a valid vehicle number (e.g., GJ-05-ES-9658)".into()))
    }
}

fn validate_vehicle_type(value: &str) -> Result<(), ValidationError> {
    match value {
        "open" | "close" => Ok(()),
        _ => Err(ValidationError::new("vehicle_type")
            .with_message("Vehicle type must be 'open' or 'close'".into())),
    }
}

#[derive(Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 1, max = 200))]
    pub model: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 15))]
    pub number: String,
    #[validate(length(min = 1, max = 15))]
    pub alternate_number: String,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub address: String,
    #[validate(custom(function = validate_vehicle_type))]
    pub vehicle_type: String,
    #[validate(custom(function = validate_vehicle_number))]
    pub vehicle_number: String,
    #[validate(range(min = 0.1))]
    pub capacity: f64,
}

#[derive(Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(length(min = 1, max = 200))]
    pub model: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 15))]
    pub number: Option<String>,
    #[validate(length(min = 1, max = 15))]
    pub alternate_number: Option<String>,
    #[validate(length(max = 1000))]
    pub address: Option<String>,
    #[validate(custom(function = validate_vehicle_type))]
    pub vehicle_type: Option<String>,
    #[validate(custom(function = validate_vehicle_number))]
    pub vehicle_number: Option<String>,
    #[validate(range(min = 0.1))]
    pub capacity: Option<f64>,
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct CreateVehicleResponse {
    pub message: String,
    pub vehicle_id: Uuid,
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn create_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling create vehicle request");

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(user_id = %user.user_id, ?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(format!("{:?}", validation_errors)));
    }

    let vehicle = state
        .vehicles_usecase
        .create(NewVehicle {
            model: payload.model,
            name: payload.name,
            number: payload.number,
            alternate_number: payload.alternate_number,
            address: payload.address,
            vehicle_type: payload.vehicle_type,
            vehicle_number: payload.vehicle_number,
            capacity: payload.capacity,
        })
        .await?;

    tracing::debug!(vehicle_id = %vehicle.id, "vehicle created successfully");
    Ok((
        StatusCode::CREATED,
        Json(CreateVehicleResponse {
            message: "Vehicle information created successfully".to_string(),
            vehicle_id: vehicle.id,
        }),
    ))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling list vehicles request");

    let vehicles = state.vehicles_usecase.list().await?;
    let response: Vec<VehicleResponse> = vehicles.into_iter().map(VehicleResponse::from).collect();

    tracing::debug!(count = response.len(), "vehicles listed successfully");
    Ok((StatusCode::OK, Json(response)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, vehicle_id = %id))]
pub async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling get vehicle request");

    let vehicle = state.vehicles_usecase.get(id).await?;

    Ok((StatusCode::OK, Json(VehicleResponse::from(vehicle))))
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id, vehicle_id = %id))]
pub async fn update_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVehicleRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling update vehicle request");
    require_admin(&user)?;

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(user_id = %user.user_id, ?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(format!("{:?}", validation_errors)));
    }

    let vehicle = state
        .vehicles_usecase
        .update(
            id,
            VehiclePatch {
                model: payload.model,
                name: payload.name,
                number: payload.number,
                alternate_number: payload.alternate_number,
                address: payload.address,
                vehicle_type: payload.vehicle_type,
                vehicle_number: payload.vehicle_number,
                capacity: payload.capacity,
                status: payload.status,
            },
        )
        .await?;

    tracing::debug!(vehicle_id = %id, "vehicle updated successfully");
    Ok((StatusCode::OK, Json(VehicleResponse::from(vehicle))))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, vehicle_id = %id))]
pub async fn delete_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling delete vehicle request");
    require_admin(&user)?;

    state.vehicles_usecase.delete(id).await?;

    tracing::debug!(vehicle_id = %id, "vehicle deleted successfully");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_number_format() {
        assert!(validate_vehicle_number("GJ-05-ES-9658").is_ok());
        assert!(validate_vehicle_number("MH-15-BA-1234").is_ok());
        assert!(validate_vehicle_number("gj-05-es-9658").is_err());
        assert!(validate_vehicle_number("GJ-5-ES-9658").is_err());
        assert!(validate_vehicle_number("GJ-05-ES-965").is_err());
        assert!(validate_vehicle_number("GJ05ES9658").is_err());
        assert!(validate_vehicle_number("").is_err());
    }

    #[test]
    fn test_vehicle_type_choices() {
        assert!(validate_vehicle_type("open").is_ok());
        assert!(validate_vehicle_type("close").is_ok());
        assert!(validate_vehicle_type("flatbed").is_err());
        assert!(validate_vehicle_type("").is_err());
    }
}
