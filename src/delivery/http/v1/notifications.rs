use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::delivery::http::v1::middleware::{require_admin, AuthenticatedUser};
use crate::delivery::http::v1::vehicles::VehicleResponse;
use crate::domain::notification::{Disposition, NewNotification, Notification};
use crate::domain::vehicle::Vehicle;
use crate::usecase::contracts::{NotificationFilter, VehicleFeedQuery};
use crate::usecase::error::UsecaseError;
use crate::usecase::notifications::{ClaimError, LockedPatch};
use crate::usecase::push_tasks::PushTask;
use crate::AppState;

#[derive(Serialize)]
pub struct NotificationResponse {
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
    pub reserved_by: Option<Uuid>,
    pub is_reserved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehicleResponse>,
}

fn notification_to_response(
    notification: Notification,
    vehicle: Option<Vehicle>,
) -> NotificationResponse {
    let is_reserved = notification.is_reserved_at(Utc::now());
    NotificationResponse {
        id: notification.id,
        vehicle_id: notification.vehicle_id,
        created_by: notification.created_by,
        source: notification.source,
        destination: notification.destination,
        rate: notification.rate,
        weight: notification.weight,
        date: notification.date,
        message: notification.message,
        contact: notification.contact,
        is_read: notification.is_read,
        is_accepted: notification.is_accepted,
        reserved_by: notification.reserved_by,
        is_reserved,
        created_at: notification.created_at,
        updated_at: notification.updated_at,
        vehicle: vehicle.map(VehicleResponse::from),
    }
}

/// Payload returned when a claim loses its route: who already serves it.
#[derive(Serialize)]
pub struct ClaimConflictResponse {
    pub vehicle_id: Option<Uuid>,
    pub is_accepted: bool,
    pub msg: String,
}

fn claim_error_response(e: ClaimError) -> Response {
    match e {
        ClaimError::NotFound => {
            (StatusCode::NOT_FOUND, "Notification not found".to_string()).into_response()
        }
        ClaimError::Reserved => {
            metrics::counter!("notification_claims_total", "outcome" => "reserved").increment(1);
            (
                StatusCode::CONFLICT,
                "Notification is held by another driver".to_string(),
            )
                .into_response()
        }
        ClaimError::RouteTaken(conflict) => {
            metrics::counter!("notification_claims_total", "outcome" => "conflict").increment(1);
            (
                StatusCode::CONFLICT,
                Json(ClaimConflictResponse {
                    vehicle_id: conflict.vehicle_id,
                    is_accepted: conflict.is_accepted,
                    msg: "This route is already served by another vehicle".to_string(),
                }),
            )
                .into_response()
        }
        ClaimError::Repository(e) => UsecaseError::from(e).into_response(),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    pub vehicle_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub source: String,
    #[validate(length(min = 1, max = 200))]
    pub destination: String,
    #[validate(range(min = 0.01))]
    pub rate: f64,
    #[validate(range(min = 0.01))]
    pub weight: f64,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub message: String,
    #[serde(default)]
    #[validate(length(max = 15))]
    pub contact: String,
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct OfferPayload {
    #[validate(length(min = 1, max = 200))]
    pub source: String,
    #[validate(length(min = 1, max = 200))]
    pub destination: String,
    #[validate(range(min = 0.01))]
    pub rate: f64,
    #[validate(range(min = 0.01))]
    pub weight: f64,
    pub date: Option<NaiveDate>,
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub message: String,
    #[serde(default)]
    #[validate(length(max = 15))]
    pub contact: String,
}

impl OfferPayload {
    fn into_offer(self) -> NewNotification {
        NewNotification {
            source: self.source,
            destination: self.destination,
            rate: self.rate,
            weight: self.weight,
            date: self.date,
            message: self.message,
            contact: self.contact,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkCreateRequest {
    #[validate(length(min = 1))]
    pub vehicle_ids: Vec<Uuid>,
    #[validate(length(min = 1), nested)]
    pub notifications: Vec<OfferPayload>,
}

#[derive(Serialize)]
pub struct CreatedNotificationRef {
    pub id: Uuid,
    pub vehicle_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct BulkCreateResponse {
    pub created_count: usize,
    pub created_notifications: Vec<CreatedNotificationRef>,
    pub error_count: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub is_read: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateNotificationRequest {
    #[validate(length(min = 1, max = 200))]
    pub source: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub destination: Option<String>,
    #[validate(range(min = 0.01))]
    pub rate: Option<f64>,
    #[validate(range(min = 0.01))]
    pub weight: Option<f64>,
    pub date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub message: Option<String>,
    #[validate(length(max = 15))]
    pub contact: Option<String>,
    pub is_read: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListNotificationsParams {
    pub is_read: Option<bool>,
    pub is_accepted: Option<bool>,
    pub created_by: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct VehicleFeedParams {
    pub is_read: Option<bool>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct VehicleFeedResponse {
    pub vehicle_number: String,
    pub count: usize,
    pub notifications: Vec<NotificationResponse>,
}

#[derive(Serialize)]
pub struct ReserveResponse {
    pub reserved: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1))]
    pub notification_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: u64,
}

async fn publish_push_task(nats_client: &Option<async_nats::Client>, notification: &Notification) {
    if let Some(client) = nats_client {
        if let Some(task) = PushTask::from_notification(notification) {
            match serde_json::to_vec(&task) {
                Ok(payload) => {
                    let jetstream = async_nats::jetstream::new(client.clone());
                    match jetstream.publish("notifications.push", payload.into()).await {
                        Ok(ack_future) => match ack_future.await {
                            Ok(_) => {
                                tracing::info!(
                                    notification_id = %task.notification_id,
                                    vehicle_id = %task.vehicle_id,
                                    "published push task to NATS"
                                );
                            }
                            Err(e) => {
                                tracing::error!(
                                    notification_id = %task.notification_id,
                                    error = %e,
                                    "failed to get NATS publish ack"
                                );
                            }
                        },
                        Err(e) => {
                            tracing::error!(
                                notification_id = %task.notification_id,
                                error = %e,
                                "failed to publish push task to NATS"
                            );
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize push task");
                }
            }
        }
    }
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn create_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<CreateNotificationRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling create notification request");

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(user_id = %user.user_id, ?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(format!("{:?}", validation_errors)));
    }

    let vehicle_id = payload.vehicle_id;
    let offer = NewNotification {
        source: payload.source,
        destination: payload.destination,
        rate: payload.rate,
        weight: payload.weight,
        date: payload.date,
        message: payload.message,
        contact: payload.contact,
    };

    let notification = state
        .notifications_usecase
        .create(vehicle_id, user.user_id, offer)
        .await?;

    tracing::debug!(notification_id = %notification.id, "notification created successfully");
    publish_push_task(&state.nats_client, &notification).await;
    Ok((
        StatusCode::CREATED,
        Json(notification_to_response(notification, None)),
    ))
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn create_notifications_bulk(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<BulkCreateRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling bulk create notifications request");

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(user_id = %user.user_id, ?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(format!("{:?}", validation_errors)));
    }

    let offers: Vec<NewNotification> = payload
        .notifications
        .into_iter()
        .map(OfferPayload::into_offer)
        .collect();

    let outcome = state
        .notifications_usecase
        .create_bulk(payload.vehicle_ids, user.user_id, offers)
        .await?;

    for notification in &outcome.created {
        publish_push_task(&state.nats_client, notification).await;
    }

    let status = if outcome.created.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::CREATED
    };
    let response = BulkCreateResponse {
        created_count: outcome.created.len(),
        created_notifications: outcome
            .created
            .iter()
            .map(|n| CreatedNotificationRef {
                id: n.id,
                vehicle_id: n.vehicle_id,
            })
            .collect(),
        error_count: outcome.errors.len(),
        errors: outcome.errors,
    };

    tracing::debug!(created = response.created_count, "bulk create handled");
    Ok((status, Json(response)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<ListNotificationsParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!(?params, "handling list notifications request");

    // The two flags select a disposition only when both are present.
    let disposition = match (params.is_read, params.is_accepted) {
        (Some(true), Some(true)) => Some(Disposition::Locked),
        (Some(false), Some(true)) => Some(Disposition::Rejected),
        (Some(false), Some(false)) => Some(Disposition::Unclaimed),
        _ => None,
    };

    let notifications = state
        .notifications_usecase
        .list(NotificationFilter {
            disposition,
            created_by: params.created_by,
            date: params.date,
        })
        .await?;

    let response: Vec<NotificationResponse> = notifications
        .into_iter()
        .map(|n| notification_to_response(n, None))
        .collect();

    tracing::debug!(count = response.len(), "notifications listed successfully");
    Ok((StatusCode::OK, Json(response)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_claimable_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling claim board request");

    let entries = state.notifications_usecase.list_claimable(user.user_id).await?;
    let response: Vec<NotificationResponse> = entries
        .into_iter()
        .map(|e| notification_to_response(e.notification, e.vehicle))
        .collect();

    tracing::debug!(count = response.len(), "claim board listed successfully");
    Ok((StatusCode::OK, Json(response)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_read_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling list read notifications request");

    let notifications = state.notifications_usecase.list_read().await?;
    let response: Vec<NotificationResponse> = notifications
        .into_iter()
        .map(|n| notification_to_response(n, None))
        .collect();

    Ok((StatusCode::OK, Json(response)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, notification_id = %id))]
pub async fn get_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling get notification request");

    let notification = state.notifications_usecase.get(id).await?;

    Ok((StatusCode::OK, Json(notification_to_response(notification, None))))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, vehicle_id = %id))]
pub async fn vehicle_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Query(params): Query<VehicleFeedParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!(?params, "handling vehicle notifications request");

    let query = VehicleFeedQuery {
        is_read: params.is_read,
        ascending: params.sort.as_deref() == Some("asc"),
        limit: params.limit,
    };
    let (vehicle, notifications) = state
        .notifications_usecase
        .feed_for_vehicle(id, query)
        .await?;

    let response = VehicleFeedResponse {
        vehicle_number: vehicle.vehicle_number.clone(),
        count: notifications.len(),
        notifications: notifications
            .into_iter()
            .map(|n| notification_to_response(n, None))
            .collect(),
    };

    tracing::debug!(count = response.count, "vehicle notifications listed");
    Ok((StatusCode::OK, Json(response)))
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id, notification_id = %id))]
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkReadRequest>,
) -> Response {
    tracing::debug!(is_read = payload.is_read, "handling mark read request");

    if payload.is_read {
        match state.notifications_usecase.claim(id, user.user_id).await {
            Ok(claimed) => {
                metrics::counter!("notification_claims_total", "outcome" => "won").increment(1);
                tracing::debug!(notification_id = %id, "claim handled successfully");
                (
                    StatusCode::OK,
                    Json(notification_to_response(claimed.notification, claimed.vehicle)),
                )
                    .into_response()
            }
            Err(e) => claim_error_response(e),
        }
    } else {
        // An explicit is_read=false releases the caller's hold.
        match state.notifications_usecase.release(id).await {
            Ok(released) => {
                tracing::debug!(notification_id = %id, released, "reservation release handled");
                match state.notifications_usecase.get(id).await {
                    Ok(notification) => {
                        (StatusCode::OK, Json(notification_to_response(notification, None)))
                            .into_response()
                    }
                    Err(e) => e.into_response(),
                }
            }
            Err(e) => claim_error_response(e),
        }
    }
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, notification_id = %id))]
pub async fn reserve_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Response {
    tracing::debug!("handling reserve request");

    match state.notifications_usecase.reserve(id, user.user_id).await {
        Ok(true) => {
            metrics::counter!("notification_reservations_total", "outcome" => "held").increment(1);
            (StatusCode::OK, Json(ReserveResponse { reserved: true })).into_response()
        }
        Ok(false) => {
            metrics::counter!("notification_reservations_total", "outcome" => "refused")
                .increment(1);
            (
                StatusCode::CONFLICT,
                "Notification is held by another driver".to_string(),
            )
                .into_response()
        }
        Err(e) => claim_error_response(e),
    }
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id, notification_id = %id))]
pub async fn update_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNotificationRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling update notification request");
    require_admin(&user)?;

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(user_id = %user.user_id, ?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(format!("{:?}", validation_errors)));
    }

    let notification = state
        .notifications_usecase
        .update_locked(
            id,
            LockedPatch {
                source: payload.source,
                destination: payload.destination,
                rate: payload.rate,
                weight: payload.weight,
                date: payload.date,
                message: payload.message,
                contact: payload.contact,
                is_read: payload.is_read,
            },
        )
        .await?;

    tracing::debug!(notification_id = %id, "notification updated successfully");
    Ok((StatusCode::OK, Json(notification_to_response(notification, None))))
}

#[tracing::instrument(skip(state, payload), fields(user_id = %user.user_id))]
pub async fn bulk_delete_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(payload): Json<BulkDeleteRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    tracing::debug!("handling bulk delete request");
    require_admin(&user)?;

    if let Err(validation_errors) = payload.validate() {
        tracing::warn!(user_id = %user.user_id, ?validation_errors, "validation failed");
        return Err(UsecaseError::Validation(format!("{:?}", validation_errors)));
    }

    let deleted = state
        .notifications_usecase
        .delete_many(&payload.notification_ids)
        .await?;

    tracing::debug!(deleted, "bulk delete handled successfully");
    Ok((StatusCode::OK, Json(BulkDeleteResponse { deleted })))
}
