mod config;
mod delivery;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::delivery::http::v1::middleware::auth_middleware;
use crate::delivery::http::v1::notifications::{
    bulk_delete_notifications, create_notification, create_notifications_bulk, get_notification,
    list_claimable_notifications, list_notifications, list_read_notifications,
    mark_notification_read, reserve_notification, update_notification, vehicle_notifications,
};
use crate::delivery::http::v1::vehicles::{
    create_vehicle, delete_vehicle, get_vehicle, list_vehicles, update_vehicle,
};
use crate::repository::postgres::{
    create_pool, PostgresNotificationRepository, PostgresVehicleRepository,
};
use crate::usecase::jwt::JwtService;
use crate::usecase::notifications::NotificationsUseCase;
use crate::usecase::vehicles::VehiclesUseCase;

pub struct AppState {
    pub vehicles_usecase:
        VehiclesUseCase<PostgresVehicleRepository, PostgresNotificationRepository>,
    pub notifications_usecase:
        NotificationsUseCase<PostgresNotificationRepository, PostgresVehicleRepository>,
    pub jwt_service: JwtService,
    pub metrics_handle: PrometheusHandle,
    pub nats_client: Option<async_nats::Client>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize tracing subscriber with optional OpenTelemetry layer
    if config.telemetry_enabled {
        let telemetry_config = telemetry::TelemetryConfig {
            service_name: config.telemetry_service_name.clone(),
            service_version: config.telemetry_service_version.clone(),
            environment: config.telemetry_environment.clone(),
            otlp_endpoint: config.telemetry_otlp_endpoint.clone(),
        };

        telemetry::init_telemetry_with_subscriber(&telemetry_config, env_filter)
            .expect("failed to initialize telemetry");
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
    }

    tracing::info!("starting the dispatch service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("failed to create database pool");
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let jwt_service = JwtService::new(config.jwt_secret);
    let vehicles_usecase = VehiclesUseCase::new(
        PostgresVehicleRepository::new(pool.clone()),
        PostgresNotificationRepository::new(pool.clone()),
    );
    let notifications_usecase = NotificationsUseCase::new(
        PostgresNotificationRepository::new(pool.clone()),
        PostgresVehicleRepository::new(pool),
    );

    // Connect to NATS and setup JetStream for push-delivery hand-off
    let nats_client = match async_nats::connect(&config.nats_url).await {
        Ok(client) => {
            tracing::info!(nats_url = %config.nats_url, "connected to NATS");

            let jetstream = async_nats::jetstream::new(client.clone());
            match jetstream
                .get_or_create_stream(async_nats::jetstream::stream::Config {
                    name: "NOTIFICATIONS".to_string(),
                    subjects: vec!["notifications.push".to_string()],
                    retention: async_nats::jetstream::stream::RetentionPolicy::WorkQueue,
                    ..Default::default()
                })
                .await
            {
                Ok(_) => tracing::info!("NATS JetStream stream 'NOTIFICATIONS' ready"),
                Err(e) => tracing::error!(error = %e, "failed to create NATS JetStream stream"),
            }

            Some(client)
        }
        Err(e) => {
            tracing::warn!(error = %e, nats_url = %config.nats_url, "failed to connect to NATS, push delivery will be unavailable");
            None
        }
    };

    let shared_state = Arc::new(AppState {
        vehicles_usecase,
        notifications_usecase,
        jwt_service,
        metrics_handle,
        nats_client,
    });

    // All routes require authentication
    let api = Router::new()
        .route("/api/v1/vehicles", get(list_vehicles).post(create_vehicle))
        .route(
            "/api/v1/vehicles/{id}",
            get(get_vehicle).put(update_vehicle).delete(delete_vehicle),
        )
        .route("/api/v1/vehicles/{id}/notifications", get(vehicle_notifications))
        .route(
            "/api/v1/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/api/v1/notifications/bulk", post(create_notifications_bulk))
        .route("/api/v1/notifications/bulk-delete", post(bulk_delete_notifications))
        .route("/api/v1/notifications/claimable", get(list_claimable_notifications))
        .route("/api/v1/notifications/read", get(list_read_notifications))
        .route(
            "/api/v1/notifications/{id}",
            get(get_notification).put(update_notification),
        )
        .route("/api/v1/notifications/{id}/read", post(mark_notification_read))
        .route("/api/v1/notifications/{id}/reserve", post(reserve_notification))
        .layer(middleware::from_fn_with_state(
            shared_state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("dispatch service running on 0.0.0.0:8080");
    axum::serve(listener, router).await?;

    // Shutdown telemetry on exit
    if config.telemetry_enabled {
        telemetry::shutdown_telemetry();
    }

    Ok(())
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
