// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Shopfront API
//!
//! HTTP API server for the Shopfront storefront: accounts, catalog, cart,
//! addresses and orders, all kept in one JSON document store.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use shopfront_store::{
    BackendStats, InMemoryBackend, JsonFileBackend, MetricsBackend, StorageBackend, Store,
    StoreConfig,
};

pub mod addresses;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod display;
pub mod fields;
pub mod orders;
pub mod seed;
pub mod session;
pub mod user;

use session::SessionStore;

/// API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        errors: BTreeMap<String, String>,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message, errors) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Validation { message, errors } => {
                (StatusCode::BAD_REQUEST, message, Some(errors))
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: message,
            code: status.as_u16(),
            errors,
        });

        (status, body).into_response()
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
    /// Per-field validation messages, keyed by request field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, String>>,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Path of the JSON document the store persists to
    pub data_file: PathBuf,
    /// Idle window before reserved ids are written, in milliseconds
    pub debounce_ms: u64,
    /// Insert sample users, categories, a shop and products into an empty store
    pub seed_sample_data: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
            data_file: PathBuf::from("database/data/database.json"),
            debounce_ms: 100,
            seed_sample_data: true,
        }
    }
}

impl ApiConfig {
    /// Defaults overlaid with `SHOPFRONT_*` environment variables and
    /// `SKIP_INIT=true`. Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ApiConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("SHOPFRONT_HOST") {
            config.host = host;
        }
        if let Some(raw) = lookup("SHOPFRONT_PORT") {
            match raw.trim().parse() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %raw, "Ignoring invalid SHOPFRONT_PORT"),
            }
        }
        if let Some(path) = lookup("SHOPFRONT_DATA_FILE") {
            config.data_file = PathBuf::from(path);
        }
        if let Some(raw) = lookup("SHOPFRONT_DEBOUNCE_MS") {
            match raw.trim().parse() {
                Ok(ms) => config.debounce_ms = ms,
                Err(_) => warn!(value = %raw, "Ignoring invalid SHOPFRONT_DEBOUNCE_MS"),
            }
        }
        if lookup("SKIP_INIT").as_deref() == Some("true") {
            config.seed_sample_data = false;
        }

        config
    }

    /// Store settings derived from this configuration.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }
}

/// The store type shared by all handlers.
pub type AppStore = Store<MetricsBackend<Box<dyn StorageBackend>>>;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub backend: String,
    pub stats: BackendStats,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub start_time: Instant,
    pub store: AppStore,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(backend: Box<dyn StorageBackend>, store_config: StoreConfig) -> Self {
        Self {
            start_time: Instant::now(),
            store: Store::with_config(MetricsBackend::new(backend), store_config),
            sessions: SessionStore::new(),
        }
    }

    /// State over a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Box::new(InMemoryBackend::new()), StoreConfig::default())
    }
}

/// Build the API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        // Accounts
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/check-username", post(auth::check_username_handler))
        .route("/auth/check-email", post(auth::check_email_handler))
        // Catalog
        .route("/api/categories", get(catalog::list_categories_handler))
        .route("/api/products", get(catalog::list_products_handler))
        .route("/api/products/batch", get(catalog::batch_products_handler))
        .route("/api/products/{id}", get(catalog::get_product_handler))
        .route("/api/shops", get(catalog::list_shops_handler))
        .route("/api/shops/{id}", get(catalog::get_shop_handler))
        // Cart
        .route("/api/cart", get(cart::list_cart_handler))
        .route("/api/cart/status", get(cart::cart_status_handler))
        .route("/api/cart/add", post(cart::add_to_cart_handler))
        .route("/api/cart/count", get(cart::cart_count_handler))
        .route("/api/cart/update/{item_id}", put(cart::update_cart_item_handler))
        .route(
            "/api/cart/remove/{item_id}",
            axum::routing::delete(cart::remove_cart_item_handler),
        )
        // Addresses
        .route(
            "/api/addresses",
            get(addresses::list_addresses_handler).post(addresses::create_address_handler),
        )
        .route(
            "/api/addresses/{id}",
            put(addresses::update_address_handler).delete(addresses::delete_address_handler),
        )
        .route(
            "/api/addresses/{id}/default",
            put(addresses::set_default_address_handler),
        )
        // Orders
        .route("/api/orders", get(orders::list_orders_handler))
        .route("/api/orders/create", post(orders::create_order_handler))
        .route("/api/orders/{id}", get(orders::get_order_handler))
        // Account area
        .route("/api/user/home", get(user::home_handler))
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60))
}

/// Health check handler
#[instrument(skip(state))]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = state.store.backend();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        backend: backend.name().to_string(),
        stats: backend.stats().await,
    })
}

/// Readiness check handler: the document must be readable.
#[instrument(skip(state))]
async fn ready_handler(State(state): State<AppState>) -> StatusCode {
    match state.store.backend().read().await {
        Ok(_) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "Store is not readable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Start the API server
pub async fn serve(config: ApiConfig) -> Result<(), std::io::Error> {
    let backend: Box<dyn StorageBackend> = Box::new(JsonFileBackend::new(&config.data_file));
    let state = AppState::new(backend, config.store_config());

    if !state.store.initialize().await {
        warn!(path = %config.data_file.display(), "Could not write the initial document");
    }
    if config.seed_sample_data {
        seed::seed_sample_data(&state.store).await;
    }

    let mut app = build_router(state.clone()).layer(TraceLayer::new_for_http());
    if config.enable_cors {
        app = app.layer(cors_layer());
    }

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting Shopfront API server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if !state.store.flush_pending().await {
        error!("Reserved ids could not be written during shutdown");
    }
    info!("Shopfront API server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = AppState::in_memory();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "in-memory");
    }

    #[tokio::test]
    async fn test_ready_endpoint() {
        let state = AppState::in_memory();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ApiError::NotFound("product 9".into()).to_string(),
            "Not found: product 9"
        );
        assert_eq!(
            ApiError::Unauthorized("please log in".into()).to_string(),
            "Unauthorized: please log in"
        );
    }

    #[tokio::test]
    async fn test_validation_error_body() {
        let mut errors = BTreeMap::new();
        errors.insert("email".to_string(), "Email is required".to_string());
        let response = ApiError::Validation {
            message: "Please fix the highlighted fields".into(),
            errors,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 400);
        assert_eq!(body["errors"]["email"], "Email is required");
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("SHOPFRONT_PORT", "8081"),
            ("SHOPFRONT_DATA_FILE", "/tmp/shop.json"),
            ("SHOPFRONT_DEBOUNCE_MS", "soon"),
            ("SKIP_INIT", "true"),
        ]
        .into_iter()
        .collect();
        let config = ApiConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 8081);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.data_file, PathBuf::from("/tmp/shop.json"));
        assert_eq!(config.debounce_ms, 100);
        assert!(!config.seed_sample_data);
        assert_eq!(config.store_config().debounce, Duration::from_millis(100));
    }
}
