//! HTTP resource API for flags.
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | GET | `/flags` | 200, every flag |
//! | GET | `/flags/{name}` | 200, one flag |
//! | POST | `/flags` | 201 |
//! | PATCH | `/flags/{name}` | 204 |
//!
//! Storage calls block, so each handler runs them on tokio's blocking pool.

mod error;

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::flag::{Activity, Flag, FlagType, FlagValue};
use crate::storage::{FlagStore, NewFlag};

pub use error::{ApiError, ErrorResponse};

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The flag store all requests act on.
    pub store: Arc<dyn FlagStore>,
}

impl AppState {
    /// Wrap a store for the router.
    #[must_use]
    pub fn new(store: Arc<dyn FlagStore>) -> Self {
        Self { store }
    }
}

/// JSON representation of a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagView {
    /// Unique flag name.
    pub name: String,
    /// Current value; `null` if never set.
    pub value: FlagValue,
    /// Activity before this request read the value.
    pub active: Activity,
    /// Human-readable label.
    pub label: String,
    /// Longer description.
    pub description: String,
    /// Free-form tags.
    pub tags: String,
}

impl FlagView {
    /// Snapshot a flag.
    ///
    /// Activity is classified before the value is read, so the read made
    /// here does not mask a flag that was new or inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if any storage read fails.
    pub fn from_flag(flag: &Flag<'_>) -> crate::Result<Self> {
        let active = flag.active()?;
        let info = flag.info()?;
        let value = flag.value()?;
        Ok(Self {
            name: info.name,
            value,
            active,
            label: info.label,
            description: info.description,
            tags: info.tags,
        })
    }
}

/// Body of `POST /flags`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateFlagRequest {
    /// Required flag name.
    pub name: Option<String>,
    /// Optional label.
    pub label: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Optional tags.
    pub tags: Option<String>,
}

/// Build the flags router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/flags", get(list_flags).post(create_flag))
        .route("/flags/{name}", get(get_flag).patch(patch_flag))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the flags API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(config: &Config, store: Arc<dyn FlagStore>) -> crate::Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Serving flags API");

    axum::serve(listener, router(AppState::new(store)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

/// Run a storage operation on the blocking pool.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn FlagStore) -> crate::Result<T> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "Storage task panicked");
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::invalid(rejection.body_text()))
}

#[tracing::instrument(skip(state))]
async fn list_flags(State(state): State<AppState>) -> Result<Json<Vec<FlagView>>, ApiError> {
    let flags = blocking(&state, |store| {
        Flag::all(store, FlagType::Binary)?
            .iter()
            .map(FlagView::from_flag)
            .collect::<crate::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(flags))
}

#[tracing::instrument(skip(state))]
async fn get_flag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FlagView>, ApiError> {
    let view = blocking(&state, move |store| {
        FlagView::from_flag(&Flag::binary(store, name)?)
    })
    .await?;

    Ok(Json(view))
}

#[tracing::instrument(skip(state, body))]
async fn create_flag(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let request: CreateFlagRequest = serde_json::from_value(json_body(body)?)
        .map_err(|err| ApiError::invalid(format!("invalid flag: {err}")))?;

    let name = request
        .name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::invalid("name is required"))?;
    let extra = NewFlag {
        label: request.label,
        description: request.description,
        tags: request.tags,
        ..NewFlag::default()
    };

    blocking(&state, move |store| {
        Flag::create_binary(store, name, extra).map(|_| ())
    })
    .await?;

    Ok(StatusCode::CREATED)
}

#[tracing::instrument(skip(state, body))]
async fn patch_flag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let body = json_body(body)?;
    let fields = body
        .as_object()
        .filter(|fields| fields.len() == 1)
        .ok_or_else(|| ApiError::invalid("body must contain exactly the key 'value'"))?;
    let value = fields
        .get("value")
        .ok_or_else(|| ApiError::invalid("body must contain exactly the key 'value'"))?
        .as_bool()
        .ok_or_else(|| ApiError::invalid("'value' must be a boolean"))?;

    blocking(&state, move |store| Flag::binary(store, name)?.set_value(value)).await?;

    Ok(StatusCode::NO_CONTENT)
}
