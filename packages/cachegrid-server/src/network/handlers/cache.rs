//! HTTP handlers for the cache operation surface.
//!
//! Every handler extracts `Distributor` from `AppState` and translates the
//! HTTP request into one call on it. Errors are mapped to status codes by
//! [`ApiError`]: `BadRequest` -> 400, `NotFound` -> 404, `Server` -> 500.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cachegrid_core::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::AppState;

/// Wraps [`CacheError`] so it can be returned directly from an axum handler.
pub struct ApiError(CacheError);

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CacheError::BadRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound => StatusCode::NOT_FOUND,
            CacheError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
pub struct KeyQuery {
    key: String,
}

#[derive(Deserialize)]
pub struct SetRequest {
    key: String,
    value: String,
    #[serde(default)]
    ttl: i64,
}

#[derive(Deserialize)]
pub struct ExpireRequest {
    key: String,
    ttl: i64,
}

#[derive(Deserialize)]
pub struct GetSetRequest {
    key: String,
    value: String,
}

#[derive(Deserialize)]
pub struct MgetRequest {
    keys: Vec<String>,
}

#[derive(Deserialize)]
pub struct MsetRequest {
    kv: HashMap<String, String>,
    #[serde(default)]
    ttl: i64,
}

#[derive(Serialize)]
struct ValueResponse {
    value: String,
}

/// A fixed success envelope for operations with no natural payload.
fn success() -> Json<serde_json::Value> {
    Json(json!({ "status": "success" }))
}

pub async fn ping_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "pong" }))
}

pub async fn get_handler(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let value = state.distributor.get_item(&q.key).await?;
    Ok(Json(match value {
        Some(bytes) => json!({ "value": String::from_utf8_lossy(&bytes) }),
        None => json!({ "value": null }),
    }))
}

pub async fn exists_handler(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let value = state.distributor.get_item(&q.key).await?;
    Ok(Json(json!({ "exists": value.is_some() })))
}

pub async fn keys_handler(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let keys = state.distributor.list_keys().await?;
    Ok(Json(json!({ "keys": keys })))
}

pub async fn ttl_handler(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let (ttl, persistent) = state.distributor.get_ttl(&q.key).await?;
    let ttl = if persistent { -1 } else { ttl };
    Ok(Json(json!({ "ttl": ttl })))
}

pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .distributor
        .set_item(&req.key, req.value.into_bytes(), req.ttl)
        .await?;
    Ok(success())
}

pub async fn del_handler(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state.distributor.delete_item(&q.key).await?;
    Ok(success())
}

pub async fn flush_handler(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.distributor.clear_cache().await?;
    Ok(success())
}

pub async fn expire_handler(
    State(state): State<AppState>,
    Json(req): Json<ExpireRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state.distributor.update_expiration(&req.key, req.ttl).await?;
    Ok(success())
}

pub async fn persist_handler(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    state.distributor.remove_expiration(&q.key).await?;
    Ok(success())
}

pub async fn incr_handler(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let value = state.distributor.increment(&q.key).await?;
    Ok(Json(json!({ "value": value })))
}

pub async fn decr_handler(
    State(state): State<AppState>,
    Query(q): Query<KeyQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let value = state.distributor.decrement(&q.key).await?;
    Ok(Json(json!({ "value": value })))
}

pub async fn setnx_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let success = state
        .distributor
        .set_if_not_exists(&req.key, req.value.into_bytes(), req.ttl)
        .await?;
    Ok(Json(json!({ "success": success })))
}

pub async fn getset_handler(
    State(state): State<AppState>,
    Json(req): Json<GetSetRequest>,
) -> ApiResult<Json<ValueResponse>> {
    let previous = state
        .distributor
        .get_and_set(&req.key, req.value.into_bytes())
        .await?;
    Ok(Json(ValueResponse {
        value: String::from_utf8_lossy(&previous).into_owned(),
    }))
}

pub async fn mget_handler(
    State(state): State<AppState>,
    Json(req): Json<MgetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let values = state.distributor.get_multiple(&req.keys).await?;
    let kv: HashMap<String, String> = values
        .into_iter()
        .map(|(k, v)| (k, String::from_utf8_lossy(&v).into_owned()))
        .collect();
    Ok(Json(json!({ "kv": kv })))
}

pub async fn mset_handler(
    State(state): State<AppState>,
    Json(req): Json<MsetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let entries: HashMap<String, Vec<u8>> = req
        .kv
        .into_iter()
        .map(|(k, v)| (k, v.into_bytes()))
        .collect();
    state.distributor.set_multiple(&entries, req.ttl).await?;
    Ok(Json(json!({ "success": true })))
}
