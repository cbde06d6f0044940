//! Request handlers.
//!
//! Handlers only extract input and render output; every caching and
//! upstream decision is made by the pipeline.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::Method,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::AggregateConfig;
use crate::http::error::ApiError;
use crate::http::response::{client_status, render};
use crate::proxy::aggregate;
use crate::proxy::{ensure_read_only, Pipeline, ProxyError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub aggregate: AggregateConfig,
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub async fn readyz() -> Json<Value> {
    Json(json!({ "ready": true }))
}

/// `/api/<path>`: the cached, scheduled upstream proxy.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    ensure_read_only(&method)?;

    let resolved = state.pipeline.resolve(&path, query.as_deref()).await?;
    tracing::debug!(
        url = %resolved.url,
        kind = %resolved.kind,
        status = client_status(&resolved).as_u16(),
        "Proxied request resolved"
    );
    Ok(render(resolved, state.pipeline.policy()))
}

/// `/api` and `/api/` with nothing to forward.
pub async fn proxy_root(method: Method) -> Result<Response, ApiError> {
    ensure_read_only(&method)?;
    Err(ProxyError::validation("missing upstream path").into())
}

#[derive(Debug, Default, Deserialize)]
pub struct AggregateParams {
    ids: Option<String>,
    gw: Option<String>,
}

pub async fn aggregate_summary(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<AggregateParams>,
) -> Result<Json<Value>, ApiError> {
    ensure_read_only(&method)?;
    let ids = aggregate::parse_ids(params.ids.as_deref(), state.aggregate.max_ids)?;

    let results = aggregate::summary(&state.pipeline, &ids).await?;
    tracing::debug!(ids = ids.len(), ok = results.iter().filter(|r| r.ok).count(), "Aggregate summary");
    Ok(Json(json!({ "results": results })))
}

pub async fn aggregate_history(
    State(state): State<AppState>,
    method: Method,
    Query(params): Query<AggregateParams>,
) -> Result<Json<Value>, ApiError> {
    ensure_read_only(&method)?;
    let ids = aggregate::parse_ids(params.ids.as_deref(), state.aggregate.max_ids)?;
    let gw = aggregate::parse_gw(params.gw.as_deref())?;

    let results = aggregate::history(&state.pipeline, &ids, gw).await?;
    tracing::debug!(ids = ids.len(), gw, ok = results.iter().filter(|r| r.ok).count(), "Aggregate history");
    Ok(Json(json!({ "results": results, "gw": gw })))
}

pub async fn not_found() -> Response {
    ApiError::not_found().into_response()
}
