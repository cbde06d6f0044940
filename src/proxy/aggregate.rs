//! Fan-out endpoints that resolve one upstream resource per identifier.
//!
//! Every identifier goes through the regular pipeline on its own; one
//! failure never blocks the others and results keep the order of `ids`.

use axum::http::StatusCode;
use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;

use crate::proxy::error::ProxyError;
use crate::proxy::pipeline::{Pipeline, Resolution, UpstreamFailure};
use crate::upstream::SchedulerError;

/// One entry of `/api/aggregate/summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryItem {
    pub id: u64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,
}

/// One entry of `/api/aggregate/history`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    pub id: u64,
    pub ok: bool,
    pub points: Option<Value>,
    pub raw: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,
}

/// Parse `ids=1,2,3`: positive integers, duplicates dropped, order kept.
pub fn parse_ids(raw: Option<&str>, max_ids: usize) -> Result<Vec<u64>, ProxyError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProxyError::validation("missing ids parameter"))?;

    let mut ids = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        let id = part
            .parse::<u64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| ProxyError::validation(format!("invalid id: '{}'", part)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }

    if ids.len() > max_ids {
        return Err(ProxyError::validation(format!(
            "too many ids: {} (max {})",
            ids.len(),
            max_ids
        )));
    }
    Ok(ids)
}

/// Parse `gw=<positive integer>`.
pub fn parse_gw(raw: Option<&str>) -> Result<u64, ProxyError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ProxyError::validation("missing gw parameter"))?;
    raw.parse::<u64>()
        .ok()
        .filter(|gw| *gw > 0)
        .ok_or_else(|| ProxyError::validation(format!("invalid gw: '{}'", raw)))
}

/// Status reported for a failed identifier.
fn failure_status(failure: &UpstreamFailure) -> u16 {
    match failure {
        UpstreamFailure::Scheduler(SchedulerError::QueueFull(_)) => StatusCode::SERVICE_UNAVAILABLE.as_u16(),
        other => other
            .upstream_status()
            .unwrap_or(StatusCode::BAD_GATEWAY)
            .as_u16(),
    }
}

async fn resolve_entry(pipeline: &Pipeline, path: String) -> Result<Resolution, ProxyError> {
    pipeline.resolve(&path, None).await.map(|resolved| resolved.resolution)
}

pub async fn summary(pipeline: &Pipeline, ids: &[u64]) -> Result<Vec<SummaryItem>, ProxyError> {
    let lookups = ids
        .iter()
        .map(|id| resolve_entry(pipeline, format!("entry/{}/", id)));
    let resolutions = join_all(lookups).await;

    ids.iter()
        .zip(resolutions)
        .map(|(&id, resolution)| -> Result<SummaryItem, ProxyError> {
            let resolution = resolution?;
            let stale = matches!(resolution, Resolution::Stale { .. }).then_some(true);
            let synthetic = matches!(resolution, Resolution::Default { .. }).then_some(true);
            Ok(match resolution {
                Resolution::Failed(failure) => SummaryItem {
                    id,
                    ok: false,
                    data: None,
                    status: Some(failure_status(&failure)),
                    stale: None,
                    synthetic: None,
                },
                resolved => SummaryItem {
                    id,
                    ok: true,
                    data: resolved.data().cloned(),
                    status: None,
                    stale,
                    synthetic,
                },
            })
        })
        .collect()
}

pub async fn history(pipeline: &Pipeline, ids: &[u64], gw: u64) -> Result<Vec<HistoryItem>, ProxyError> {
    let lookups = ids
        .iter()
        .map(|id| resolve_entry(pipeline, format!("entry/{}/history/", id)));
    let resolutions = join_all(lookups).await;

    ids.iter()
        .zip(resolutions)
        .map(|(&id, resolution)| -> Result<HistoryItem, ProxyError> {
            let resolution = resolution?;
            let stale = matches!(resolution, Resolution::Stale { .. }).then_some(true);
            let synthetic = matches!(resolution, Resolution::Default { .. }).then_some(true);
            Ok(match resolution {
                Resolution::Failed(failure) => HistoryItem {
                    id,
                    ok: false,
                    points: None,
                    raw: None,
                    status: Some(failure_status(&failure)),
                    stale: None,
                    synthetic: None,
                },
                resolved => {
                    let row = resolved.data().and_then(|data| gameweek_row(data, gw)).cloned();
                    HistoryItem {
                        id,
                        ok: true,
                        points: row.as_ref().and_then(|r| r.get("points")).cloned(),
                        raw: row,
                        status: None,
                        stale,
                        synthetic,
                    }
                }
            })
        })
        .collect()
}

/// The `current` row whose `event` equals `gw`.
fn gameweek_row(history: &Value, gw: u64) -> Option<&Value> {
    history
        .get("current")?
        .as_array()?
        .iter()
        .find(|row| row.get("event").and_then(Value::as_u64) == Some(gw))
}
