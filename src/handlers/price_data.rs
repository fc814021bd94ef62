// src/handlers/price_data.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use warp::reply::Json;
use warp::Rejection;

use super::error::{reject_for, ApiError};
use crate::AppContext;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, Rejection> {
    let date = raw
        .parse::<NaiveDate>()
        .map_err(|_| warp::reject::custom(ApiError::bad_request(format!("invalid date: {}", raw))))?;
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| warp::reject::custom(ApiError::bad_request("invalid date")))?;
    Ok(naive.and_utc())
}

pub async fn refresh_stock(
    user_id: i64,
    holding_id: i64,
    ctx: Arc<AppContext>,
) -> Result<Json, Rejection> {
    let snapshot = ctx
        .snapshots
        .record_snapshot(user_id, holding_id)
        .await
        .map_err(reject_for)?;
    Ok(warp::reply::json(&snapshot))
}

pub async fn get_latest(
    user_id: i64,
    holding_id: i64,
    ctx: Arc<AppContext>,
) -> Result<Json, Rejection> {
    let latest = ctx
        .snapshots
        .latest(user_id, holding_id)
        .await
        .map_err(reject_for)?;
    Ok(warp::reply::json(&latest))
}

pub async fn get_history(
    user_id: i64,
    holding_id: i64,
    query: HistoryQuery,
    ctx: Arc<AppContext>,
) -> Result<Json, Rejection> {
    // Default window: the last 30 days.
    let start = match &query.start_date {
        Some(raw) => parse_date(raw)?,
        None => Utc::now() - Duration::days(30),
    };
    let end = match &query.end_date {
        Some(raw) => parse_date(raw)?,
        None => Utc::now(),
    };

    info!("history request for holding {}: {} to {}", holding_id, start, end);

    let response = ctx
        .snapshots
        .history(user_id, holding_id, start, end)
        .await
        .map_err(reject_for)?;
    Ok(warp::reply::json(&response))
}

pub async fn refresh_all(user_id: i64, ctx: Arc<AppContext>) -> Result<Json, Rejection> {
    let summary = ctx.refresh.bulk_refresh(user_id).await.map_err(reject_for)?;
    Ok(warp::reply::json(&summary))
}
