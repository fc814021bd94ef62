// src/handlers/price.rs
use std::sync::Arc;

use log::{info, warn};
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::models::BatchRequest;
use crate::AppContext;

pub async fn get_current_price(symbol: String, ctx: Arc<AppContext>) -> Result<Json, Rejection> {
    match ctx.resolver.fetch_current_price(&symbol).await {
        Some(quote) => Ok(warp::reply::json(&quote)),
        None => {
            warn!("no price data for {}", symbol);
            Err(warp::reject::custom(ApiError::not_found(format!(
                "no price data for {}",
                symbol
            ))))
        }
    }
}

pub async fn get_fundamentals(symbol: String, ctx: Arc<AppContext>) -> Result<Json, Rejection> {
    match ctx.resolver.fetch_fundamentals(&symbol).await {
        Some(result) => Ok(warp::reply::json(&result)),
        None => Err(warp::reject::custom(ApiError::not_found(format!(
            "no fundamentals for {}",
            symbol
        )))),
    }
}

pub async fn get_batch_prices(
    body: BatchRequest,
    ctx: Arc<AppContext>,
) -> Result<Json, Rejection> {
    info!("batch request for {} symbols", body.symbols.len());
    let results = ctx.resolver.fetch_batch_prices(&body.symbols).await;
    Ok(warp::reply::json(&results))
}
