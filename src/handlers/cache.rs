// src/handlers/cache.rs
use std::sync::Arc;

use log::{error, info};
use serde_json::json;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::AppContext;

pub async fn get_cached_price(symbol: String, ctx: Arc<AppContext>) -> Result<Json, Rejection> {
    match ctx.db.get_cached(&symbol).await {
        Ok(entry) => Ok(warp::reply::json(&entry)),
        Err(e) => {
            error!("cache lookup failed for {}: {}", symbol, e);
            Err(warp::reject::custom(ApiError::internal(e.to_string())))
        }
    }
}

/// Delete failures are soft: a cache miss self-heals, so the response says
/// what happened instead of propagating a 500.
pub async fn clear_symbol_cache(symbol: String, ctx: Arc<AppContext>) -> Result<Json, Rejection> {
    match ctx.db.delete_cache(&symbol).await {
        Ok(true) => {
            info!("deleted cache: {}", symbol);
            Ok(warp::reply::json(&json!({ "message": "Cache cleared" })))
        }
        Ok(false) => Ok(warp::reply::json(
            &json!({ "message": "No cache entry found" }),
        )),
        Err(e) => {
            error!("delete failed for {}: {}", symbol, e);
            Ok(warp::reply::json(
                &json!({ "message": "Failed to clear cache" }),
            ))
        }
    }
}

pub async fn clear_all_cache(ctx: Arc<AppContext>) -> Result<Json, Rejection> {
    match ctx.db.reset_cache().await {
        Ok(deleted) => {
            info!("wiped {} entries", deleted);
            Ok(warp::reply::json(&json!({ "deleted": deleted })))
        }
        Err(e) => {
            error!("cache reset failed: {}", e);
            Err(warp::reject::custom(ApiError::internal(e.to_string())))
        }
    }
}
