// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;

use log::info;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::cache::{clear_all_cache, clear_symbol_cache, get_cached_price};
use crate::handlers::error::ApiError;
use crate::handlers::price::{get_batch_prices, get_current_price, get_fundamentals};
use crate::handlers::price_data::{
    get_history, get_latest, refresh_all, refresh_stock, HistoryQuery,
};
use crate::AppContext;

// Add recovery handling for our custom errors
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = warp::http::StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.clone();
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        code = warp::http::StatusCode::BAD_REQUEST;
        message = "Invalid request body".to_string();
    } else {
        code = warp::http::StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(ctx: Arc<AppContext>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let ctx_filter = warp::any().map(move || ctx.clone());

    let price_route = warp::path!("api" / "v1" / "price" / String)
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(get_current_price);

    let fundamentals_route = warp::path!("api" / "v1" / "price" / String / "fundamentals")
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(get_fundamentals);

    let batch_route = warp::path!("api" / "v1" / "price" / "batch")
        .and(warp::post())
        .and(warp::body::json())
        .and(ctx_filter.clone())
        .and_then(get_batch_prices);

    let refresh_route = warp::path!("api" / "v1" / "users" / i64 / "holdings" / i64 / "refresh")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(refresh_stock);

    let latest_route = warp::path!("api" / "v1" / "users" / i64 / "holdings" / i64 / "latest")
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(get_latest);

    let history_route = warp::path!("api" / "v1" / "users" / i64 / "holdings" / i64 / "history")
        .and(warp::get())
        .and(warp::query::<HistoryQuery>())
        .and(ctx_filter.clone())
        .and_then(get_history);

    let refresh_all_route = warp::path!("api" / "v1" / "users" / i64 / "refresh-all")
        .and(warp::post())
        .and(ctx_filter.clone())
        .and_then(refresh_all);

    let cache_get_route = warp::path!("api" / "v1" / "cache" / String)
        .and(warp::get())
        .and(ctx_filter.clone())
        .and_then(get_cached_price);

    let cache_delete_route = warp::path!("api" / "v1" / "cache" / String)
        .and(warp::delete())
        .and(ctx_filter.clone())
        .and_then(clear_symbol_cache);

    let cache_reset_route = warp::path!("api" / "v1" / "cache")
        .and(warp::delete())
        .and(ctx_filter.clone())
        .and_then(clear_all_cache);

    info!("All routes configured successfully.");

    batch_route
        .or(fundamentals_route)
        .or(price_route)
        .or(refresh_route)
        .or(latest_route)
        .or(history_route)
        .or(refresh_all_route)
        .or(cache_reset_route)
        .or(cache_get_route)
        .or(cache_delete_route)
        .recover(handle_rejection)
}
