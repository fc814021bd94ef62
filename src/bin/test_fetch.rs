// Quick manual check of both source adapters against a live symbol.
// Usage: cargo run --bin test_fetch -- AAPL
use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger;
use log::{error, info};

use portfolio_tracker::services::db::DbStore;
use portfolio_tracker::services::google::GoogleFinance;
use portfolio_tracker::services::http::HttpConfig;
use portfolio_tracker::services::yahoo::YahooFinance;
use portfolio_tracker::BoxError;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    env_logger::init();

    let symbol = env::args().nth(1).unwrap_or_else(|| "AAPL".to_string());
    info!("Testing adapters for {}", symbol);

    let db = Arc::new(DbStore::in_memory().await?);
    let client = HttpConfig::from_env().build_client()?;

    let google = GoogleFinance::new(client.clone(), db.clone());
    match google.fetch_quote(&symbol).await {
        Some(quote) => info!(
            "google: price={}, pe={:?}, marketCap={:?}",
            quote.current_price, quote.pe_ratio, quote.market_cap
        ),
        None => error!("google: no data for {}", symbol),
    }

    let yahoo = YahooFinance::new(client);
    match yahoo.fetch_fundamentals(&symbol).await {
        Some(f) => info!(
            "yahoo: peTTM={:?}, sector={:?}, dayHigh={:?}, dayLow={:?}",
            f.pe_ratio_ttm, f.sector, f.day_high, f.day_low
        ),
        None => error!("yahoo: no data for {}", symbol),
    }

    Ok(())
}
