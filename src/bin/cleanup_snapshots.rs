// Retention maintenance: deletes snapshots older than the retention window.
// Usage: cargo run --bin cleanup_snapshots [-- days]
use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use env_logger;
use log::info;

use portfolio_tracker::services::db::DbStore;
use portfolio_tracker::services::google::GoogleFinance;
use portfolio_tracker::services::http::HttpConfig;
use portfolio_tracker::services::pacer::Pacer;
use portfolio_tracker::services::resolver::PriceResolver;
use portfolio_tracker::services::snapshots::{SnapshotService, DEFAULT_RETENTION_DAYS};
use portfolio_tracker::services::yahoo::YahooFinance;
use portfolio_tracker::BoxError;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    env_logger::init();

    let retention_days = env::args()
        .nth(1)
        .and_then(|arg| arg.parse::<i64>().ok())
        .unwrap_or(DEFAULT_RETENTION_DAYS);

    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://portfolio.db?mode=rwc".to_string());
    let db = Arc::new(DbStore::new(&database_url).await?);

    let client = HttpConfig::from_env().build_client()?;
    let google = GoogleFinance::new(client.clone(), db.clone());
    let yahoo = YahooFinance::new(client);
    let resolver = Arc::new(PriceResolver::new(db.clone(), google, yahoo, Pacer::none()));
    let snapshots = SnapshotService::new(db, resolver);

    let deleted = snapshots.cleanup(retention_days).await?;
    info!("cleanup done: removed {} snapshots older than {} days", deleted, retention_days);

    Ok(())
}
