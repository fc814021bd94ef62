use dotenv::dotenv;
use env_logger;
use log::{info, warn};
use warp::Filter;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use portfolio_tracker::services::db::DbStore;
use portfolio_tracker::services::google::GoogleFinance;
use portfolio_tracker::services::http::HttpConfig;
use portfolio_tracker::services::pacer::Pacer;
use portfolio_tracker::services::refresh::{
    start_scheduler, RefreshService, DEFAULT_REFRESH_CRON,
};
use portfolio_tracker::services::resolver::PriceResolver;
use portfolio_tracker::services::snapshots::SnapshotService;
use portfolio_tracker::services::yahoo::YahooFinance;
use portfolio_tracker::{routes, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize the logger
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let port_str = env::var("PORT").unwrap_or_else(|_| {
        warn!("$PORT not set, defaulting to 3030");
        "3030".to_string()
    });
    let port: u16 = port_str.parse().expect("PORT must be a number");
    info!("Using PORT: {}", port);

    let database_url = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://portfolio.db?mode=rwc".to_string());
    let db = Arc::new(
        DbStore::new(&database_url)
            .await
            .map_err(|e| anyhow::anyhow!("failed to open database: {}", e))?,
    );
    info!("Database ready at {}", database_url);

    // One transport config for both adapters; the proxy (if any) applies to
    // these clients only.
    let http_config = HttpConfig::from_env();
    let client = http_config
        .build_client()
        .map_err(|e| anyhow::anyhow!("failed to build http client: {}", e))?;

    let google = GoogleFinance::new(client.clone(), db.clone());
    let yahoo = YahooFinance::new(client);
    let resolver = Arc::new(PriceResolver::new(
        db.clone(),
        google,
        yahoo,
        Pacer::default(),
    ));
    let snapshots = SnapshotService::new(db.clone(), resolver.clone());
    let refresh = Arc::new(RefreshService::new(
        db.clone(),
        resolver.clone(),
        Pacer::default(),
    ));

    let cron_expr = env::var("REFRESH_CRON").unwrap_or_else(|_| DEFAULT_REFRESH_CRON.to_string());
    let _scheduler = start_scheduler(refresh.clone(), &cron_expr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to start scheduler: {}", e))?;

    let ctx = Arc::new(AppContext {
        db,
        resolver,
        snapshots,
        refresh,
    });

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS
    let cors = warp::cors()
        .allow_any_origin()
        .allow_header("content-type")
        .allow_methods(vec!["GET", "POST", "PUT", "DELETE"]);

    let api = routes::routes(ctx).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;

    Ok(())
}
