// src/services/refresh.rs
//
// Bulk refresh: walks a user's holdings sequentially with pacing, records
// a snapshot batch, and reports successes/failures. Also the multi-user
// fan-out the cron job runs.
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::models::RefreshSummary;
use crate::services::db::DbStore;
use crate::services::pacer::Pacer;
use crate::services::resolver::PriceResolver;
use crate::services::snapshots::snapshot_from_quote;
use crate::BoxError;

/// Every minute, on the minute.
pub const DEFAULT_REFRESH_CRON: &str = "0 * * * * *";

pub struct RefreshService {
    db: Arc<DbStore>,
    resolver: Arc<PriceResolver>,
    pacer: Pacer,
}

pub fn format_duration(elapsed: std::time::Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}

impl RefreshService {
    pub fn new(db: Arc<DbStore>, resolver: Arc<PriceResolver>, pacer: Pacer) -> Self {
        RefreshService {
            db,
            resolver,
            pacer,
        }
    }

    /// One sequential pass over a user's holdings. A symbol that fails to
    /// resolve (or fails validation) lands in the failed list and the pass
    /// keeps going; all successful snapshots are committed in one batch at
    /// the end.
    pub async fn bulk_refresh(&self, user_id: i64) -> Result<RefreshSummary, BoxError> {
        let started = Instant::now();
        info!("bulk refresh for: {}", user_id);

        let holdings = self.db.list_holdings(user_id).await?;
        info!("found {} stocks", holdings.len());

        let mut snapshots = Vec::new();
        let mut failed_symbols = Vec::new();

        for (i, holding) in holdings.iter().enumerate() {
            if i > 0 {
                self.pacer.pause().await;
            }

            let Some(quote) = self.resolver.fetch_current_price(&holding.symbol).await else {
                failed_symbols.push(holding.symbol.clone());
                continue;
            };

            match snapshot_from_quote(
                holding.id,
                holding.purchase_price,
                holding.quantity,
                &quote,
            ) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    warn!("skipping {}: {}", holding.symbol, e);
                    failed_symbols.push(holding.symbol.clone());
                }
            }
        }

        if !snapshots.is_empty() {
            self.db.insert_snapshots(&snapshots).await?;
        }

        let duration = format_duration(started.elapsed());
        info!("done in {}", duration);

        Ok(RefreshSummary {
            updated: snapshots.len(),
            failed: failed_symbols.len(),
            total: holdings.len(),
            duration,
            failed_symbols,
        })
    }

    /// Sequential fan-out over every user. One user's failure is logged and
    /// the rest are still processed.
    pub async fn refresh_all_users(&self) -> Result<(), BoxError> {
        info!("scheduled refresh started");

        let users = self.db.list_users().await?;
        for user in users {
            info!("refreshing prices for user: {}", user.username);
            if let Err(e) = self.bulk_refresh(user.id).await {
                error!("refresh failed for user {}: {}", user.username, e);
            }
        }

        info!("scheduled refresh completed");
        Ok(())
    }
}

/// Wires the periodic refresh into the cron scheduler and starts it.
pub async fn start_scheduler(
    refresh: Arc<RefreshService>,
    cron_expr: &str,
) -> Result<JobScheduler, BoxError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron_expr, move |_id, _lock| {
        let refresh = refresh.clone();
        Box::pin(async move {
            if let Err(e) = refresh.refresh_all_users().await {
                error!("scheduled refresh failed: {}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("refresh scheduler started ({})", cron_expr);

    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fundamentals;
    use crate::services::google::GoogleFinance;
    use crate::services::yahoo::YahooFinance;
    use chrono::Utc;
    use reqwest::Client;
    use std::time::Duration;

    async fn service(db: Arc<DbStore>) -> RefreshService {
        let google = GoogleFinance::with_base_url(
            Client::new(),
            db.clone(),
            "http://127.0.0.1:9/finance/quote",
        );
        let yahoo = YahooFinance::with_base_urls(
            Client::new(),
            "http://127.0.0.1:9/quoteSummary",
            "http://127.0.0.1:9/chart",
        );
        let resolver = Arc::new(PriceResolver::new(db.clone(), google, yahoo, Pacer::none()));
        RefreshService::new(db, resolver, Pacer::none())
    }

    #[test]
    fn duration_is_reported_to_one_decimal() {
        assert_eq!(format_duration(Duration::from_millis(12_340)), "12.3s");
        assert_eq!(format_duration(Duration::from_millis(40)), "0.0s");
    }

    #[tokio::test]
    async fn one_failure_never_aborts_the_batch() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        let user = db.insert_user("alice").await.unwrap();
        let a = db.insert_holding(user, "A", 100.0, 10.0).await.unwrap();
        db.insert_holding(user, "B", 50.0, 2.0).await.unwrap();
        let c = db.insert_holding(user, "C", 10.0, 5.0).await.unwrap();

        // A and C resolve from cache; B has no entry and the live source is
        // unreachable.
        db.set_cache("A", 120.0, None, None, &Fundamentals::default())
            .await
            .unwrap();
        db.set_cache("C", 8.0, None, None, &Fundamentals::default())
            .await
            .unwrap();

        let svc = service(db.clone()).await;
        let summary = svc.bulk_refresh(user).await.unwrap();

        assert_eq!(summary.updated, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.failed_symbols, vec!["B".to_string()]);
        assert!(summary.duration.ends_with('s'));

        assert!(db.latest_snapshot(a).await.unwrap().is_some());
        assert!(db.latest_snapshot(c).await.unwrap().is_some());

        let rows = db
            .snapshots_between(
                a,
                Utc::now() - chrono::Duration::days(1),
                Utc::now() + chrono::Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    // Real clock: sqlx's sqlite worker runs on a plain OS thread, so a paused
    // tokio clock auto-advances past the pool's acquire timeout (PoolTimedOut).
    #[tokio::test]
    async fn bulk_refresh_paces_between_holdings() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        let user = db.insert_user("alice").await.unwrap();
        for (symbol, price) in [("A", 1.0), ("B", 2.0), ("C", 3.0)] {
            db.insert_holding(user, symbol, price, 1.0).await.unwrap();
            db.set_cache(symbol, price, None, None, &Fundamentals::default())
                .await
                .unwrap();
        }

        let google = GoogleFinance::with_base_url(
            Client::new(),
            db.clone(),
            "http://127.0.0.1:9/finance/quote",
        );
        let yahoo = YahooFinance::with_base_urls(
            Client::new(),
            "http://127.0.0.1:9/quoteSummary",
            "http://127.0.0.1:9/chart",
        );
        let resolver = Arc::new(PriceResolver::new(db.clone(), google, yahoo, Pacer::none()));
        let svc = RefreshService::new(db, resolver, Pacer::new(Duration::from_millis(200)));

        let start = tokio::time::Instant::now();
        let summary = svc.bulk_refresh(user).await.unwrap();

        assert_eq!(summary.updated, 3);
        // Two pauses for three holdings.
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test]
    async fn refresh_all_users_survives_empty_portfolios() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        db.insert_user("alice").await.unwrap();
        db.insert_user("bob").await.unwrap();

        let svc = service(db).await;
        svc.refresh_all_users().await.unwrap();
    }

    #[tokio::test]
    async fn empty_portfolio_yields_empty_summary() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        let user = db.insert_user("alice").await.unwrap();

        let svc = service(db).await;
        let summary = svc.bulk_refresh(user).await.unwrap();
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.total, 0);
        assert!(summary.failed_symbols.is_empty());
    }
}
