// src/services/snapshots.rs
//
// Append-only price/valuation records per holding, plus the history and
// retention queries over them.
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use crate::models::{
    HistoryResponse, LatestSnapshot, NewSnapshot, PriceQuote, Snapshot,
};
use crate::services::calculations;
use crate::services::db::DbStore;
use crate::services::error::ServiceError;
use crate::services::resolver::PriceResolver;
use crate::BoxError;

/// Snapshots older than this many days are eligible for cleanup.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// A snapshot younger than this is considered fresh by `latest`.
const FRESH_SECONDS: i64 = 60;

const MAX_HISTORY_DAYS: i64 = 365;

pub struct SnapshotService {
    db: Arc<DbStore>,
    resolver: Arc<PriceResolver>,
}

/// Builds the insert payload for one holding at the given quote.
/// Validation lives in `calculate_metrics`; nothing is written on error.
pub fn snapshot_from_quote(
    holding_id: i64,
    purchase_price: f64,
    quantity: f64,
    quote: &PriceQuote,
) -> Result<NewSnapshot, ServiceError> {
    let metrics = calculations::calculate_metrics(purchase_price, quantity, quote.current_price)?;

    Ok(NewSnapshot {
        holding_id,
        current_price: quote.current_price,
        present_value: metrics.present_value,
        gain_loss: metrics.gain_loss,
        gain_loss_percent: metrics.gain_loss_percent,
        pe_ratio: quote.pe_ratio,
        dividend_yield: quote.dividend_yield,
        day_high: quote.day_high,
        day_low: quote.day_low,
    })
}

impl SnapshotService {
    pub fn new(db: Arc<DbStore>, resolver: Arc<PriceResolver>) -> Self {
        SnapshotService { db, resolver }
    }

    /// Resolves the current price for one holding and records an immutable
    /// snapshot. `NotFound` when the holding does not exist or belongs to
    /// someone else.
    pub async fn record_snapshot(
        &self,
        user_id: i64,
        holding_id: i64,
    ) -> Result<Snapshot, BoxError> {
        info!("creating snapshot for: {}", holding_id);

        let holding = self
            .db
            .get_holding(user_id, holding_id)
            .await?
            .ok_or_else(|| {
                warn!("holding not found: {}", holding_id);
                ServiceError::NotFound("holding not found".to_string())
            })?;

        info!("fetching price for {}", holding.symbol);
        let quote = self
            .resolver
            .fetch_current_price(&holding.symbol)
            .await
            .ok_or_else(|| format!("failed to fetch price for {}", holding.symbol))?;

        let new_snapshot = snapshot_from_quote(
            holding.id,
            holding.purchase_price,
            holding.quantity,
            &quote,
        )?;

        let snapshot = self.db.insert_snapshot(&new_snapshot).await?;
        info!("snapshot created: {}", snapshot.id);
        Ok(snapshot)
    }

    /// Newest snapshot for a holding, with its age. `None` when the holding
    /// has never been refreshed.
    pub async fn latest(
        &self,
        user_id: i64,
        holding_id: i64,
    ) -> Result<Option<LatestSnapshot>, BoxError> {
        info!("getting latest for: {}", holding_id);

        if self.db.get_holding(user_id, holding_id).await?.is_none() {
            return Err(ServiceError::NotFound("holding not found".to_string()).into());
        }

        let Some(snapshot) = self.db.latest_snapshot(holding_id).await? else {
            info!("no snapshot found");
            return Ok(None);
        };

        let age_seconds = (Utc::now() - snapshot.timestamp).num_seconds();
        Ok(Some(LatestSnapshot {
            snapshot,
            age_seconds,
            is_fresh: age_seconds < FRESH_SECONDS,
        }))
    }

    /// Snapshot history within a date range (inclusive, end extended to end
    /// of day), capped at 365 days and 1000 rows, oldest first, with period
    /// summary metrics.
    pub async fn history(
        &self,
        user_id: i64,
        holding_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HistoryResponse, BoxError> {
        info!(
            "getting history: {} from {} to {}",
            holding_id, start, end
        );

        if self.db.get_holding(user_id, holding_id).await?.is_none() {
            return Err(ServiceError::NotFound("holding not found".to_string()).into());
        }

        if (end - start).num_days() > MAX_HISTORY_DAYS {
            return Err(
                ServiceError::InvalidInput("max 365 days allowed".to_string()).into(),
            );
        }

        let end_of_day = end
            .date_naive()
            .and_hms_milli_opt(23, 59, 59, 999)
            .map(|naive| naive.and_utc())
            .unwrap_or(end);

        let history = self
            .db
            .snapshots_between(holding_id, start, end_of_day)
            .await?;
        info!("found: {} records", history.len());

        let metrics = calculations::history_metrics(&history);
        Ok(HistoryResponse {
            data: history,
            metrics,
        })
    }

    /// Retention maintenance; deletes snapshots older than the cutoff and
    /// returns how many were removed.
    pub async fn cleanup(&self, retention_days: i64) -> Result<u64, BoxError> {
        info!("cleanup: keeping {} days", retention_days);
        let cutoff = Utc::now() - Duration::days(retention_days);
        let deleted = self.db.delete_snapshots_before(cutoff).await?;
        info!("deleted {} records", deleted);
        Ok(deleted)
    }
}
