// src/models.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

/// One row of the `price_cache` table. Owned exclusively by `DbStore`;
/// everything else reads it through `get_cached`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub symbol: String,
    pub current_price: f64,
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<String>,
    pub dividend_yield: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub avg_volume: Option<String>,
    pub pe_ratio_ttm: Option<f64>,
    pub price_to_book: Option<f64>,
    pub book_value: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub revenue_ttm: Option<f64>,
    pub ebitda_ttm: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub prev_close: Option<f64>,
    pub day_range: Option<String>,
    pub year_range: Option<String>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// The broader fundamentals field set stored alongside the price.
    pub fn fundamentals(&self) -> Fundamentals {
        Fundamentals {
            pe_ratio: self.pe_ratio,
            dividend_yield: self.dividend_yield,
            prev_close: self.prev_close,
            day_range: self.day_range.clone(),
            year_range: self.year_range.clone(),
            market_cap: self.market_cap.clone(),
            avg_volume: self.avg_volume.clone(),
            day_high: self.day_high,
            day_low: self.day_low,
            pe_ratio_ttm: self.pe_ratio_ttm,
            price_to_book: self.price_to_book,
            book_value: self.book_value,
            debt_to_equity: self.debt_to_equity,
            revenue_ttm: self.revenue_ttm,
            ebitda_ttm: self.ebitda_ttm,
            profit_margin: self.profit_margin,
            operating_margin: self.operating_margin,
            return_on_equity: self.return_on_equity,
            return_on_assets: self.return_on_assets,
            sector: self.sector.clone(),
            industry: self.industry.clone(),
        }
    }
}

/// The resolver's working value for a single symbol. `cached` tells the
/// caller whether it came from the cache store or a live fetch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    pub current_price: f64,
    pub pe_ratio: Option<f64>,
    pub market_cap: Option<String>,
    pub dividend_yield: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub cached: bool,
}

/// Partial fundamentals bundle. Every field is optional on purpose: each
/// adapter fills in what it found and the resolver merges field by field,
/// so "missing" stays distinguishable from zero.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub prev_close: Option<f64>,
    pub day_range: Option<String>,
    pub year_range: Option<String>,
    pub market_cap: Option<String>,
    pub avg_volume: Option<String>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub pe_ratio_ttm: Option<f64>,
    pub price_to_book: Option<f64>,
    pub book_value: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub revenue_ttm: Option<f64>,
    pub ebitda_ttm: Option<f64>,
    pub profit_margin: Option<f64>,
    pub operating_margin: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

impl Fundamentals {
    pub fn is_empty(&self) -> bool {
        self.pe_ratio.is_none()
            && self.dividend_yield.is_none()
            && self.prev_close.is_none()
            && self.day_range.is_none()
            && self.year_range.is_none()
            && self.market_cap.is_none()
            && self.avg_volume.is_none()
            && self.day_high.is_none()
            && self.day_low.is_none()
            && self.pe_ratio_ttm.is_none()
            && self.price_to_book.is_none()
            && self.book_value.is_none()
            && self.debt_to_equity.is_none()
            && self.revenue_ttm.is_none()
            && self.ebitda_ttm.is_none()
            && self.profit_margin.is_none()
            && self.operating_margin.is_none()
            && self.return_on_equity.is_none()
            && self.return_on_assets.is_none()
            && self.sector.is_none()
            && self.industry.is_none()
    }

    /// Field-by-field merge; `secondary` (the structured source) wins
    /// wherever both adapters supplied a value.
    pub fn merge(scraped: Fundamentals, secondary: Fundamentals) -> Fundamentals {
        Fundamentals {
            pe_ratio: secondary.pe_ratio.or(scraped.pe_ratio),
            dividend_yield: secondary.dividend_yield.or(scraped.dividend_yield),
            prev_close: secondary.prev_close.or(scraped.prev_close),
            day_range: secondary.day_range.or(scraped.day_range),
            year_range: secondary.year_range.or(scraped.year_range),
            market_cap: secondary.market_cap.or(scraped.market_cap),
            avg_volume: secondary.avg_volume.or(scraped.avg_volume),
            day_high: secondary.day_high.or(scraped.day_high),
            day_low: secondary.day_low.or(scraped.day_low),
            pe_ratio_ttm: secondary.pe_ratio_ttm.or(scraped.pe_ratio_ttm),
            price_to_book: secondary.price_to_book.or(scraped.price_to_book),
            book_value: secondary.book_value.or(scraped.book_value),
            debt_to_equity: secondary.debt_to_equity.or(scraped.debt_to_equity),
            revenue_ttm: secondary.revenue_ttm.or(scraped.revenue_ttm),
            ebitda_ttm: secondary.ebitda_ttm.or(scraped.ebitda_ttm),
            profit_margin: secondary.profit_margin.or(scraped.profit_margin),
            operating_margin: secondary.operating_margin.or(scraped.operating_margin),
            return_on_equity: secondary.return_on_equity.or(scraped.return_on_equity),
            return_on_assets: secondary.return_on_assets.or(scraped.return_on_assets),
            sector: secondary.sector.or(scraped.sector),
            industry: secondary.industry.or(scraped.industry),
        }
    }
}

/// What the scraper recovers from a single quote page: the live price plus
/// whatever labeled metric rows were present.
#[derive(Debug, Clone, Default)]
pub struct ScrapedPage {
    pub price: Option<f64>,
    pub fundamentals: Fundamentals,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundamentalsResult {
    pub symbol: String,
    #[serde(flatten)]
    pub fundamentals: Fundamentals,
    pub cached: bool,
}

/// A user's position in a security. Owned by the CRUD layer; this subsystem
/// only reads it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub purchase_price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
}

/// Immutable point-in-time valuation record for a holding.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: i64,
    pub holding_id: i64,
    pub current_price: f64,
    pub present_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Insert payload for a snapshot row; the database assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub holding_id: i64,
    pub current_price: f64,
    pub present_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetrics {
    pub investment: f64,
    pub present_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percent: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestSnapshot {
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub age_seconds: i64,
    pub is_fresh: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryMetrics {
    pub period_return: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub best_gain: Option<f64>,
    pub worst_gain: Option<f64>,
    pub points: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub data: Vec<Snapshot>,
    pub metrics: HistoryMetrics,
}

/// Outcome of one bulk refresh pass. Transient; never persisted.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSummary {
    pub updated: usize,
    pub failed: usize,
    pub total: usize,
    pub duration: String,
    pub failed_symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub symbols: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_structured_source_per_field() {
        let scraped = Fundamentals {
            pe_ratio: Some(18.2),
            dividend_yield: None,
            ..Default::default()
        };
        let yahoo = Fundamentals {
            pe_ratio: None,
            dividend_yield: Some(1.5),
            sector: Some("Tech".to_string()),
            ..Default::default()
        };

        let merged = Fundamentals::merge(scraped, yahoo);
        assert_eq!(merged.pe_ratio, Some(18.2));
        assert_eq!(merged.dividend_yield, Some(1.5));
        assert_eq!(merged.sector.as_deref(), Some("Tech"));
    }

    #[test]
    fn merge_overlapping_field_takes_structured_value() {
        let scraped = Fundamentals {
            pe_ratio: Some(18.2),
            ..Default::default()
        };
        let yahoo = Fundamentals {
            pe_ratio: Some(19.0),
            ..Default::default()
        };

        let merged = Fundamentals::merge(scraped, yahoo);
        assert_eq!(merged.pe_ratio, Some(19.0));
    }

    #[test]
    fn empty_bundle_detected() {
        assert!(Fundamentals::default().is_empty());
        let f = Fundamentals {
            book_value: Some(0.0),
            ..Default::default()
        };
        assert!(!f.is_empty());
    }
}
