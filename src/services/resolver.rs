// src/services/resolver.rs
//
// Arbitrates between the cache store and the two source adapters for every
// price/fundamentals request.
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use crate::models::{FundamentalsResult, PriceQuote};
use crate::services::db::DbStore;
use crate::services::google::GoogleFinance;
use crate::services::pacer::Pacer;
use crate::services::yahoo::YahooFinance;

pub struct PriceResolver {
    db: Arc<DbStore>,
    google: GoogleFinance,
    yahoo: YahooFinance,
    pacer: Pacer,
}

impl PriceResolver {
    pub fn new(db: Arc<DbStore>, google: GoogleFinance, yahoo: YahooFinance, pacer: Pacer) -> Self {
        PriceResolver {
            db,
            google,
            yahoo,
            pacer,
        }
    }

    /// A cache read failure is treated as a miss; the store heals on the
    /// next successful write.
    async fn cached_entry(&self, symbol: &str) -> Option<crate::models::CacheEntry> {
        match self.db.get_cached(symbol).await {
            Ok(entry) => entry,
            Err(e) => {
                error!("cache read failed for {}: {}", symbol, e);
                None
            }
        }
    }

    /// Cache first, then the scraper. The scraper persists its own result,
    /// so there is no write-back step here. No retry on failure; the next
    /// request or scheduled pass tries again.
    pub async fn fetch_current_price(&self, symbol: &str) -> Option<PriceQuote> {
        info!("checking cache for {}", symbol);

        if let Some(entry) = self.cached_entry(symbol).await {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            info!("got from cache: {} (age: {}s)", symbol, age);
            return Some(PriceQuote {
                symbol: entry.symbol,
                current_price: entry.current_price,
                pe_ratio: entry.pe_ratio,
                market_cap: entry.market_cap,
                dividend_yield: entry.dividend_yield,
                day_high: entry.day_high,
                day_low: entry.day_low,
                cached: true,
            });
        }

        info!("fetching fresh data for {}", symbol);
        match self.google.fetch_quote(symbol).await {
            Some(quote) => {
                info!("fetched {} at {}", symbol, quote.current_price);
                Some(quote)
            }
            None => {
                warn!("couldnt fetch {}", symbol);
                None
            }
        }
    }

    /// Fundamentals use the same cache, read against the broader field set:
    /// a fresh entry only counts as a hit when its fundamentals bundle is
    /// non-empty (a price-only write leaves the bundle all-null).
    /// On a miss both adapters run concurrently and the merge prefers the
    /// structured source field by field.
    pub async fn fetch_fundamentals(&self, symbol: &str) -> Option<FundamentalsResult> {
        info!("getting fundamentals for {}", symbol);

        if let Some(entry) = self.cached_entry(symbol).await {
            let fundamentals = entry.fundamentals();
            if !fundamentals.is_empty() {
                info!("got fundamentals from cache: {}", symbol);
                return Some(FundamentalsResult {
                    symbol: symbol.to_string(),
                    fundamentals,
                    cached: true,
                });
            }
        }

        let (scraped, structured) = tokio::join!(
            self.google.fetch_fundamentals(symbol),
            self.yahoo.fetch_fundamentals(symbol)
        );

        if scraped.is_none() && structured.is_none() {
            warn!("no data found for {}", symbol);
            return None;
        }

        let scraped_price = scraped.as_ref().and_then(|page| page.price);
        let merged = crate::models::Fundamentals::merge(
            scraped.map(|page| page.fundamentals).unwrap_or_default(),
            structured.unwrap_or_default(),
        );

        // Write-back needs a price; only the scrape supplies one. A zero
        // price means the scrape was unusable, so the cache is left alone.
        match scraped_price {
            Some(price) if price != 0.0 => {
                if let Err(e) = self
                    .db
                    .set_cache(
                        symbol,
                        price,
                        merged.pe_ratio,
                        merged.market_cap.as_deref(),
                        &merged,
                    )
                    .await
                {
                    warn!("cache write failed for {}: {}", symbol, e);
                }
            }
            _ => info!("no usable scraped price for {}, skipping cache write", symbol),
        }

        // Same rule as the cache read: an all-null bundle is no data, even
        // when the page itself loaded. The price write above still stands.
        if merged.is_empty() {
            warn!("no fundamentals found for {}", symbol);
            return None;
        }

        Some(FundamentalsResult {
            symbol: symbol.to_string(),
            fundamentals: merged,
            cached: false,
        })
    }

    /// Strictly sequential batch resolve with a pacing delay before every
    /// call after the first, cache hit or not. Failed symbols are dropped
    /// from the result; callers diff against the request list if they care.
    pub async fn fetch_batch_prices(&self, symbols: &[String]) -> Vec<PriceQuote> {
        info!("batch fetch for {} stocks", symbols.len());
        let mut results = Vec::new();

        for (i, symbol) in symbols.iter().enumerate() {
            if i > 0 {
                self.pacer.pause().await;
            }
            if let Some(quote) = self.fetch_current_price(symbol).await {
                results.push(quote);
            }
        }

        info!("batch done: {}/{}", results.len(), symbols.len());
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fundamentals;
    use reqwest::Client;

    // Adapters pointed at a closed local port: every live fetch fails fast,
    // so only the cache path can produce data.
    async fn offline_resolver_with(db: Arc<DbStore>, pacer: Pacer) -> PriceResolver {
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
        PriceResolver::new(db, google, yahoo, pacer)
    }

    async fn offline_resolver(db: Arc<DbStore>) -> PriceResolver {
        offline_resolver_with(db, Pacer::none()).await
    }

    // Serves a fixed page on an ephemeral local port.
    async fn serve_page(body: &'static str) -> std::net::SocketAddr {
        use warp::Filter;
        let page = warp::any().map(move || warp::reply::html(body));
        let (addr, server) = warp::serve(page).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn cache_hit_is_tagged_cached() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        db.set_cache("AAPL", 187.5, Some(29.1), None, &Fundamentals::default())
            .await
            .unwrap();

        let resolver = offline_resolver(db).await;
        let quote = resolver.fetch_current_price("AAPL").await.unwrap();
        assert!(quote.cached);
        assert_eq!(quote.current_price, 187.5);
    }

    #[tokio::test]
    async fn miss_with_dead_source_is_absent() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        let resolver = offline_resolver(db).await;
        assert!(resolver.fetch_current_price("MSFT").await.is_none());
    }

    #[tokio::test]
    async fn batch_drops_failures_and_keeps_order() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        db.set_cache("A", 1.0, None, None, &Fundamentals::default())
            .await
            .unwrap();
        db.set_cache("C", 3.0, None, None, &Fundamentals::default())
            .await
            .unwrap();

        let resolver = offline_resolver(db).await;
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let results = resolver.fetch_batch_prices(&symbols).await;

        let got: Vec<&str> = results.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(got, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn fundamentals_cache_hit_needs_nonempty_bundle() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        // Price-only entry: fundamentals bundle is all-null, so the read
        // falls through to the (dead) adapters and reports absent.
        db.set_cache("AAPL", 187.5, None, None, &Fundamentals::default())
            .await
            .unwrap();

        let resolver = offline_resolver(db.clone()).await;
        assert!(resolver.fetch_fundamentals("AAPL").await.is_none());

        // An entry with a populated bundle is a hit.
        let extras = Fundamentals {
            sector: Some("Tech".to_string()),
            pe_ratio_ttm: Some(29.4),
            ..Default::default()
        };
        db.set_cache("AAPL", 187.5, Some(29.1), None, &extras)
            .await
            .unwrap();

        let result = resolver.fetch_fundamentals("AAPL").await.unwrap();
        assert!(result.cached);
        assert_eq!(result.fundamentals.sector.as_deref(), Some("Tech"));
        assert_eq!(result.fundamentals.pe_ratio, Some(29.1));
    }

    #[tokio::test]
    async fn price_only_page_yields_no_fundamentals() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        // A live page that carries a price but no metric rows at all.
        let addr = serve_page(
            r#"<html><body><div class="YMlKec fxKbKc">187.50</div></body></html>"#,
        )
        .await;

        let google = GoogleFinance::with_base_url(
            Client::new(),
            db.clone(),
            &format!("http://{}/finance/quote", addr),
        );
        let yahoo = YahooFinance::with_base_urls(
            Client::new(),
            "http://127.0.0.1:9/quoteSummary",
            "http://127.0.0.1:9/chart",
        );
        let resolver = PriceResolver::new(db.clone(), google, yahoo, Pacer::none());

        assert!(resolver.fetch_fundamentals("AAPL").await.is_none());

        // The scraped price still lands in the cache.
        let entry = db.get_cached("AAPL").await.unwrap().unwrap();
        assert_eq!(entry.current_price, 187.5);
        assert!(entry.fundamentals().is_empty());
    }

    // Real clock: sqlx's sqlite worker runs on a plain OS thread, so a paused
    // tokio clock auto-advances past the pool's acquire timeout (PoolTimedOut).
    #[tokio::test]
    async fn batch_paces_between_symbols() {
        use std::time::Duration;

        let db = Arc::new(DbStore::in_memory().await.unwrap());
        for (symbol, price) in [("A", 1.0), ("B", 2.0), ("C", 3.0)] {
            db.set_cache(symbol, price, None, None, &Fundamentals::default())
                .await
                .unwrap();
        }

        let resolver =
            offline_resolver_with(db, Pacer::new(Duration::from_millis(200))).await;
        let symbols = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let start = tokio::time::Instant::now();
        let results = resolver.fetch_batch_prices(&symbols).await;

        assert_eq!(results.len(), 3);
        // Two pauses for three symbols, cache hits included.
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
