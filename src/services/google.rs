// src/services/google.rs
//
// Primary price source: scrapes the Google Finance quote page for the live
// price and the labeled metric rows next to it.
use std::sync::Arc;

use log::{error, info, warn};
use reqwest::Client;
use scraper::{Html, Selector};

use crate::models::{Fundamentals, PriceQuote, ScrapedPage};
use crate::services::db::DbStore;

const BASE_URL: &str = "https://www.google.com/finance/quote";

pub struct GoogleFinance {
    client: Client,
    db: Arc<DbStore>,
    base_url: String,
}

/// Google Finance wants exchange-qualified symbols (`TCS:NSE`), not the
/// suffixed form (`TCS.NS`) the rest of the system uses.
pub fn rewrite_symbol(symbol: &str) -> String {
    symbol.replace(".NS", ":NSE").replace(".BO", ":BOM")
}

/// Strips everything that is not a digit or decimal point, then parses.
/// Unparsable or non-finite values are reported as absent, not as errors.
pub fn clean_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// Pulls the value cell of the metric row whose label matches exactly.
fn metric_value(document: &Html, label: &str) -> Option<String> {
    let row_selector = Selector::parse("div.gyFHrc").unwrap();
    let label_selector = Selector::parse("div.mfs7Fc").unwrap();
    let value_selector = Selector::parse("div.P6K39c").unwrap();

    for row in document.select(&row_selector) {
        let row_label = row
            .select(&label_selector)
            .next()
            .map(|el| el.text().collect::<String>());
        if row_label.as_deref() == Some(label) {
            return row
                .select(&value_selector)
                .next()
                .map(|el| el.text().collect::<String>());
        }
    }
    None
}

/// Parses one rendered quote page into the price plus whatever metric rows
/// were present. Pure, so the extraction is testable on fixture HTML.
pub fn parse_quote_page(html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);

    let price_selector = Selector::parse("div.YMlKec.fxKbKc").unwrap();
    let price = document
        .select(&price_selector)
        .next()
        .map(|el| el.text().collect::<String>())
        .and_then(|text| clean_numeric(&text));

    let fundamentals = Fundamentals {
        pe_ratio: metric_value(&document, "P/E ratio")
            .as_deref()
            .and_then(clean_numeric),
        dividend_yield: metric_value(&document, "Dividend yield")
            .as_deref()
            .and_then(clean_numeric),
        prev_close: metric_value(&document, "Previous close")
            .as_deref()
            .and_then(clean_numeric),
        day_range: metric_value(&document, "Day range"),
        year_range: metric_value(&document, "Year range"),
        market_cap: metric_value(&document, "Market cap"),
        avg_volume: metric_value(&document, "Avg Volume"),
        ..Default::default()
    };

    ScrapedPage {
        price,
        fundamentals,
    }
}

/// Applies the zero-price policy: a price of exactly zero means the page
/// structure changed or the symbol is bogus, so the whole fetch is a miss.
pub fn quote_from_page(symbol: &str, page: &ScrapedPage) -> Option<PriceQuote> {
    let price = page.price?;
    if price == 0.0 {
        warn!("price is zero for {}", symbol);
        return None;
    }

    Some(PriceQuote {
        symbol: symbol.to_string(),
        current_price: price,
        pe_ratio: page.fundamentals.pe_ratio,
        market_cap: page.fundamentals.market_cap.clone(),
        dividend_yield: page.fundamentals.dividend_yield,
        day_high: None,
        day_low: None,
        cached: false,
    })
}

impl GoogleFinance {
    pub fn new(client: Client, db: Arc<DbStore>) -> Self {
        GoogleFinance {
            client,
            db,
            base_url: BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(client: Client, db: Arc<DbStore>, base_url: &str) -> Self {
        GoogleFinance {
            client,
            db,
            base_url: base_url.to_string(),
        }
    }

    async fn fetch_page(&self, symbol: &str) -> Option<String> {
        let url = format!("{}/{}", self.base_url, rewrite_symbol(symbol));
        info!("hitting google: {}", url);

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("google fetch failed for {}: {}", symbol, e);
                return None;
            }
        };

        match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                error!("google body read failed for {}: {}", symbol, e);
                None
            }
        }
    }

    /// Fetches the live price for `symbol`. On success the result is also
    /// written into the cache store before it is returned; a cache write
    /// failure is logged and swallowed since the next read self-heals.
    pub async fn fetch_quote(&self, symbol: &str) -> Option<PriceQuote> {
        let body = self.fetch_page(symbol).await?;
        let page = parse_quote_page(&body);
        let quote = quote_from_page(symbol, &page)?;

        info!(
            "scraped {} at {} (pe={:?}, marketCap={:?})",
            symbol, quote.current_price, quote.pe_ratio, quote.market_cap
        );

        if let Err(e) = self
            .db
            .set_cache(
                symbol,
                quote.current_price,
                quote.pe_ratio,
                quote.market_cap.as_deref(),
                &Fundamentals::default(),
            )
            .await
        {
            warn!("cache write failed for {}: {}", symbol, e);
        }

        Some(quote)
    }

    /// Parses the same quote page into a partial fundamentals bundle.
    /// Returns the live price alongside it so the resolver can write the
    /// merged result back to the cache.
    pub async fn fetch_fundamentals(&self, symbol: &str) -> Option<ScrapedPage> {
        let body = self.fetch_page(symbol).await?;
        let page = parse_quote_page(&body);

        if page.fundamentals.is_empty() && page.price.is_none() {
            warn!("no data found on google page for {}", symbol);
            return None;
        }

        Some(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE_HTML: &str = r#"
        <html><body>
          <div class="YMlKec fxKbKc">₹1,234.50</div>
          <div class="gyFHrc">
            <div class="mfs7Fc">Previous close</div>
            <div class="P6K39c">₹1,230.00</div>
          </div>
          <div class="gyFHrc">
            <div class="mfs7Fc">P/E ratio</div>
            <div class="P6K39c">18.20</div>
          </div>
          <div class="gyFHrc">
            <div class="mfs7Fc">Market cap</div>
            <div class="P6K39c">4.47T INR</div>
          </div>
          <div class="gyFHrc">
            <div class="mfs7Fc">Dividend yield</div>
            <div class="P6K39c">1.32%</div>
          </div>
          <div class="gyFHrc">
            <div class="mfs7Fc">Day range</div>
            <div class="P6K39c">₹1,221.00 - ₹1,240.00</div>
          </div>
        </body></html>
    "#;

    #[test]
    fn rewrites_exchange_suffixes() {
        assert_eq!(rewrite_symbol("TCS.NS"), "TCS:NSE");
        assert_eq!(rewrite_symbol("RELIANCE.BO"), "RELIANCE:BOM");
        assert_eq!(rewrite_symbol("AAPL"), "AAPL");
    }

    #[test]
    fn clean_numeric_strips_commas_and_currency() {
        assert_eq!(clean_numeric("1,234.50"), Some(1234.50));
        assert_eq!(clean_numeric("₹1,234.50"), Some(1234.50));
        assert_eq!(clean_numeric("1.32%"), Some(1.32));
        assert_eq!(clean_numeric("n/a"), None);
        assert_eq!(clean_numeric(""), None);
        // Multiple dots survive the strip but do not parse.
        assert_eq!(clean_numeric("1.2.3"), None);
    }

    #[test]
    fn parses_price_and_labeled_metrics() {
        let page = parse_quote_page(QUOTE_HTML);
        assert_eq!(page.price, Some(1234.50));
        assert_eq!(page.fundamentals.pe_ratio, Some(18.20));
        assert_eq!(page.fundamentals.prev_close, Some(1230.00));
        assert_eq!(page.fundamentals.dividend_yield, Some(1.32));
        assert_eq!(page.fundamentals.market_cap.as_deref(), Some("4.47T INR"));
        assert_eq!(
            page.fundamentals.day_range.as_deref(),
            Some("₹1,221.00 - ₹1,240.00")
        );
        assert!(page.fundamentals.year_range.is_none());
    }

    #[test]
    fn zero_price_collapses_to_absent() {
        let html = r#"<div class="YMlKec fxKbKc">0.00</div>"#;
        let page = parse_quote_page(html);
        assert_eq!(page.price, Some(0.0));
        assert!(quote_from_page("BROKEN", &page).is_none());
    }

    #[test]
    fn missing_price_node_is_absent() {
        let page = parse_quote_page("<html><body></body></html>");
        assert!(page.price.is_none());
        assert!(quote_from_page("AAPL", &page).is_none());
    }

    #[tokio::test]
    async fn transport_failure_leaves_cache_untouched() {
        let db = Arc::new(DbStore::in_memory().await.unwrap());
        // Port 9 is not listening; the connection attempt fails fast.
        let google = GoogleFinance::with_base_url(
            Client::new(),
            db.clone(),
            "http://127.0.0.1:9/finance/quote",
        );

        assert!(google.fetch_quote("AAPL").await.is_none());
        assert!(db.get_cached("AAPL").await.unwrap().is_none());
    }
}
