// src/services/yahoo.rs
//
// Secondary source: Yahoo Finance quote-summary API. Supplies fundamentals
// only; the live price always comes from the scraping adapter.
use log::{error, info};
use reqwest::Client;
use serde_json::Value;

use crate::models::Fundamentals;

const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

const MODULES: &str =
    "summaryDetail,defaultKeyStatistics,financialData,assetProfile,summaryProfile,price";

pub struct YahooFinance {
    client: Client,
    summary_url: String,
    chart_url: String,
}

/// Yahoo wraps numbers as `{"raw": 1.23, "fmt": "1.23"}`; older payloads
/// occasionally inline the bare number.
fn raw_num(node: &Value, path: &str) -> Option<f64> {
    let v = node.pointer(path)?;
    v.get("raw").and_then(Value::as_f64).or_else(|| v.as_f64())
}

fn raw_str(node: &Value, path: &str) -> Option<String> {
    node.pointer(path)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Extracts the fundamentals bundle from one quote-summary payload.
pub fn parse_quote_summary(payload: &Value) -> Fundamentals {
    let Some(result) = payload.pointer("/quoteSummary/result/0") else {
        return Fundamentals::default();
    };

    let market_cap = raw_num(result, "/price/marketCap")
        .map(|v| v.to_string())
        .or_else(|| raw_str(result, "/price/marketCap/fmt"));

    Fundamentals {
        market_cap,
        pe_ratio_ttm: raw_num(result, "/summaryDetail/trailingPE"),
        price_to_book: raw_num(result, "/defaultKeyStatistics/priceToBook"),
        book_value: raw_num(result, "/defaultKeyStatistics/bookValue"),
        debt_to_equity: raw_num(result, "/financialData/debtToEquity"),
        revenue_ttm: raw_num(result, "/financialData/totalRevenue"),
        ebitda_ttm: raw_num(result, "/financialData/ebitda"),
        profit_margin: raw_num(result, "/financialData/profitMargins"),
        operating_margin: raw_num(result, "/financialData/operatingMargins"),
        return_on_equity: raw_num(result, "/financialData/returnOnEquity"),
        return_on_assets: raw_num(result, "/financialData/returnOnAssets"),
        // Sector/industry live in either profile module; first non-null wins.
        sector: raw_str(result, "/assetProfile/sector")
            .or_else(|| raw_str(result, "/summaryProfile/sector")),
        industry: raw_str(result, "/assetProfile/industry")
            .or_else(|| raw_str(result, "/summaryProfile/industry")),
        ..Default::default()
    }
}

/// Intraday high/low from a single-day chart payload.
pub fn parse_day_range(payload: &Value) -> Option<(f64, f64)> {
    let quote = payload.pointer("/chart/result/0/indicators/quote/0")?;

    let highs: Vec<f64> = quote
        .get("high")?
        .as_array()?
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    let lows: Vec<f64> = quote
        .get("low")?
        .as_array()?
        .iter()
        .filter_map(Value::as_f64)
        .collect();

    let high = highs.iter().cloned().fold(f64::NAN, f64::max);
    let low = lows.iter().cloned().fold(f64::NAN, f64::min);

    if high.is_finite() && low.is_finite() {
        Some((high, low))
    } else {
        None
    }
}

impl YahooFinance {
    pub fn new(client: Client) -> Self {
        YahooFinance {
            client,
            summary_url: QUOTE_SUMMARY_URL.to_string(),
            chart_url: CHART_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(client: Client, summary_url: &str, chart_url: &str) -> Self {
        YahooFinance {
            client,
            summary_url: summary_url.to_string(),
            chart_url: chart_url.to_string(),
        }
    }

    /// One round-trip for the whole valuation/financial-health/profile
    /// bundle. Absent on transport errors and on all-null payloads.
    pub async fn fetch_fundamentals(&self, symbol: &str) -> Option<Fundamentals> {
        info!("trying yahoo for {}", symbol);

        let url = format!("{}/{}?modules={}", self.summary_url, symbol, MODULES);
        let payload: Value = match self.client.get(&url).send().await {
            Ok(resp) => match resp.json().await {
                Ok(v) => v,
                Err(e) => {
                    error!("yahoo payload decode failed: {}", e);
                    return None;
                }
            },
            Err(e) => {
                error!("yahoo failed: {}", e);
                return None;
            }
        };

        let mut fundamentals = parse_quote_summary(&payload);
        if fundamentals.is_empty() {
            return None;
        }

        // Day high/low come from a separate single-day history call; losing
        // them is not worth failing the whole fetch.
        if let Some((high, low)) = self.fetch_day_range(symbol).await {
            fundamentals.day_high = Some(high);
            fundamentals.day_low = Some(low);
        }

        Some(fundamentals)
    }

    async fn fetch_day_range(&self, symbol: &str) -> Option<(f64, f64)> {
        let url = format!("{}/{}?range=1d&interval=1d", self.chart_url, symbol);
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<Value>().await {
                Ok(payload) => parse_day_range(&payload),
                Err(e) => {
                    error!("yahoo chart decode failed for {}: {}", symbol, e);
                    None
                }
            },
            Err(e) => {
                error!("yahoo chart failed for {}: {}", symbol, e);
                None
            }
        }
    }
}
