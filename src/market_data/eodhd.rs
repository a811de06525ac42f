// =============================================================================
// EODHD REST API Client — historical EOD bars + exchange symbol lists
// =============================================================================
//
// Implements both provider seams against the EODHD HTTP API. The API token is
// passed as the `api_token` query parameter on every request and is never
// logged. A 10-second transport timeout is set on the underlying client; the
// orchestrator layers its own per-symbol deadline on top.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::market_data::provider::{PriceSeriesProvider, SymbolUniverseProvider};
use crate::market_data::{PriceBar, PriceSeries, SymbolMeta};
use crate::types::Market;

/// EODHD REST client. Cheap to clone; the inner reqwest client is pooled.
#[derive(Clone)]
pub struct EodhdClient {
    api_token: String,
    base_url: String,
    client: reqwest::Client,
}

/// One EOD row as returned by `/api/eod/{symbol}`.
#[derive(Debug, Deserialize)]
struct EodRow {
    date: chrono::NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

/// One row of `/api/exchange-symbol-list/{exchange}`.
#[derive(Debug, Deserialize)]
struct ExchangeSymbolRow {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Exchange")]
    exchange: String,
    #[serde(rename = "Type", default)]
    security_type: Option<String>,
}

impl EodhdClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `api_token` — EODHD API token (query parameter, never a header).
    pub fn new(api_token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!("EodhdClient initialised (base_url=https://eodhd.com/api)");

        Self {
            api_token: api_token.into(),
            base_url: "https://eodhd.com/api".to_string(),
            client,
        }
    }

    /// Map a raw EODHD response body into a validated `PriceSeries`.
    fn into_series(symbol: &str, rows: Vec<EodRow>) -> Result<PriceSeries> {
        let bars: Vec<PriceBar> = rows
            .into_iter()
            .map(|r| PriceBar {
                date: r.date,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            })
            .collect();

        PriceSeries::new(symbol, bars)
            .with_context(|| format!("EODHD returned an invalid series for {symbol}"))
    }
}

#[async_trait]
impl PriceSeriesProvider for EodhdClient {
    /// GET /api/eod/{SYMBOL}.{SUFFIX} — daily bars, ascending date order.
    #[instrument(skip(self), name = "eodhd::fetch")]
    async fn fetch(
        &self,
        symbol: &str,
        market: Market,
        lookback_days: u32,
    ) -> Result<PriceSeries> {
        let to = Utc::now().date_naive();
        let from = to - Duration::days(lookback_days as i64);
        let formatted = format!("{}.{}", symbol.to_uppercase(), market.eodhd_suffix());
        let url = format!("{}/eod/{}", self.base_url, formatted);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("api_token", self.api_token.as_str()),
                ("from", &from.to_string()),
                ("to", &to.to_string()),
                ("fmt", "json"),
                ("period", "d"),
                ("order", "a"),
            ])
            .send()
            .await
            .with_context(|| format!("GET /eod/{formatted} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("EODHD GET /eod/{formatted} returned {status}: {body}");
        }

        let rows: Vec<EodRow> = resp
            .json()
            .await
            .with_context(|| format!("failed to parse EOD response for {formatted}"))?;

        if rows.is_empty() {
            anyhow::bail!("no historical data available for {formatted}");
        }

        debug!(symbol, bars = rows.len(), "EOD series fetched");
        Self::into_series(symbol, rows)
    }
}

#[async_trait]
impl SymbolUniverseProvider for EodhdClient {
    /// GET /api/exchange-symbol-list/{EXCHANGE} — full listing for a market.
    /// Non-common-stock instruments (ETFs, funds) are filtered out.
    #[instrument(skip(self), name = "eodhd::list")]
    async fn list(&self, market: Market) -> Result<Vec<SymbolMeta>> {
        let url = format!(
            "{}/exchange-symbol-list/{}",
            self.base_url,
            market.eodhd_suffix()
        );

        let resp = self
            .client
            .get(&url)
            .query(&[("api_token", self.api_token.as_str()), ("fmt", "json")])
            .send()
            .await
            .with_context(|| format!("GET /exchange-symbol-list/{market} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("EODHD symbol list for {market} returned {status}: {body}");
        }

        let rows: Vec<ExchangeSymbolRow> = resp
            .json()
            .await
            .with_context(|| format!("failed to parse symbol list for {market}"))?;

        let total = rows.len();
        let universe: Vec<SymbolMeta> = rows
            .into_iter()
            .filter(|r| {
                r.security_type
                    .as_deref()
                    .map(|t| t.eq_ignore_ascii_case("common stock"))
                    .unwrap_or(true)
            })
            .map(|r| SymbolMeta {
                symbol: r.code,
                company_name: r.name,
                exchange: r.exchange,
                market_cap: None,
                pe_ratio: None,
            })
            .collect();

        if universe.is_empty() {
            warn!(%market, total, "symbol list contained no common stocks");
        }
        debug!(%market, total, kept = universe.len(), "symbol universe fetched");
        Ok(universe)
    }
}
