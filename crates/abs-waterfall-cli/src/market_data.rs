//! Live base-rate lookup for the floating-rate index.
//!
//! The endpoint returns a single record `{ "series": "...", "value": "4.33" }`
//! with the value in percent. Lookups never fail a run: any error is logged
//! and the scenario's own base rate is kept.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// One quoted rate.
#[derive(Debug, Clone, Deserialize)]
pub struct RateQuote {
    pub series: String,
    pub value: Decimal,
}

pub trait RateSource {
    fn fetch(&self) -> Result<RateQuote, Box<dyn std::error::Error>>;
}

pub struct HttpRateSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpRateSource {
    pub fn new(url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

impl RateSource for HttpRateSource {
    fn fetch(&self) -> Result<RateQuote, Box<dyn std::error::Error>> {
        let response = self.client.get(&self.url).send()?;
        if !response.status().is_success() {
            return Err(format!("market data error: {}", response.status()).into());
        }
        Ok(response.json()?)
    }
}

/// Quoted base rate, or `fallback` when the source is unavailable or the
/// quote is outside [0, 100].
pub fn base_rate_or(source: &dyn RateSource, fallback: Decimal) -> Decimal {
    match source.fetch() {
        Ok(quote) if quote.value >= Decimal::ZERO && quote.value <= Decimal::ONE_HUNDRED => {
            tracing::info!(series = %quote.series, value = %quote.value, "base rate from market data");
            quote.value
        }
        Ok(quote) => {
            tracing::warn!(
                series = %quote.series,
                value = %quote.value,
                "implausible base rate quote; using {fallback}"
            );
            fallback
        }
        Err(e) => {
            tracing::warn!(error = %e, "market data unavailable; using base rate {fallback}");
            fallback
        }
    }
}
