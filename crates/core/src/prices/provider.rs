use crate::config::{env_parse, Settings};
use crate::domain::market::{PriceBar, PriceSeries, PriceTable, Ticker};
use crate::prices::types::{ChartResponse, ChartResult};
use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQ_DELAY_MS: u64 = 100;
const DEFAULT_INTERVAL: &str = "1d";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const MAX_LOGGED_FAILURES: usize = 10;

#[async_trait::async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Daily bars for every ticker over the last `window_days` days.
    /// Tickers the provider could not serve are left out of the table.
    async fn fetch_history(&self, tickers: &[Ticker], window_days: u32) -> Result<PriceTable>;

    async fn fetch_series(&self, ticker: &str, window_days: u32) -> Result<PriceSeries> {
        let table = self
            .fetch_history(&[ticker.to_string()], window_days)
            .await?;
        Ok(table
            .series
            .into_iter()
            .find(|s| s.ticker == ticker)
            .unwrap_or_else(|| PriceSeries {
                ticker: ticker.to_string(),
                bars: Vec::new(),
            }))
    }
}

#[derive(Debug, Clone)]
pub struct YahooChartProvider {
    http: reqwest::Client,
    base_url: String,
    interval: String,
    req_delay: Duration,
}

impl YahooChartProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .price_provider_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs =
            env_parse::<u64>("PRICE_PROVIDER_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS);
        let req_delay_ms =
            env_parse::<u64>("PRICE_PROVIDER_REQ_DELAY_MS").unwrap_or(DEFAULT_REQ_DELAY_MS);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build price provider http client")?;

        Ok(Self {
            http,
            base_url,
            interval: DEFAULT_INTERVAL.to_string(),
            req_delay: Duration::from_millis(req_delay_ms),
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}",
            self.base_url.trim_end_matches('/'),
            ticker
        )
    }

    async fn fetch_one(&self, ticker: &str, window_days: u32) -> Result<PriceSeries> {
        let res = self
            .http
            .get(self.url(ticker))
            .query(&[
                ("range", period(window_days)),
                ("interval", self.interval.clone()),
            ])
            .send()
            .await
            .context("price provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read price provider response")?;
        if !status.is_success() {
            anyhow::bail!("price provider HTTP {status}: {text}");
        }

        let parsed = serde_json::from_str::<ChartResponse>(&text)
            .with_context(|| format!("price provider response is not a chart payload: {text}"))?;
        parse_chart(ticker, parsed)
    }
}

#[async_trait::async_trait]
impl PriceHistoryProvider for YahooChartProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn fetch_history(&self, tickers: &[Ticker], window_days: u32) -> Result<PriceTable> {
        let total = tickers.len();
        let mut series = Vec::with_capacity(total);
        let mut failures: usize = 0;

        for (idx, ticker) in tickers.iter().enumerate() {
            if idx != 0 && !self.req_delay.is_zero() {
                tokio::time::sleep(self.req_delay).await;
            }

            match self.fetch_one(ticker, window_days).await {
                Ok(s) => series.push(s),
                Err(err) => {
                    failures += 1;
                    if failures <= MAX_LOGGED_FAILURES {
                        tracing::warn!(
                            idx,
                            %ticker,
                            failure_count = failures,
                            error = %err,
                            "price history fetch failed; skipping ticker"
                        );
                    }
                }
            }
        }

        tracing::info!(
            requested = total,
            fetched = series.len(),
            failures,
            window_days,
            "price history batch fetched"
        );

        Ok(PriceTable { series })
    }
}

/// Period string understood by the provider, e.g. `7d`.
pub fn period(window_days: u32) -> String {
    format!("{window_days}d")
}

pub(crate) fn parse_chart(ticker: &str, resp: ChartResponse) -> Result<PriceSeries> {
    if let Some(err) = resp.chart.error {
        anyhow::bail!("chart error for {ticker}: {} {}", err.code, err.description);
    }

    let result = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .with_context(|| format!("chart payload for {ticker} has no result"))?;

    Ok(PriceSeries {
        ticker: ticker.to_string(),
        bars: bars_from_result(result),
    })
}

fn bars_from_result(result: ChartResult) -> Vec<PriceBar> {
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let opens = quote.open.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let timestamp = Utc.timestamp_opt(*ts, 0).single()?;
            Some(PriceBar {
                timestamp,
                open: opens.get(i).copied().flatten(),
                close: closes.get(i).copied().flatten(),
            })
        })
        .collect()
}
