use crate::domain::market::{ChartBounds, PriceSeries, Ticker};
use crate::domain::news::ScoredHeadline;
use crate::error::{AnalysisError, Result};
use crate::llm::TextGenerator;
use crate::narrative::{self, ChangeSign};
use crate::news::{self, FeedClient, SearchOptions};
use crate::prices::PriceHistoryProvider;
use crate::sentiment::{self, SentimentModel};
use crate::session::{MoversSnapshot, Session};
use crate::{movers, universe};
use serde::Serialize;

const DETAIL_MAX_HEADLINES: usize = 6;
const DETAIL_DISPLAY_HEADLINES: usize = 3;
const CHART_PADDING_RATIO: f64 = 0.08;
const CHART_MIN_PADDING: f64 = 0.5;

/// External collaborators used by one user action.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub prices: &'a dyn PriceHistoryProvider,
    pub feed: &'a dyn FeedClient,
    pub sentiment: &'a dyn SentimentModel,
    pub generator: Option<&'a dyn TextGenerator>,
}

#[derive(Debug, Clone)]
pub struct DetailOptions {
    pub search: SearchOptions,
    /// How many of the scored headlines are shown and considered for the explanation.
    pub display_headlines: usize,
}

impl Default for DetailOptions {
    fn default() -> Self {
        Self {
            search: SearchOptions::default().with_max_headlines(DETAIL_MAX_HEADLINES),
            display_headlines: DETAIL_DISPLAY_HEADLINES,
        }
    }
}

impl DetailOptions {
    pub fn from_env() -> Self {
        Self {
            search: SearchOptions::from_env().with_max_headlines(DETAIL_MAX_HEADLINES),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StockDetail {
    pub ticker: Ticker,
    pub symbol: String,
    pub company: String,
    pub change_pct: f64,
    pub window_days: u32,
    pub prices: PriceSeries,
    pub chart: Option<ChartBounds>,
    pub headlines: Vec<ScoredHeadline>,
    pub selected: Option<ScoredHeadline>,
    pub explanation: String,
}

/// Recomputes the movers for the session and resets its selection.
pub async fn refresh_movers<'s>(
    session: &'s mut Session,
    prices: &dyn PriceHistoryProvider,
    tickers: &[Ticker],
    window_days: u32,
    top_n: usize,
) -> Result<&'s MoversSnapshot> {
    let report = movers::rank(prices, tickers, window_days, top_n).await?;
    tracing::info!(
        provider = prices.provider_name(),
        window_days,
        ranked = report.ranked.len(),
        "movers refreshed"
    );

    session.set_movers(report);
    session
        .snapshot()
        .ok_or_else(|| AnalysisError::DataUnavailable("no movement data available".into()))
}

/// Session-dependent half of a detail view: the move from the current snapshot and the
/// cached price series.
#[derive(Debug, Clone)]
pub struct PricedStock {
    pub ticker: Ticker,
    pub change_pct: f64,
    pub window_days: u32,
    pub prices: PriceSeries,
    pub chart: ChartBounds,
}

/// Builds the detail panel for one ticker of the current snapshot: price series, scored
/// headlines and the explanation of the move.
pub async fn inspect_stock(
    session: &mut Session,
    deps: Collaborators<'_>,
    ticker: &str,
    opts: &DetailOptions,
) -> Result<StockDetail> {
    let priced = price_stock(session, deps.prices, ticker).await?;
    Ok(explain_stock(priced, deps, opts).await)
}

pub async fn price_stock(
    session: &mut Session,
    prices: &dyn PriceHistoryProvider,
    ticker: &str,
) -> Result<PricedStock> {
    let (change_pct, window_days) = {
        let snapshot = session
            .snapshot()
            .ok_or_else(|| AnalysisError::DataUnavailable("movers have not been computed yet".into()))?;
        let change = snapshot
            .report
            .change_of(ticker)
            .ok_or_else(|| AnalysisError::UnknownTicker(ticker.to_string()))?;
        (change, snapshot.report.window_days)
    };

    let series = session
        .cached_series(prices, ticker, window_days)
        .await
        .map_err(|e| AnalysisError::DataUnavailable(format!("{e:#}")))?;
    let chart = chart_bounds(&series).ok_or_else(|| {
        AnalysisError::DataUnavailable(format!("no closing prices for {ticker}"))
    })?;

    Ok(PricedStock {
        ticker: ticker.to_string(),
        change_pct,
        window_days,
        prices: series,
        chart,
    })
}

/// News, sentiment and narrative for an already priced stock. Needs no session.
pub async fn explain_stock(
    priced: PricedStock,
    deps: Collaborators<'_>,
    opts: &DetailOptions,
) -> StockDetail {
    let PricedStock {
        ticker,
        change_pct,
        window_days,
        prices,
        chart,
    } = priced;

    let found = news::search(deps.feed, &ticker, &opts.search).await;
    let mut headlines = sentiment::score_headlines(deps.sentiment, found).await;
    headlines.truncate(opts.display_headlines);

    let selected = narrative::select(&headlines, ChangeSign::from_change(change_pct)).cloned();
    let explanation =
        narrative::explain(&ticker, change_pct, selected.as_ref(), deps.generator).await;

    StockDetail {
        symbol: universe::display_symbol(&ticker).to_string(),
        company: universe::company_name(&ticker).to_string(),
        ticker,
        change_pct,
        window_days,
        prices,
        chart: Some(chart),
        headlines,
        selected,
        explanation,
    }
}

/// Y-axis range of the close series with proportional padding.
pub fn chart_bounds(series: &PriceSeries) -> Option<ChartBounds> {
    let (min, max) = series.closes().fold(None, |acc, c| match acc {
        None => Some((c, c)),
        Some((lo, hi)) => Some((f64::min(lo, c), f64::max(hi, c))),
    })?;

    let padding = ((max - min) * CHART_PADDING_RATIO).max(CHART_MIN_PADDING);
    Some(ChartBounds {
        y_min: min - padding,
        y_max: max + padding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::PriceBar;
    use crate::domain::news::SentimentLabel;
    use crate::news::rss::FeedEntry;
    use crate::news::search::{DelayRange, Endpoint};
    use crate::sentiment::testing::StubModel;
    use crate::session::testing::StubPrices;
    use chrono::{TimeZone, Utc};

    struct CannedFeed(Vec<FeedEntry>);

    #[async_trait::async_trait]
    impl FeedClient for CannedFeed {
        async fn fetch(&self, _query: &str, _endpoint: &Endpoint) -> anyhow::Result<Vec<FeedEntry>> {
            Ok(self.0.clone())
        }
    }

    fn entry(title: &str, link: &str) -> FeedEntry {
        FeedEntry {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            source: Some("Reuters".into()),
            ..FeedEntry::default()
        }
    }

    fn opts() -> DetailOptions {
        DetailOptions {
            search: SearchOptions {
                delay: DelayRange::none(),
                ..SearchOptions::default().with_max_headlines(DETAIL_MAX_HEADLINES)
            },
            display_headlines: DETAIL_DISPLAY_HEADLINES,
        }
    }

    fn tickers(v: &[&str]) -> Vec<Ticker> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn refresh_then_inspect_selects_most_negative_headline_for_a_drop() {
        let prices = StubPrices::new(&[("A", 100.0, 110.0), ("B", 50.0, 45.0), ("C", 10.0, 10.0)]);
        let feed = CannedFeed(vec![
            entry("B Corp wins a small contract", "l1"),
            entry("B Corp faces regulator inquiry", "l2"),
            entry("B Corp shares slide on guidance", "l3"),
            entry("B Corp annual meeting scheduled", "l4"),
        ]);
        let model = StubModel::new(&[
            ("B Corp wins a small contract", [0.1, 0.3, 0.6]),
            ("B Corp faces regulator inquiry", [0.8, 0.15, 0.05]),
            ("B Corp shares slide on guidance", [0.6, 0.3, 0.1]),
            ("B Corp annual meeting scheduled", [0.95, 0.05, 0.0]),
        ]);

        let mut session = Session::new();
        let snapshot = refresh_movers(&mut session, &prices, &tickers(&["A", "B", "C"]), 7, 1)
            .await
            .unwrap();
        assert_eq!(snapshot.report.gainers[0].ticker, "A");
        assert_eq!(snapshot.report.losers[0].ticker, "B");

        let deps = Collaborators {
            prices: &prices,
            feed: &feed,
            sentiment: &model,
            generator: None,
        };
        let detail = inspect_stock(&mut session, deps, "B", &opts()).await.unwrap();

        assert_eq!(detail.change_pct, -10.0);
        // Only the first three scored headlines are shown and considered.
        assert_eq!(detail.headlines.len(), 3);
        let selected = detail.selected.as_ref().unwrap();
        assert_eq!(selected.headline.link, "l2");
        assert_eq!(selected.sentiment_label, SentimentLabel::Negative);
        assert!(detail.explanation.contains("B fell 10.00%"));
        assert!(detail.explanation.contains("B Corp faces regulator inquiry"));
    }

    #[tokio::test]
    async fn inspect_reuses_cached_prices_within_a_window() {
        let prices = StubPrices::new(&[("A", 100.0, 110.0)]);
        let feed = CannedFeed(Vec::new());
        let model = StubModel::new(&[]);
        let deps = Collaborators {
            prices: &prices,
            feed: &feed,
            sentiment: &model,
            generator: None,
        };

        let mut session = Session::new();
        refresh_movers(&mut session, &prices, &tickers(&["A"]), 7, 5)
            .await
            .unwrap();
        let fetches_after_refresh = prices.fetch_count();

        let first = inspect_stock(&mut session, deps, "A", &opts()).await.unwrap();
        inspect_stock(&mut session, deps, "A", &opts()).await.unwrap();
        assert_eq!(prices.fetch_count(), fetches_after_refresh + 1);

        assert!(first.headlines.is_empty());
        assert!(first.selected.is_none());
        assert!(first.explanation.contains("No recent news"));
    }

    #[tokio::test]
    async fn unknown_ticker_and_missing_snapshot_are_reported() {
        let prices = StubPrices::new(&[("A", 100.0, 110.0)]);
        let feed = CannedFeed(Vec::new());
        let model = StubModel::new(&[]);
        let deps = Collaborators {
            prices: &prices,
            feed: &feed,
            sentiment: &model,
            generator: None,
        };

        let mut session = Session::new();
        let err = inspect_stock(&mut session, deps, "A", &opts()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(_)));

        refresh_movers(&mut session, &prices, &tickers(&["A"]), 7, 5)
            .await
            .unwrap();
        let err = inspect_stock(&mut session, deps, "Z", &opts()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::UnknownTicker(_)));
    }

    #[tokio::test]
    async fn explain_runs_without_the_session_after_pricing() {
        let prices = StubPrices::new(&[("A", 100.0, 110.0)]);
        let feed = CannedFeed(vec![entry("A Corp beats quarterly estimates", "l1")]);
        let model = StubModel::new(&[("A Corp beats quarterly estimates", [0.05, 0.15, 0.8])]);
        let deps = Collaborators {
            prices: &prices,
            feed: &feed,
            sentiment: &model,
            generator: None,
        };

        let mut session = Session::new();
        refresh_movers(&mut session, &prices, &tickers(&["A"]), 7, 5)
            .await
            .unwrap();
        let priced = price_stock(&mut session, &prices, "A").await.unwrap();
        drop(session);

        assert_eq!(priced.change_pct, 10.0);
        let detail = explain_stock(priced, deps, &opts()).await;
        assert_eq!(detail.window_days, 7);
        assert_eq!(detail.selected.unwrap().headline.link, "l1");
        assert!(detail.explanation.contains("A rose 10.00%"));
    }

    #[tokio::test]
    async fn refresh_with_no_rows_is_data_unavailable() {
        let prices = StubPrices::new(&[]);
        let mut session = Session::new();
        let err = refresh_movers(&mut session, &prices, &tickers(&["A"]), 7, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(_)));
        assert!(session.snapshot().is_none());
    }

    #[test]
    fn chart_bounds_pad_by_ratio_with_floor() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        let bar = |close: f64| PriceBar {
            timestamp: t0,
            open: None,
            close: Some(close),
        };

        let wide = PriceSeries {
            ticker: "A".into(),
            bars: vec![bar(100.0), bar(200.0)],
        };
        let b = chart_bounds(&wide).unwrap();
        assert!((b.y_min - 92.0).abs() < 1e-9);
        assert!((b.y_max - 208.0).abs() < 1e-9);

        let flat = PriceSeries {
            ticker: "A".into(),
            bars: vec![bar(10.0), bar(10.0)],
        };
        let b = chart_bounds(&flat).unwrap();
        assert_eq!((b.y_min, b.y_max), (9.5, 10.5));

        let empty = PriceSeries {
            ticker: "A".into(),
            bars: Vec::new(),
        };
        assert!(chart_bounds(&empty).is_none());
    }
}
