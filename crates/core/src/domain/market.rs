use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type Ticker = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: Option<f64>,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: Ticker,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Open of the first bar and close of the last bar, when both are usable.
    pub fn open_close(&self) -> Option<(f64, f64)> {
        let open = self.bars.first()?.open?;
        let close = self.bars.last()?.close?;
        Some((open, close))
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars
            .iter()
            .filter_map(|b| b.close)
            .filter(|c| c.is_finite())
    }
}

/// Batched price history for a set of tickers over one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub series: Vec<PriceSeries>,
}

impl PriceTable {
    pub fn row_count(&self) -> usize {
        self.series.iter().map(|s| s.bars.len()).sum()
    }

    pub fn has_open_close(&self) -> bool {
        self.series
            .iter()
            .flat_map(|s| s.bars.iter())
            .any(|b| b.open.is_some() && b.close.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementRecord {
    pub ticker: Ticker,
    pub change_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoversReport {
    pub window_days: u32,
    pub gainers: Vec<MovementRecord>,
    pub losers: Vec<MovementRecord>,
    pub all: BTreeMap<Ticker, f64>,
    /// Every valid record, sorted by change descending.
    pub ranked: Vec<MovementRecord>,
}

impl MoversReport {
    pub fn change_of(&self, ticker: &str) -> Option<f64> {
        self.all.get(ticker).copied()
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.all.contains_key(ticker)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPulse {
    pub top_gainer: MovementRecord,
    pub top_loser: MovementRecord,
    pub avg_move: f64,
    /// Sample standard deviation of the moves; `None` with fewer than two records.
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartBounds {
    pub y_min: f64,
    pub y_max: f64,
}
