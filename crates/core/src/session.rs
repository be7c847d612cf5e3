//! Per-user session state: the last movers snapshot, the detail-view selection and a
//! read-through price cache.

use crate::domain::market::{MoversReport, PriceSeries, Ticker};
use crate::prices::PriceHistoryProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ticker", rename_all = "snake_case")]
pub enum SelectionEvent {
    /// Movers were recomputed; every dropdown goes back to its placeholder.
    Refreshed,
    /// `None` is the dropdown placeholder.
    GainerPicked(Option<Ticker>),
    LoserPicked(Option<Ticker>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub gainer: Option<Ticker>,
    pub loser: Option<Ticker>,
    pub detail: Option<Ticker>,
}

impl Selection {
    pub fn apply(self, event: SelectionEvent) -> Selection {
        match event {
            SelectionEvent::Refreshed => Selection::default(),
            SelectionEvent::GainerPicked(Some(t)) => Selection {
                gainer: Some(t.clone()),
                detail: Some(t),
                ..self
            },
            SelectionEvent::GainerPicked(None) => Selection {
                gainer: None,
                ..self
            },
            SelectionEvent::LoserPicked(Some(t)) => Selection {
                loser: Some(t.clone()),
                detail: Some(t),
                ..self
            },
            SelectionEvent::LoserPicked(None) => Selection {
                loser: None,
                ..self
            },
        }
    }
}

#[derive(Debug, Clone)]
struct CachedSeries {
    window_days: u32,
    series: PriceSeries,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoversSnapshot {
    pub report: MoversReport,
    pub refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Session {
    price_cache: HashMap<Ticker, CachedSeries>,
    snapshot: Option<MoversSnapshot>,
    selection: Selection,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&MoversSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_movers(&mut self, report: MoversReport) {
        self.snapshot = Some(MoversSnapshot {
            report,
            refreshed_at: Utc::now(),
        });
        self.dispatch(SelectionEvent::Refreshed);
    }

    pub fn dispatch(&mut self, event: SelectionEvent) -> &Selection {
        let current = std::mem::take(&mut self.selection);
        self.selection = current.apply(event);
        &self.selection
    }

    /// The ticker chosen for the detail view, if it is part of the current snapshot.
    pub fn detail_choice(&self) -> Option<&str> {
        let chosen = self.selection.detail.as_deref()?;
        let snapshot = self.snapshot.as_ref()?;
        snapshot.report.contains(chosen).then_some(chosen)
    }

    /// Returns the cached series for `(ticker, window_days)` or fetches and caches it.
    /// A cached entry for a different window is replaced. Empty series are not cached.
    pub async fn cached_series(
        &mut self,
        provider: &dyn PriceHistoryProvider,
        ticker: &str,
        window_days: u32,
    ) -> anyhow::Result<PriceSeries> {
        if let Some(hit) = self.price_cache.get(ticker) {
            if hit.window_days == window_days {
                return Ok(hit.series.clone());
            }
        }

        let series = provider.fetch_series(ticker, window_days).await?;
        if series.is_empty() {
            self.price_cache.remove(ticker);
        } else {
            self.price_cache.insert(
                ticker.to_string(),
                CachedSeries {
                    window_days,
                    series: series.clone(),
                },
            );
        }
        Ok(series)
    }

    pub fn cached_window(&self, ticker: &str) -> Option<u32> {
        self.price_cache.get(ticker).map(|c| c.window_days)
    }
}
