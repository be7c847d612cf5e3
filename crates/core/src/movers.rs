use crate::domain::market::{MarketPulse, MovementRecord, MoversReport, PriceTable, Ticker};
use crate::error::{AnalysisError, Result};
use crate::prices::PriceHistoryProvider;
use crate::universe;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const MAX_WINDOW_DAYS: u32 = 30;

/// Fetches a batched price history and ranks every ticker by its change over the window.
pub async fn rank(
    provider: &dyn PriceHistoryProvider,
    tickers: &[Ticker],
    window_days: u32,
    top_n: usize,
) -> Result<MoversReport> {
    validate(window_days, top_n)?;

    let table = provider
        .fetch_history(tickers, window_days)
        .await
        .map_err(|e| AnalysisError::DataUnavailable(format!("{e:#}")))?;

    rank_table(&table, window_days, top_n)
}

pub fn rank_table(table: &PriceTable, window_days: u32, top_n: usize) -> Result<MoversReport> {
    validate(window_days, top_n)?;

    if table.row_count() == 0 {
        return Err(AnalysisError::DataUnavailable("no price rows returned".into()));
    }
    if !table.has_open_close() {
        return Err(AnalysisError::DataUnavailable(
            "price rows lack open/close fields".into(),
        ));
    }

    // Ordering uses the unrounded change; rounding only applies to the reported values.
    let mut moves: Vec<(&Ticker, f64)> = table
        .series
        .iter()
        .filter_map(|s| {
            let change = s.open_close().and_then(|(o, c)| raw_change_pct(o, c));
            if change.is_none() {
                tracing::debug!(ticker = %s.ticker, "no usable open/close; excluded from ranking");
            }
            change.map(|pct| (&s.ticker, pct))
        })
        .collect();

    moves.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut bottom: Vec<(&Ticker, f64)> = moves.iter().rev().take(top_n).copied().collect();
    bottom.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let ranked: Vec<MovementRecord> = moves.iter().map(rounded_record).collect();
    let gainers: Vec<MovementRecord> = moves.iter().take(top_n).map(rounded_record).collect();
    let losers: Vec<MovementRecord> = bottom.iter().map(rounded_record).collect();

    let all: BTreeMap<Ticker, f64> = ranked
        .iter()
        .map(|r| (r.ticker.clone(), r.change_pct))
        .collect();

    Ok(MoversReport {
        window_days,
        gainers,
        losers,
        all,
        ranked,
    })
}

/// Percentage change from `open_first` to `close_last`, rounded to 2 decimals.
/// `None` when the denominator is zero or either price is not finite.
pub fn change_pct(open_first: f64, close_last: f64) -> Option<f64> {
    raw_change_pct(open_first, close_last).map(round2)
}

fn rounded_record(&(ticker, pct): &(&Ticker, f64)) -> MovementRecord {
    MovementRecord {
        ticker: ticker.clone(),
        change_pct: round2(pct),
    }
}

fn raw_change_pct(open_first: f64, close_last: f64) -> Option<f64> {
    if !open_first.is_finite() || !close_last.is_finite() || open_first == 0.0 {
        return None;
    }
    let pct = (close_last - open_first) / open_first * 100.0;
    pct.is_finite().then_some(pct)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn market_pulse(report: &MoversReport) -> Option<MarketPulse> {
    let top_gainer = report.ranked.first()?.clone();
    let top_loser = report.ranked.last()?.clone();

    let n = report.ranked.len() as f64;
    let mean = report.ranked.iter().map(|r| r.change_pct).sum::<f64>() / n;

    let volatility = (report.ranked.len() >= 2).then(|| {
        let var = report
            .ranked
            .iter()
            .map(|r| (r.change_pct - mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        round2(var.sqrt())
    });

    Some(MarketPulse {
        top_gainer,
        top_loser,
        avg_move: round2(mean),
        volatility,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub ticker: String,
    pub company: String,
    pub change: String,
}

pub fn summary_rows(records: &[MovementRecord]) -> Vec<SummaryRow> {
    records
        .iter()
        .map(|r| SummaryRow {
            ticker: universe::display_symbol(&r.ticker).to_string(),
            company: universe::company_name(&r.ticker).to_string(),
            change: format_change(r.change_pct),
        })
        .collect()
}

/// Dropdown label, e.g. `RELIANCE (+2.31%)`.
pub fn mover_label(record: &MovementRecord) -> String {
    format!(
        "{} ({})",
        universe::display_symbol(&record.ticker),
        format_change(record.change_pct)
    )
}

pub fn format_change(pct: f64) -> String {
    format!("{pct:+.2}%")
}

fn validate(window_days: u32, top_n: usize) -> Result<()> {
    if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
        return Err(AnalysisError::InvalidInput(format!(
            "window_days must be 1..={MAX_WINDOW_DAYS} (got {window_days})"
        )));
    }
    if top_n == 0 {
        return Err(AnalysisError::InvalidInput("top_n must be >= 1".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{PriceBar, PriceSeries};
    use chrono::{Duration, TimeZone, Utc};

    fn series(ticker: &str, open: Option<f64>, close: Option<f64>) -> PriceSeries {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
        PriceSeries {
            ticker: ticker.to_string(),
            bars: vec![
                PriceBar {
                    timestamp: t0,
                    open,
                    close: Some(1.0),
                },
                PriceBar {
                    timestamp: t0 + Duration::days(1),
                    open: Some(1.0),
                    close,
                },
            ],
        }
    }

    fn table(rows: &[(&str, Option<f64>, Option<f64>)]) -> PriceTable {
        PriceTable {
            series: rows.iter().map(|(t, o, c)| series(t, *o, *c)).collect(),
        }
    }

    #[test]
    fn ranks_end_to_end_scenario() {
        let t = table(&[
            ("A", Some(100.0), Some(110.0)),
            ("B", Some(50.0), Some(45.0)),
            ("C", Some(10.0), Some(10.0)),
        ]);

        let report = rank_table(&t, 7, 1).unwrap();
        assert_eq!(report.change_of("A"), Some(10.0));
        assert_eq!(report.change_of("B"), Some(-10.0));
        assert_eq!(report.change_of("C"), Some(0.0));
        assert_eq!(
            report.gainers,
            vec![MovementRecord {
                ticker: "A".into(),
                change_pct: 10.0
            }]
        );
        assert_eq!(
            report.losers,
            vec![MovementRecord {
                ticker: "B".into(),
                change_pct: -10.0
            }]
        );
    }

    #[test]
    fn gainers_descend_and_losers_ascend() {
        let t = table(&[
            ("A", Some(100.0), Some(103.0)),
            ("B", Some(100.0), Some(90.0)),
            ("C", Some(100.0), Some(120.0)),
            ("D", Some(100.0), Some(95.0)),
            ("E", Some(100.0), Some(70.0)),
        ]);

        let report = rank_table(&t, 7, 2).unwrap();
        let gainers: Vec<_> = report.gainers.iter().map(|r| r.ticker.as_str()).collect();
        let losers: Vec<_> = report.losers.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(gainers, ["C", "A"]);
        assert_eq!(losers, ["E", "B"]);
        assert!(report
            .ranked
            .windows(2)
            .all(|w| w[0].change_pct >= w[1].change_pct));
    }

    #[test]
    fn near_ties_order_by_unrounded_change() {
        let t = table(&[
            ("A", Some(100.0), Some(101.231)),
            ("B", Some(100.0), Some(101.234)),
            ("C", Some(100.0), Some(90.0)),
            ("D", Some(100.0), Some(89.996)),
        ]);

        let report = rank_table(&t, 7, 1).unwrap();
        assert_eq!(
            report.gainers,
            vec![MovementRecord {
                ticker: "B".into(),
                change_pct: 1.23
            }]
        );
        assert_eq!(
            report.losers,
            vec![MovementRecord {
                ticker: "D".into(),
                change_pct: -10.0
            }]
        );
        let order: Vec<_> = report.ranked.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(order, ["B", "A", "C", "D"]);
        assert_eq!(report.change_of("A"), Some(1.23));
    }

    #[test]
    fn excludes_zero_and_missing_denominators() {
        let t = table(&[
            ("A", Some(100.0), Some(110.0)),
            ("ZERO", Some(0.0), Some(5.0)),
            ("NOOPEN", None, Some(5.0)),
            ("NOCLOSE", Some(5.0), None),
        ]);

        let report = rank_table(&t, 7, 5).unwrap();
        assert_eq!(report.ranked.len(), 1);
        assert!(!report.contains("ZERO"));
        assert!(!report.contains("NOOPEN"));
        assert!(!report.contains("NOCLOSE"));
    }

    #[test]
    fn empty_table_is_data_unavailable() {
        let err = rank_table(&PriceTable::default(), 7, 5).unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(_)));
    }

    #[test]
    fn rows_without_open_close_are_data_unavailable() {
        let t = table(&[("A", None, None)]);
        let err = rank_table(&t, 7, 5).unwrap_err();
        assert!(matches!(err, AnalysisError::DataUnavailable(_)));
    }

    #[test]
    fn rejects_out_of_range_window() {
        let t = table(&[("A", Some(1.0), Some(2.0))]);
        assert!(matches!(
            rank_table(&t, 0, 5),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            rank_table(&t, 31, 5),
            Err(AnalysisError::InvalidInput(_))
        ));
        assert!(matches!(
            rank_table(&t, 7, 0),
            Err(AnalysisError::InvalidInput(_))
        ));
    }

    #[test]
    fn ranking_is_idempotent() {
        let t = table(&[
            ("A", Some(100.0), Some(101.0)),
            ("B", Some(100.0), Some(101.0)),
            ("C", Some(100.0), Some(99.0)),
        ]);
        assert_eq!(rank_table(&t, 7, 2).unwrap(), rank_table(&t, 7, 2).unwrap());
    }

    #[test]
    fn pulse_summarises_moves() {
        let t = table(&[
            ("A", Some(100.0), Some(110.0)),
            ("B", Some(50.0), Some(45.0)),
            ("C", Some(10.0), Some(10.0)),
        ]);
        let report = rank_table(&t, 7, 1).unwrap();
        let pulse = market_pulse(&report).unwrap();
        assert_eq!(pulse.top_gainer.ticker, "A");
        assert_eq!(pulse.top_loser.ticker, "B");
        assert_eq!(pulse.avg_move, 0.0);
        assert_eq!(pulse.volatility, Some(10.0));
    }

    #[test]
    fn labels_use_display_symbol_and_signed_change() {
        let r = MovementRecord {
            ticker: "RELIANCE.NS".into(),
            change_pct: 2.3149,
        };
        assert_eq!(mover_label(&r), "RELIANCE (+2.31%)");
        let rows = summary_rows(&[r]);
        assert_eq!(rows[0].company, "Reliance Industries");
        assert_eq!(format_change(-4.0), "-4.00%");
    }
}
