use crate::config::env_parse;
use crate::domain::news::Headline;
use crate::news::rss::{FeedClient, FeedEntry};
use chrono::{Duration as DateDuration, NaiveDate};
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_HEADLINES: usize = 5;
const MIN_TITLE_CHARS: usize = 10;
const RECENCY_DAYS: i64 = 3;
const DEFAULT_SOURCE: &str = "Google News";

/// A regional Google News locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub hl: &'static str,
    pub gl: &'static str,
    pub ceid: &'static str,
}

pub const ENDPOINTS: [Endpoint; 3] = [
    Endpoint {
        hl: "en-US",
        gl: "US",
        ceid: "US:en",
    },
    Endpoint {
        hl: "en-IN",
        gl: "IN",
        ceid: "IN:en",
    },
    Endpoint {
        hl: "en",
        gl: "US",
        ceid: "US:en",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub query: String,
    pub endpoint: Endpoint,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {}/{}", self.query, self.endpoint.hl, self.endpoint.gl)
    }
}

/// Randomized pause before each feed request, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min_ms: 500,
            max_ms: 1500,
        }
    }
}

impl DelayRange {
    pub fn none() -> Self {
        Self {
            min_ms: 0,
            max_ms: 0,
        }
    }

    pub fn from_env() -> Self {
        let default = Self::default();
        let min_ms = env_parse::<u64>("NEWS_DELAY_MIN_MS").unwrap_or(default.min_ms);
        let max_ms = env_parse::<u64>("NEWS_DELAY_MAX_MS")
            .unwrap_or(default.max_ms)
            .max(min_ms);
        Self { min_ms, max_ms }
    }

    fn jitter(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        // An inverted range collapses to `max_ms`.
        let lo = self.min_ms.min(self.max_ms);
        let ms = rand::thread_rng().gen_range(lo..=self.max_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_headlines: usize,
    pub delay: DelayRange,
    pub endpoints: Vec<Endpoint>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_headlines: DEFAULT_MAX_HEADLINES,
            delay: DelayRange::default(),
            endpoints: ENDPOINTS.to_vec(),
        }
    }
}

impl SearchOptions {
    pub fn from_env() -> Self {
        Self {
            delay: DelayRange::from_env(),
            ..Self::default()
        }
    }

    pub fn with_max_headlines(mut self, max_headlines: usize) -> Self {
        self.max_headlines = max_headlines;
        self
    }
}

/// Sink fed by [`try_until_satisfied`].
pub trait Accumulator<T> {
    fn absorb(&mut self, item: T);
    fn is_satisfied(&self) -> bool;
}

/// Runs `attempt` over the candidates in order until the accumulator is satisfied.
/// A failed attempt is logged and the next candidate is tried.
pub async fn try_until_satisfied<C, T, A, F, Fut>(candidates: Vec<C>, acc: &mut A, mut attempt: F)
where
    C: fmt::Display,
    A: Accumulator<T>,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<T>>>,
{
    for candidate in candidates {
        if acc.is_satisfied() {
            break;
        }

        let label = candidate.to_string();
        match attempt(candidate).await {
            Ok(items) => {
                for item in items {
                    if acc.is_satisfied() {
                        break;
                    }
                    acc.absorb(item);
                }
            }
            Err(err) => {
                tracing::warn!(candidate = %label, error = %err, "candidate attempt failed; trying next");
            }
        }
    }
}

/// Collects distinct, usable headlines up to a cap.
#[derive(Debug)]
pub struct HeadlineCollector {
    cap: usize,
    seen_links: HashSet<String>,
    headlines: Vec<Headline>,
}

impl HeadlineCollector {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            seen_links: HashSet::new(),
            headlines: Vec::new(),
        }
    }

    pub fn into_headlines(self) -> Vec<Headline> {
        self.headlines
    }
}

impl Accumulator<FeedEntry> for HeadlineCollector {
    fn absorb(&mut self, entry: FeedEntry) {
        let link = entry.link.unwrap_or_default().trim().to_string();
        if link.is_empty() || self.seen_links.contains(&link) {
            return;
        }

        let title = entry.title.unwrap_or_default().trim().to_string();
        if title.chars().count() < MIN_TITLE_CHARS {
            return;
        }

        self.seen_links.insert(link.clone());
        self.headlines.push(Headline {
            title,
            link,
            source: entry.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            published: entry.published.unwrap_or_default(),
            description: entry.description.unwrap_or_default(),
        });
    }

    fn is_satisfied(&self) -> bool {
        self.headlines.len() >= self.cap
    }
}

/// Searches the feed for up to `opts.max_headlines` distinct headlines, widening the
/// query through the fallback variants when the verbatim query comes up short.
pub async fn search(feed: &dyn FeedClient, query: &str, opts: &SearchOptions) -> Vec<Headline> {
    if query.trim().is_empty() || opts.max_headlines == 0 {
        return Vec::new();
    }

    let today = chrono::Local::now().date_naive();
    let plan = candidates(&query_variants(query, today), &opts.endpoints);
    let mut collector = HeadlineCollector::new(opts.max_headlines);
    let delay = opts.delay;

    try_until_satisfied(plan, &mut collector, |c: Candidate| async move {
        let pause = delay.jitter();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
        feed.fetch(&c.query, &c.endpoint).await
    })
    .await;

    let headlines = collector.into_headlines();
    if headlines.len() < opts.max_headlines {
        tracing::info!(
            query,
            found = headlines.len(),
            wanted = opts.max_headlines,
            "news search degraded: fewer headlines than requested"
        );
    }
    headlines
}

/// Variant-major, endpoint-minor.
pub fn candidates(variants: &[String], endpoints: &[Endpoint]) -> Vec<Candidate> {
    variants
        .iter()
        .flat_map(|q| {
            endpoints.iter().map(move |e| Candidate {
                query: q.clone(),
                endpoint: *e,
            })
        })
        .collect()
}

pub fn query_variants(query: &str, today: NaiveDate) -> Vec<String> {
    let entity = entity(query);
    let direction = if query.contains("up") { "up" } else { "down" };
    let since = today - DateDuration::days(RECENCY_DAYS);

    vec![
        query.to_string(),
        format!("\"{entity}\" stock {direction}"),
        format!("\"{entity}\" after:{}", since.format("%Y-%m-%d")),
        format!("\"{entity}\""),
    ]
}

/// The company/entity part of a query: the quoted phrase when one is present, else the
/// first word. Exclusions (` -term`) are ignored.
pub fn entity(query: &str) -> String {
    let base = query.split(" -").next().unwrap_or(query);
    if base.contains('"') {
        let parts: Vec<&str> = base.split('"').collect();
        return parts[parts.len() - 2].to_string();
    }
    base.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn entry(title: &str, link: &str) -> FeedEntry {
        FeedEntry {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            ..FeedEntry::default()
        }
    }

    /// Serves canned entries per (query, endpoint) and records every call.
    struct StubFeed {
        responses: Vec<(String, &'static str, anyhow::Result<Vec<FeedEntry>>)>,
        calls: Mutex<Vec<(String, &'static str)>>,
    }

    impl StubFeed {
        fn new() -> Self {
            Self {
                responses: Vec::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn on(mut self, query: &str, hl: &'static str, res: anyhow::Result<Vec<FeedEntry>>) -> Self {
            self.responses.push((query.to_string(), hl, res));
            self
        }

        fn calls(&self) -> Vec<(String, &'static str)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl FeedClient for StubFeed {
        async fn fetch(&self, query: &str, endpoint: &Endpoint) -> anyhow::Result<Vec<FeedEntry>> {
            self.calls
                .lock()
                .unwrap()
                .push((query.to_string(), endpoint.hl));
            for (q, hl, res) in &self.responses {
                if q == query && *hl == endpoint.hl {
                    return match res {
                        Ok(items) => Ok(items.clone()),
                        Err(e) => Err(anyhow::anyhow!("{e}")),
                    };
                }
            }
            Ok(Vec::new())
        }
    }

    fn opts(max: usize) -> SearchOptions {
        SearchOptions {
            max_headlines: max,
            delay: DelayRange::none(),
            endpoints: ENDPOINTS.to_vec(),
        }
    }

    #[test]
    fn builds_four_variants() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let v = query_variants("\"Reliance\" shares up -cricket", today);
        assert_eq!(
            v,
            vec![
                "\"Reliance\" shares up -cricket".to_string(),
                "\"Reliance\" stock up".to_string(),
                "\"Reliance\" after:2026-01-07".to_string(),
                "\"Reliance\"".to_string(),
            ]
        );

        let v = query_variants("TCS.NS", today);
        assert_eq!(v[1], "\"TCS.NS\" stock down");
        assert_eq!(v[3], "\"TCS.NS\"");
    }

    #[test]
    fn jitter_stays_in_range_and_tolerates_inverted_bounds() {
        let inverted = DelayRange {
            min_ms: 900,
            max_ms: 300,
        };
        for _ in 0..50 {
            assert!(inverted.jitter() <= Duration::from_millis(300));
        }

        let range = DelayRange {
            min_ms: 5,
            max_ms: 10,
        };
        for _ in 0..50 {
            let d = range.jitter();
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(10));
        }

        assert_eq!(DelayRange::none().jitter(), Duration::ZERO);
    }

    #[test]
    fn entity_prefers_quoted_phrase() {
        assert_eq!(entity("\"Tata Motors\" results"), "Tata Motors");
        assert_eq!(entity("INFY.NS earnings"), "INFY.NS");
        assert_eq!(entity(""), "");
    }

    #[test]
    fn candidate_plan_is_variant_major() {
        let plan = candidates(&["a".to_string(), "b".to_string()], &ENDPOINTS);
        assert_eq!(plan.len(), 6);
        assert_eq!(plan[0].query, "a");
        assert_eq!(plan[2].endpoint.hl, "en");
        assert_eq!(plan[3].query, "b");
        assert_eq!(plan[3].endpoint.hl, "en-US");
    }

    #[test]
    fn collector_dedups_and_filters() {
        let mut c = HeadlineCollector::new(10);
        c.absorb(entry("A perfectly fine headline", "l1"));
        c.absorb(entry("A duplicate of the first link", "l1"));
        c.absorb(entry("too short", "l2"));
        c.absorb(entry("Headline without a link", ""));
        c.absorb(FeedEntry {
            title: Some("Headline with missing link".into()),
            ..FeedEntry::default()
        });
        c.absorb(FeedEntry {
            source: Some("Reuters".into()),
            ..entry("Another perfectly fine one", "l3")
        });

        let out = c.into_headlines();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source, "Google News");
        assert_eq!(out[1].source, "Reuters");
    }

    #[tokio::test]
    async fn stops_once_cap_reached() {
        let feed = StubFeed::new().on(
            "INFY.NS",
            "en-US",
            Ok(vec![
                entry("Infosys wins large deal in Europe", "l1"),
                entry("Infosys raises revenue guidance", "l2"),
                entry("Infosys shares extend gains today", "l3"),
            ]),
        );

        let out = search(&feed, "INFY.NS", &opts(2)).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].link, "l1");
        assert_eq!(feed.calls().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_across_endpoints_and_variants_after_failures() {
        let feed = StubFeed::new()
            .on("INFY.NS", "en-US", Err(anyhow::anyhow!("connection reset")))
            .on(
                "INFY.NS",
                "en-IN",
                Ok(vec![entry("Infosys wins large deal in Europe", "l1")]),
            )
            .on(
                "\"INFY.NS\" stock down",
                "en-US",
                Ok(vec![
                    entry("Infosys wins large deal in Europe", "l1"),
                    entry("Infosys slips on weak guidance", "l2"),
                ]),
            );

        let out = search(&feed, "INFY.NS", &opts(2)).await;
        let links: Vec<_> = out.iter().map(|h| h.link.as_str()).collect();
        assert_eq!(links, ["l1", "l2"]);

        let calls = feed.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[3], ("\"INFY.NS\" stock down".to_string(), "en-US"));
    }

    #[tokio::test]
    async fn exhausts_all_candidates_and_returns_what_it_found() {
        let feed = StubFeed::new();
        let out = search(&feed, "HDFCBANK.NS", &opts(5)).await;
        assert!(out.is_empty());
        assert_eq!(feed.calls().len(), 12);
    }

    #[tokio::test]
    async fn zero_cap_makes_no_calls() {
        let feed = StubFeed::new();
        assert!(search(&feed, "ITC.NS", &opts(0)).await.is_empty());
        assert!(feed.calls().is_empty());
    }
}
