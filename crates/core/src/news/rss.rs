use crate::config::{env_parse, non_empty_var};
use crate::news::search::Endpoint;
use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://news.google.com/rss/search";
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// One `<item>` of an RSS feed. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub source: Option<String>,
    pub published: Option<String>,
    pub description: Option<String>,
}

#[async_trait::async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch(&self, query: &str, endpoint: &Endpoint) -> Result<Vec<FeedEntry>>;
}

#[derive(Debug, Clone)]
pub struct GoogleNewsRss {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleNewsRss {
    pub fn from_env() -> Result<Self> {
        let base_url =
            non_empty_var("NEWS_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs = env_parse::<u64>("NEWS_TIMEOUT_SECS").unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build news http client")?;

        Ok(Self { http, base_url })
    }
}

#[async_trait::async_trait]
impl FeedClient for GoogleNewsRss {
    async fn fetch(&self, query: &str, endpoint: &Endpoint) -> Result<Vec<FeedEntry>> {
        let cache_buster = chrono::Utc::now().timestamp().to_string();
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("q", query),
                ("hl", endpoint.hl),
                ("gl", endpoint.gl),
                ("ceid", endpoint.ceid),
                ("_", cache_buster.as_str()),
            ])
            .send()
            .await
            .context("news feed request failed")?;

        let status = res.status();
        let body = res.text().await.context("failed to read news feed body")?;
        if !status.is_success() {
            anyhow::bail!("news feed HTTP {status}");
        }

        Ok(parse_items(&body))
    }
}

/// Extracts `<item>` blocks from an RSS 2.0 document.
pub fn parse_items(xml: &str) -> Vec<FeedEntry> {
    let mut out = Vec::new();
    let mut rest = xml;

    while let Some(start) = find_open_tag(rest, "item") {
        let after = &rest[start..];
        let Some(end) = after.find("</item>") else {
            break;
        };
        let block = &after[..end];

        out.push(FeedEntry {
            title: tag_text(block, "title"),
            link: tag_text(block, "link"),
            source: tag_text(block, "source"),
            published: tag_text(block, "pubDate"),
            description: tag_text(block, "description"),
        });

        rest = &after[end + "</item>".len()..];
    }

    out
}

// Position of `<name>` or `<name attr=...>`, skipping tags that merely share the prefix.
fn find_open_tag(haystack: &str, name: &str) -> Option<usize> {
    let needle = format!("<{name}");
    let mut offset = 0;
    while let Some(pos) = haystack[offset..].find(&needle) {
        let at = offset + pos;
        let next = haystack[at + needle.len()..].chars().next();
        match next {
            Some('>') | Some('/') => return Some(at),
            Some(c) if c.is_whitespace() => return Some(at),
            _ => offset = at + needle.len(),
        }
    }
    None
}

fn tag_text(block: &str, name: &str) -> Option<String> {
    let start = find_open_tag(block, name)?;
    let open_end = start + block[start..].find('>')?;
    if block[..open_end].ends_with('/') {
        return Some(String::new());
    }

    let inner_start = open_end + 1;
    let close = format!("</{name}>");
    let inner_len = block[inner_start..].find(&close)?;
    let inner = &block[inner_start..inner_start + inner_len];

    Some(unescape(strip_cdata(inner.trim())).trim().to_string())
}

fn strip_cdata(s: &str) -> &str {
    s.strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(s)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            decode_entity(entity).map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
