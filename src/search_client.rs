//! Twitter recent search client
//! One request per phrase, no paging. Reports the rate-limit headers of every response
//! Define it as trait and implement it for the testability(using mock)
use std::time::Duration;

use chrono::{DateTime, Duration as DateDuration, NaiveDate, Utc};
use log::{debug, info};
use serde_json::Value;

use crate::config::SearchConfig;
use crate::error::ScoutError;

const SERVICE: &str = "search";
const RATE_LIMIT_REMAINING: &str = "x-rate-limit-remaining";
const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";
const TWEET_FIELDS: &str = "author_id,text,created_at,lang,public_metrics";
const USER_FIELDS: &str = "name,username,profile_image_url,withheld";
/// Added to every rate-limit wait so the next call lands after the window has reset
const RESET_MARGIN_SECS: u64 = 1;
const DEFAULT_WINDOW_DAYS: i64 = 6;

/// Date range of a run, `[start, end)` at midnight UTC
#[derive(Debug, Clone, PartialEq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Resolve the CLI arguments
    /// * start: e.g. 2025-05-01, defaults to 6 days before `today`
    /// * end: e.g. 2025-05-07, defaults to `today`
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        today: NaiveDate,
    ) -> Result<DateWindow, ScoutError> {
        let end = match end {
            Some(end) => parse_date(end)?,
            None => today,
        };
        let start = match start {
            Some(start) => parse_date(start)?,
            None => end - DateDuration::days(DEFAULT_WINDOW_DAYS),
        };
        if start >= end {
            return Err(ScoutError::config(format!(
                "start date {} must be before end date {}",
                start, end
            )));
        }
        Ok(DateWindow { start, end })
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, ScoutError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ScoutError::config(format!("invalid date {}, expected YYYY-MM-DD", raw)))
}

/// It will be attached time and timezone after the date like 2025-05-01T00:00:00Z
fn to_timestamp(date: &NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub phrase: String,
    pub window: DateWindow,
}

impl SearchQuery {
    pub fn new(phrase: &str, window: &DateWindow) -> Self {
        SearchQuery {
            phrase: phrase.to_string(),
            window: window.clone(),
        }
    }

    /// Query parameters of the request, values are encoded by the HTTP client
    pub fn params(&self, business_unit: &str, max_results: u8) -> Vec<(&'static str, String)> {
        vec![
            ("tweet.fields", TWEET_FIELDS.to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", USER_FIELDS.to_string()),
            ("bu", business_unit.to_string()),
            ("query", self.phrase.clone()),
            ("start_time", to_timestamp(&self.window.start)),
            ("end_time", to_timestamp(&self.window.end)),
            ("max_results", max_results.to_string()),
        ]
    }
}

/// Quota signals read from the response headers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimit {
    pub remaining: Option<u64>,
    /// Epoch seconds
    pub reset: Option<i64>,
}

impl RateLimit {
    pub fn parse(remaining: Option<&str>, reset: Option<&str>) -> Self {
        RateLimit {
            remaining: remaining.and_then(|value| value.trim().parse().ok()),
            reset: reset.and_then(|value| value.trim().parse().ok()),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// How long to block before the next query, `None` while quota is left
    /// An unknown reset time counts as "now", leaving only the margin
    pub fn wait_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.is_exhausted() {
            return None;
        }
        let now = now.timestamp();
        let until_reset = self.reset.unwrap_or(now).saturating_sub(now).max(0) as u64;
        Some(Duration::from_secs(until_reset + RESET_MARGIN_SECS))
    }
}

/// One search response, kept raw for the audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPage {
    pub status: u16,
    pub body: Value,
    pub rate_limit: RateLimit,
}

impl SearchPage {
    /// The reason this phrase failed upstream, if it did
    /// `errors` next to `data` only describes missing expansions and is not a failure
    pub fn upstream_error(&self) -> Option<String> {
        if let Some(error) = self.body.get("error") {
            return Some(describe(error));
        }
        if !(200..300).contains(&self.status) {
            let detail = self
                .body
                .get("detail")
                .or_else(|| self.body.get("title"))
                .map(describe)
                .unwrap_or_default();
            return Some(format!("HTTP {} {}", self.status, detail).trim_end().to_string());
        }
        match (self.body.get("errors"), self.body.get("data")) {
            (Some(errors), None) => Some(describe(errors)),
            _ => None,
        }
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
use mockall::automock;
#[cfg_attr(test, automock)]
pub trait SearchClientTrait {
    fn search(&self, query: &SearchQuery) -> Result<SearchPage, ScoutError>;
}

/// Search Client
/// It needs to know the endpoint and the bearer token
pub struct SearchClient {
    agent: ureq::Agent,
    config: SearchConfig,
}

impl SearchClient {
    /// * config: endpoint, token and query bounds
    /// * timeout_secs: read/write timeout of each call
    pub fn new(config: &SearchConfig, timeout_secs: u64) -> Self {
        let agent: ureq::Agent = ureq::AgentBuilder::new()
            .timeout_read(Duration::from_secs(timeout_secs))
            .timeout_write(Duration::from_secs(timeout_secs))
            .build();
        SearchClient {
            agent,
            config: config.clone(),
        }
    }

    fn authorization(&self) -> String {
        let token = self.config.bearer_token.trim();
        if token.starts_with("Bearer ") {
            token.to_string()
        } else {
            format!("Bearer {}", token)
        }
    }
}

impl SearchClientTrait for SearchClient {
    /// Run one recent search
    /// Error statuses still return a page, so the caller can log the payload and read the quota
    fn search(&self, query: &SearchQuery) -> Result<SearchPage, ScoutError> {
        info!(
            "Search \"{}\" from {} to {}",
            query.phrase, query.window.start, query.window.end
        );
        let request = self
            .agent
            .request_url("GET", &self.config.api_base)
            .set("Authorization", &self.authorization());
        let request = query
            .params(&self.config.business_unit, self.config.max_results)
            .iter()
            .fold(request, |request, (key, value)| request.query(key, value));

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                debug!("Search \"{}\" answered with HTTP {}", query.phrase, code);
                response
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(ScoutError::transport(SERVICE, transport.to_string()))
            }
        };

        let status = response.status();
        let rate_limit = RateLimit::parse(
            response.header(RATE_LIMIT_REMAINING),
            response.header(RATE_LIMIT_RESET),
        );
        // proxies answer with HTML, keep the text so the quota headers are not lost
        let text = response
            .into_string()
            .map_err(|e| ScoutError::transport(SERVICE, format!("unreadable body: {}", e)))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        debug!(
            "Got HTTP {} for \"{}\", quota remaining={:?} reset={:?}",
            status, query.phrase, rate_limit.remaining, rate_limit.reset
        );
        Ok(SearchPage {
            status,
            body,
            rate_limit,
        })
    }
}
