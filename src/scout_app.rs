//! App module and interface between CLI and the search/store clients
//! pub methods are expected to call from [`#main`]
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::clock::ClockTrait;
use crate::dedup_store::DedupStoreTrait;
use crate::error::ScoutError;
use crate::group_resolver::GroupResolver;
use crate::kv_client::KvClientTrait;
use crate::normalizer::{normalize, Normalized, SkipReason};
use crate::search_client::{DateWindow, RateLimit, SearchClientTrait, SearchQuery};
use crate::twitter_object::{status_url, EnrichedPost, SearchResponse};

/// Split a group's keyword string into its phrases
/// Blank phrases are dropped and a repeated phrase is only searched once
pub fn split_phrases(keywords: &str) -> Vec<String> {
    let mut phrases: Vec<String> = Vec::new();
    for phrase in keywords.split(',').map(str::trim) {
        if !phrase.is_empty() && !phrases.iter().any(|known| known == phrase) {
            phrases.push(phrase.to_string());
        }
    }
    phrases
}

/// What happened to one post
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Stored,
    Duplicate,
    Skipped(SkipReason),
    Error(String),
}

/// Counters of one phrase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhraseReport {
    pub phrase: String,
    pub stored: usize,
    pub duplicate: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Set when the phrase failed as a whole
    pub failure: Option<String>,
}

impl PhraseReport {
    fn new(phrase: &str) -> Self {
        PhraseReport {
            phrase: phrase.to_string(),
            ..PhraseReport::default()
        }
    }

    fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Stored => self.stored += 1,
            Disposition::Duplicate => self.duplicate += 1,
            Disposition::Skipped(_) => self.skipped += 1,
            Disposition::Error(_) => self.errors += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub phrases: usize,
    pub failed_phrases: usize,
    pub stored: usize,
    pub duplicate: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Result of one run
/// `keyword_searches` is the audit trail: phrase -> raw response, `{}` when nothing came back
#[derive(Debug, Default, Serialize)]
pub struct Batch {
    pub keyword_searches: Map<String, Value>,
    #[serde(skip)]
    pub reports: Vec<PhraseReport>,
}

impl Batch {
    fn push(&mut self, entry: Value, report: PhraseReport) {
        self.keyword_searches.insert(report.phrase.clone(), entry);
        self.reports.push(report);
    }

    pub fn summary(&self) -> RunSummary {
        self.reports
            .iter()
            .fold(RunSummary::default(), |mut summary, report| {
                summary.phrases += 1;
                if report.failure.is_some() {
                    summary.failed_phrases += 1;
                }
                summary.stored += report.stored;
                summary.duplicate += report.duplicate;
                summary.skipped += report.skipped;
                summary.errors += report.errors;
                summary
            })
    }
}

/// Drives one run: search each phrase in order, store new posts, collect the raw responses
pub struct Ingestor<'a, S, D, C>
where
    S: SearchClientTrait,
    D: DedupStoreTrait,
    C: ClockTrait,
{
    search: &'a S,
    store: &'a D,
    clock: &'a C,
}

impl<'a, S, D, C> Ingestor<'a, S, D, C>
where
    S: SearchClientTrait,
    D: DedupStoreTrait,
    C: ClockTrait,
{
    pub fn new(search: &'a S, store: &'a D, clock: &'a C) -> Self {
        Ingestor {
            search,
            store,
            clock,
        }
    }

    /// Process every phrase of `keywords`, one request at a time
    /// A failing phrase or post is logged and counted, it never stops the run
    pub fn ingest(&self, group: &str, keywords: &str, window: &DateWindow) -> Batch {
        let phrases = split_phrases(keywords);
        info!(
            "Ingest group {} with {} phrases from {} to {}",
            group,
            phrases.len(),
            window.start,
            window.end
        );

        let mut batch = Batch::default();
        for (position, phrase) in phrases.iter().enumerate() {
            let query = SearchQuery::new(phrase, window);
            let (entry, report, rate_limit) = self.ingest_phrase(group, &query);
            info!(
                "Phrase \"{}\": {} stored, {} duplicate, {} skipped, {} errors",
                report.phrase, report.stored, report.duplicate, report.skipped, report.errors
            );
            batch.push(entry, report);

            let is_last = position + 1 == phrases.len();
            if let (false, Some(rate_limit)) = (is_last, rate_limit) {
                self.wait_for_quota(&rate_limit);
            }
        }
        batch
    }

    /// Block until the search quota resets, when it ran out
    fn wait_for_quota(&self, rate_limit: &RateLimit) {
        if let Some(wait) = rate_limit.wait_from(self.clock.now()) {
            warn!(
                "Search quota exhausted, waiting {}s before the next phrase",
                wait.as_secs()
            );
            self.clock.sleep(wait);
        }
    }

    fn ingest_phrase(
        &self,
        group: &str,
        query: &SearchQuery,
    ) -> (Value, PhraseReport, Option<RateLimit>) {
        let mut report = PhraseReport::new(&query.phrase);

        let page = match self.search.search(query) {
            Ok(page) => page,
            Err(e) => {
                if e.is_transport() {
                    error!("Search \"{}\" could not reach the API: {}", query.phrase, e);
                } else {
                    error!("Search \"{}\" failed: {}", query.phrase, e);
                }
                report.failure = Some(e.to_string());
                return (json!({}), report, None);
            }
        };

        if let Some(detail) = page.upstream_error() {
            let e = ScoutError::UpstreamQuery {
                phrase: query.phrase.clone(),
                detail,
            };
            warn!("{}", e);
            report.failure = Some(e.to_string());
            return (page.body, report, Some(page.rate_limit));
        }

        let response: SearchResponse = match serde_json::from_value(page.body.clone()) {
            Ok(response) => response,
            Err(e) => {
                let e = ScoutError::transport("search", format!("malformed response: {}", e));
                error!("Search \"{}\" failed: {}", query.phrase, e);
                report.failure = Some(e.to_string());
                return (page.body, report, Some(page.rate_limit));
            }
        };

        for normalized in normalize(&response) {
            let disposition = self.store_post(group, normalized);
            report.record(&disposition);
        }

        let mut body = page.body;
        annotate_urls(&mut body);
        (body, report, Some(page.rate_limit))
    }

    fn store_post(&self, group: &str, normalized: Normalized) -> Disposition {
        let post = match normalized {
            Normalized::Ready(post) => post,
            Normalized::Skipped { post_id, reason } => {
                info!("Skipped post {}: {}", post_id, reason);
                return Disposition::Skipped(reason);
            }
        };
        let payload = match serde_json::to_string(&post) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize post {}: {}", post.id, e);
                return Disposition::Error(e.to_string());
            }
        };
        match self.store.try_set(group, &post.id, &payload) {
            Ok(true) => {
                info!("Stored post {} in group {}", post.id, group);
                Disposition::Stored
            }
            Ok(false) => {
                info!("Duplicate post {} in group {}", post.id, group);
                Disposition::Duplicate
            }
            Err(e) => {
                error!("Failed to store post {} in group {}: {}", post.id, group, e);
                Disposition::Error(e.to_string())
            }
        }
    }
}

/// Give every post of a raw response its canonical `url`
fn annotate_urls(body: &mut Value) {
    if let Some(Value::Array(posts)) = body.get_mut("data") {
        for post in posts.iter_mut() {
            let url = post.get("id").and_then(Value::as_str).map(status_url);
            if let (Some(url), Some(post)) = (url, post.as_object_mut()) {
                post.insert("url".to_string(), Value::String(url));
            }
        }
    }
}

/// Write the batch as `{"keyword_searches": {...}}`
/// Failing here fails the run
pub fn persist_batch(output: &Path, batch: &Batch) -> Result<(), ScoutError> {
    if output.exists() {
        debug!("Output file {} will be overwritten", output.display());
    } else {
        debug!("Output file {} will be created", output.display());
    }
    let staging = staging_path(output)?;
    if let Err(e) = write_batch(&staging, batch) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    if let Err(e) = fs::rename(&staging, output) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    info!("Search results saved to {}", output.display());
    Ok(())
}

/// Hidden sibling of the output, renamed over it once complete
/// A run that dies mid-write leaves the previous output untouched
fn staging_path(output: &Path) -> Result<PathBuf, ScoutError> {
    let file_name = output.file_name().ok_or_else(|| {
        ScoutError::config(format!("output {} is not a file path", output.display()))
    })?;
    Ok(output.with_file_name(format!(".{}.partial", file_name.to_string_lossy())))
}

fn write_batch(path: &Path, batch: &Batch) -> Result<(), ScoutError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, batch)?;
    writer.flush()?;
    Ok(())
}

/// Resolve the group, ingest its phrases and persist the batch
///
/// * group: name of the group in the configuration store
/// * window: date range of the search
/// * output: path of the JSON output
pub fn ingest_group<K, S, D, C>(
    resolver: &GroupResolver<K>,
    search: &S,
    store: &D,
    clock: &C,
    group: &str,
    window: &DateWindow,
    output: &Path,
) -> Result<RunSummary, ScoutError>
where
    K: KvClientTrait,
    S: SearchClientTrait,
    D: DedupStoreTrait,
    C: ClockTrait,
{
    let keywords = resolver.get_group(group)?;
    debug!("args: group={}, keywords={}, window={:?}", group, keywords, window);

    let batch = Ingestor::new(search, store, clock).ingest(group, &keywords, window);
    persist_batch(output, &batch)?;

    let summary = batch.summary();
    info!(
        "Finished group {}: {} stored, {} duplicate, {} skipped, {} errors, {}/{} phrases failed",
        group,
        summary.stored,
        summary.duplicate,
        summary.skipped,
        summary.errors,
        summary.failed_phrases,
        summary.phrases
    );
    Ok(summary)
}

/// Print every group and its keywords
pub fn list_groups<K: KvClientTrait>(resolver: &GroupResolver<K>) -> Result<(), ScoutError> {
    let groups = resolver.list_groups()?;
    if groups.is_empty() {
        info!("No groups are configured.");
    }
    for (name, keywords) in &groups {
        println!("{}: {}", name, keywords);
    }
    Ok(())
}

/// Print the stored posts of a group, newest first
/// * limit: print at most this many posts
pub fn show_posts<D: DedupStoreTrait>(
    store: &D,
    group: &str,
    limit: Option<usize>,
) -> Result<(), ScoutError> {
    let posts = store.list_posts(group)?;
    info!("{} posts stored for group {}", posts.len(), group);
    for post in posts.iter().take(limit.unwrap_or(usize::MAX)) {
        println!("{}", format_post(post));
    }
    Ok(())
}

fn format_post(post: &EnrichedPost) -> String {
    let impressions = post
        .public_metrics
        .get("impression_count")
        .copied()
        .unwrap_or_default();
    format!(
        "{} @{} ({}) [{} impressions] {}\n    {}",
        post.created_at,
        post.author_username,
        post.author_name,
        impressions,
        post.url,
        post.text.replace('\n', " ")
    )
}
