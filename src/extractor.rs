//! Content-side extraction service: debounced re-runs of the strategy
//! cascade over a live document source.
//!
//! Pages mutate in bursts. Each trigger arms (or re-arms) a quiet-period
//! timer; extraction runs once the document has been still for
//! [`DEBOUNCE_QUIET`]. A pass that finds no color sends nothing, so the
//! orchestrator never sees an empty result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;
use url::Url;

use crate::orchestrator::{Event, TabInfo};
use crate::pipeline::{default_strategies, run_cascade, ExtractStrategy, ImageSampler, PageSnapshot};

/// Quiet period after the last mutation before extraction re-runs.
pub const DEBOUNCE_QUIET: Duration = Duration::from_millis(80);

/// Where document snapshots come from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch and parse the current document. `None` when the page cannot
    /// be loaded right now.
    async fn snapshot(&self) -> Option<PageSnapshot>;
}

/// Live page over HTTP, refetched on every snapshot.
pub struct HttpSource {
    http: reqwest::Client,
    url: Url,
}

impl HttpSource {
    pub fn new(url: Url) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("pagetint/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, url }
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn snapshot(&self) -> Option<PageSnapshot> {
        let response = match self.http.get(self.url.clone()).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(url = %self.url, "page fetch failed: {e}");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(url = %self.url, status = %response.status(), "page fetch rejected");
            return None;
        }
        let body = response.text().await.ok()?;
        Some(PageSnapshot::parse(&body, self.url.clone()))
    }
}

/// Local HTML file, re-read on every snapshot.
pub struct FileSource {
    path: std::path::PathBuf,
    base: Url,
}

impl FileSource {
    pub fn new(path: std::path::PathBuf) -> Result<Self> {
        let canonical = path
            .canonicalize()
            .with_context(|| format!("resolving {}", path.display()))?;
        let base = Url::from_file_path(&canonical)
            .map_err(|_| anyhow::anyhow!("not an absolute file path: {}", canonical.display()))?;
        Ok(Self {
            path: canonical,
            base,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    async fn snapshot(&self) -> Option<PageSnapshot> {
        let html = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) => {
                debug!(path = %self.path.display(), "page read failed: {e}");
                return None;
            }
        };
        Some(PageSnapshot::parse(&html, self.base.clone()))
    }
}

/// Fixed document, handy for tests and piped input.
pub struct StaticSource {
    pub html: String,
    pub base: Url,
}

#[async_trait]
impl DocumentSource for StaticSource {
    async fn snapshot(&self) -> Option<PageSnapshot> {
        Some(PageSnapshot::parse(&self.html, self.base.clone()))
    }
}

pub struct Extractor {
    source: Arc<dyn DocumentSource>,
    sampler: ImageSampler,
    strategies: Vec<Box<dyn ExtractStrategy>>,
    tab: TabInfo,
    events: mpsc::Sender<Event>,
}

impl Extractor {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        sampler: ImageSampler,
        tab: TabInfo,
        events: mpsc::Sender<Event>,
    ) -> Self {
        Self {
            source,
            sampler,
            strategies: default_strategies(),
            tab,
            events,
        }
    }

    /// Debounce loop. Each trigger pushes the deadline out; extraction runs
    /// once per burst, after the quiet period. Returns when the trigger
    /// channel closes.
    pub async fn run(self, mut triggers: mpsc::Receiver<()>) {
        let mut deadline: Option<Instant> = None;
        loop {
            match deadline {
                Some(when) => {
                    // An elapsed timer takes priority so a pending pass
                    // still runs when the channel closes at the same time.
                    tokio::select! {
                        biased;
                        _ = sleep_until(when) => {
                            deadline = None;
                            self.extract_once().await;
                        }
                        trigger = triggers.recv() => match trigger {
                            Some(()) => deadline = Some(Instant::now() + DEBOUNCE_QUIET),
                            None => break,
                        },
                    }
                }
                None => match triggers.recv().await {
                    Some(()) => deadline = Some(Instant::now() + DEBOUNCE_QUIET),
                    None => break,
                },
            }
        }
        debug!(tab = self.tab.id, "trigger channel closed, extractor stopping");
    }

    /// One full pass: snapshot, cascade, report. Empty results are
    /// suppressed rather than sent.
    pub async fn extract_once(&self) {
        let Some(page) = self.source.snapshot().await else {
            return;
        };
        let Some(primary) = run_cascade(&page, &self.sampler, &self.strategies).await else {
            debug!(host = ?page.host, "no color signal found, nothing sent");
            return;
        };
        let event = Event::Colors {
            tab: self.tab.clone(),
            primary: Some(primary),
            accent: None,
        };
        if self.events.send(event).await.is_err() {
            debug!("event channel closed, dropping extraction result");
        }
    }
}
