//! Retrieval boundary: conditional fetch, decode and cache-token bookkeeping.
//!
//! A [`FeedSource`] hands over the transport-decoded document (or reports
//! that nothing changed). [`Poller`] runs one fetch-and-decode cycle at a
//! time and only advances its cache tokens and success marker once a cycle
//! decoded cleanly, so a failed cycle is retried verbatim on the next tick.

use std::future::Future;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use datex_xml::Publication;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::FeedError;

const READ_BUFFER: usize = 128 * 1024;
const PROGRESS_STEP: u64 = 5 * 1024 * 1024;

/// HTTP-style validators remembered between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheTokens {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Result of asking a source for the current document.
pub enum FetchOutcome {
    /// The validators still match; nothing to decode.
    NotModified,
    /// A fresh document together with its validators.
    Fetched {
        body: Box<dyn BufRead + Send>,
        tokens: CacheTokens,
    },
}

/// Supplier of feed documents (HTTP client, file, test double).
#[async_trait]
pub trait FeedSource: Send {
    async fn fetch(&mut self, tokens: &CacheTokens) -> Result<FetchOutcome, FeedError>;
}

/// Local file treated as a feed; its size and modification time act as the
/// validators.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FeedSource for FileSource {
    async fn fetch(&mut self, tokens: &CacheTokens) -> Result<FetchOutcome, FeedError> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        let modified = metadata.modified()?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let current = CacheTokens {
            etag: Some(format!("\"{:x}-{:x}\"", metadata.len(), nanos)),
            last_modified: Some(format_timestamp(OffsetDateTime::from(modified))?),
        };
        if tokens.etag.is_some() && *tokens == current {
            debug!(path = %self.path.display(), "feed file unchanged");
            return Ok(FetchOutcome::NotModified);
        }
        let file = tokio::fs::File::open(&self.path).await?.into_std().await;
        info!(
            path = %self.path.display(),
            bytes = metadata.len(),
            "reading feed file"
        );
        let reader = BufReader::with_capacity(READ_BUFFER, file);
        Ok(FetchOutcome::Fetched {
            body: Box::new(ProgressReader::new(reader, self.path.display().to_string())),
            tokens: current,
        })
    }
}

/// Reader wrapper logging how far a large document has been consumed.
pub struct ProgressReader<R> {
    inner: R,
    label: String,
    read: u64,
    step: u64,
    next_report: u64,
    reports: usize,
}

impl<R> ProgressReader<R> {
    /// Report every 5 MiB.
    pub fn new(inner: R, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
            read: 0,
            step: PROGRESS_STEP,
            next_report: PROGRESS_STEP,
            reports: 0,
        }
    }

    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step.max(1);
        self.next_report = self.step;
        self
    }

    pub fn bytes_read(&self) -> u64 {
        self.read
    }

    /// Number of progress lines logged so far.
    pub fn reports(&self) -> usize {
        self.reports
    }

    fn advance(&mut self, amount: usize) {
        self.read += amount as u64;
        if self.read >= self.next_report {
            info!(source = %self.label, bytes = self.read, "feed read progress");
            self.reports += 1;
            self.next_report = (self.read / self.step + 1) * self.step;
        }
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.advance(n);
        Ok(n)
    }
}

impl<R: BufRead> BufRead for ProgressReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amount: usize) {
        self.inner.consume(amount);
        self.advance(amount);
    }
}

/// File recording when the last successful cycle finished.
#[derive(Debug, Clone)]
pub struct SuccessMarker {
    path: PathBuf,
}

impl SuccessMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Time stored in the marker, if it exists and parses.
    pub async fn read(&self) -> Result<Option<OffsetDateTime>, FeedError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(OffsetDateTime::parse(text.trim(), &Rfc3339).ok())
    }

    pub async fn record(&self, at: OffsetDateTime) -> Result<(), FeedError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, format_timestamp(at)?).await?;
        Ok(())
    }
}

/// What a single cycle produced.
#[derive(Debug)]
pub enum CycleOutcome {
    NotModified,
    Decoded(Publication),
}

/// Drives a [`FeedSource`] one cycle at a time.
pub struct Poller<S> {
    source: S,
    tokens: CacheTokens,
    initial: Option<InitialPull<S>>,
    marker: Option<SuccessMarker>,
}

/// Separate source for the one-off initial pull, with its own validators.
struct InitialPull<S> {
    source: S,
    tokens: CacheTokens,
}

impl<S: FeedSource> Poller<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            tokens: CacheTokens::default(),
            initial: None,
            marker: None,
        }
    }

    pub fn with_marker(mut self, marker: SuccessMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    /// Use `source` for [`Poller::poll_initial`] instead of the regular source.
    pub fn with_initial_source(mut self, source: S) -> Self {
        self.initial = Some(InitialPull {
            source,
            tokens: CacheTokens::default(),
        });
        self
    }

    pub fn tokens(&self) -> &CacheTokens {
        &self.tokens
    }

    /// Validators of the initial source, when one is configured.
    pub fn initial_tokens(&self) -> Option<&CacheTokens> {
        self.initial.as_ref().map(|initial| &initial.tokens)
    }

    /// Fetch and decode once. Tokens and marker change only on success.
    pub async fn poll_once(&mut self) -> Result<CycleOutcome, FeedError> {
        cycle(&mut self.source, &mut self.tokens, self.marker.as_ref()).await
    }

    /// One-off initial pull: skipped when the success marker already exists.
    /// Reads the initial source if one is configured, else the regular one.
    pub async fn poll_initial(&mut self) -> Result<Option<CycleOutcome>, FeedError> {
        if let Some(marker) = &self.marker {
            if marker.exists().await {
                debug!(path = %marker.path().display(), "initial pull already done");
                return Ok(None);
            }
        }
        let outcome = match self.initial.as_mut() {
            Some(initial) => {
                cycle(&mut initial.source, &mut initial.tokens, self.marker.as_ref()).await?
            }
            None => self.poll_once().await?,
        };
        Ok(Some(outcome))
    }

    /// Poll every `period` forever. Cycles never overlap; missed ticks are
    /// skipped, and cycle or handler failures are logged and retried on the
    /// next tick.
    pub async fn run<F, Fut>(&mut self, period: Duration, mut handler: F)
    where
        F: FnMut(Publication) -> Fut,
        Fut: Future<Output = Result<(), FeedError>>,
    {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match self.poll_once().await {
                Ok(CycleOutcome::Decoded(publication)) => {
                    if let Err(err) = handler(publication).await {
                        warn!(%err, "publishing decoded records failed");
                    }
                }
                Ok(CycleOutcome::NotModified) => {}
                Err(err) => warn!(%err, "feed cycle failed"),
            }
        }
    }
}

async fn cycle<S: FeedSource>(
    source: &mut S,
    tokens: &mut CacheTokens,
    marker: Option<&SuccessMarker>,
) -> Result<CycleOutcome, FeedError> {
    let (body, fresh) = match source.fetch(tokens).await? {
        FetchOutcome::NotModified => {
            debug!("feed not modified");
            return Ok(CycleOutcome::NotModified);
        }
        FetchOutcome::Fetched { body, tokens } => (body, tokens),
    };

    let publication = tokio::task::spawn_blocking(move || datex_xml::decode(body))
        .await
        .map_err(|err| FeedError::Task(err.to_string()))??;

    *tokens = fresh;
    if let Some(marker) = marker {
        if let Err(err) = marker.record(OffsetDateTime::now_utc()).await {
            warn!(path = %marker.path().display(), %err, "failed to update success marker");
        }
    }
    info!(
        records = publication.records.len(),
        etag = tokens.etag.as_deref().unwrap_or("-"),
        "feed cycle decoded"
    );
    Ok(CycleOutcome::Decoded(publication))
}

fn format_timestamp(at: OffsetDateTime) -> Result<String, FeedError> {
    at.format(&Rfc3339)
        .map_err(|err| FeedError::Timestamp(err.to_string()))
}
