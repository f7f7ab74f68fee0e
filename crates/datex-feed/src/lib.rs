#![cfg_attr(docsrs, feature(doc_cfg))]
//! Feed-level helpers around the DATEX II decoder: closure classification,
//! record selection with provenance tagging, and a polled retrieval cycle.
//!
//! ```rust,no_run
//! use datex_feed::{prepare, ClosureVocabulary, FileSource, Poller, Provenance, RecordFilter};
//! use datex_feed::CycleOutcome;
//!
//! # async fn run() -> Result<(), datex_feed::FeedError> {
//! let mut poller = Poller::new(FileSource::new("situations.xml"));
//! if let CycleOutcome::Decoded(publication) = poller.poll_once().await? {
//!     let provenance = Provenance::now("ndic", "roadworks");
//!     let out = prepare(
//!         &publication,
//!         &RecordFilter::AnyClosure,
//!         &ClosureVocabulary::default(),
//!         &provenance,
//!     )?;
//!     println!("{} closures", out.len());
//! }
//! # Ok(())
//! # }
//! ```

pub use datex_xml as xml;

pub mod closure;
pub mod feed;
pub mod publish;

use datex_xml::DecodeError;
use thiserror::Error;

pub use closure::{is_any_closure, is_full_closure, is_lane_closure, ClosureVocabulary};
pub use feed::{
    CacheTokens, CycleOutcome, FeedSource, FetchOutcome, FileSource, Poller, ProgressReader,
    SuccessMarker,
};
pub use publish::{
    prepare, publish_all, JsonLinesSink, OutboundRecord, Provenance, RecordFilter, RecordSink,
};

/// Error type produced by feed retrieval and publication.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The document was not structurally valid.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Local file or stream IO failed.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// A source could not deliver the document.
    #[error("transport: {0}")]
    Transport(String),
    /// A record could not be encoded for publication.
    #[error("encode: {0}")]
    Encode(#[from] serde_json::Error),
    /// A sink refused a record.
    #[error("publish: {0}")]
    Publish(String),
    /// The blocking decode task did not complete.
    #[error("task: {0}")]
    Task(String),
    #[error("timestamp: {0}")]
    Timestamp(String),
}
