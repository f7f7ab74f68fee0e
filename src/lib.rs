//! DATEX II situation feed tooling.
//!
//! Re-exports the streaming decoder and the feed helpers built on top of it.

pub use datex_feed as feed;
pub use datex_xml as xml;

pub use datex_feed::{ClosureVocabulary, FeedError, Poller, RecordFilter};
pub use datex_xml::{decode, DecodeError, Publication, SituationRecord};
