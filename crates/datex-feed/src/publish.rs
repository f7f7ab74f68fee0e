//! Record selection and provenance tagging ahead of publication.

use async_trait::async_trait;
use datex_xml::{Publication, SituationRecord};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::closure::ClosureVocabulary;
use crate::FeedError;

/// Record type fragment selecting roadworks.
pub const MAINTENANCE_WORKS: &str = "maintenanceWorks";

/// Which decoded records get published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    /// Case-insensitive substring of the record type discriminator.
    RecordType(String),
    AnyClosure,
    FullClosure,
    LaneClosure,
}

impl Default for RecordFilter {
    fn default() -> Self {
        RecordFilter::RecordType(MAINTENANCE_WORKS.to_string())
    }
}

impl RecordFilter {
    pub fn matches(&self, record: &SituationRecord, vocabulary: &ClosureVocabulary) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::RecordType(fragment) => record
                .record_type
                .as_deref()
                .is_some_and(|kind| kind.to_lowercase().contains(&fragment.to_lowercase())),
            RecordFilter::AnyClosure => vocabulary.is_any_closure(record),
            RecordFilter::FullClosure => vocabulary.is_full_closure(record),
            RecordFilter::LaneClosure => vocabulary.is_lane_closure(record),
        }
    }
}

/// Where a batch of records came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source: String,
    pub dataset: String,
    pub fetched_at: OffsetDateTime,
}

impl Provenance {
    /// Provenance stamped with the current UTC time.
    pub fn now(source: impl Into<String>, dataset: impl Into<String>) -> Self {
        Provenance {
            source: source.into(),
            dataset: dataset.into(),
            fetched_at: OffsetDateTime::now_utc(),
        }
    }
}

/// A record ready for the message bus: key plus JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub key: String,
    pub payload: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    record: &'a SituationRecord,
    #[serde(rename = "_source")]
    source: &'a str,
    #[serde(rename = "_dataset")]
    dataset: &'a str,
    #[serde(rename = "_fetchedAt", with = "time::serde::rfc3339")]
    fetched_at: OffsetDateTime,
    #[serde(
        rename = "publicationTime",
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    publication_time: Option<OffsetDateTime>,
}

/// Select records with `filter` and wrap each with provenance fields.
pub fn prepare(
    publication: &Publication,
    filter: &RecordFilter,
    vocabulary: &ClosureVocabulary,
    provenance: &Provenance,
) -> Result<Vec<OutboundRecord>, FeedError> {
    let mut out = Vec::new();
    for record in &publication.records {
        if !filter.matches(record, vocabulary) {
            continue;
        }
        let envelope = Envelope {
            record,
            source: &provenance.source,
            dataset: &provenance.dataset,
            fetched_at: provenance.fetched_at,
            publication_time: publication.publication_time,
        };
        out.push(OutboundRecord {
            key: record.id.clone(),
            payload: serde_json::to_string(&envelope)?,
        });
    }
    debug!(
        selected = out.len(),
        total = publication.records.len(),
        ?filter,
        "prepared records for publication"
    );
    Ok(out)
}

/// Message-bus boundary receiving prepared records.
#[async_trait]
pub trait RecordSink: Send {
    async fn send(&mut self, record: &OutboundRecord) -> Result<(), FeedError>;
}

/// Sink writing one JSON payload per line.
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W> RecordSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, record: &OutboundRecord) -> Result<(), FeedError> {
        self.writer.write_all(record.payload.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Send every record in order, stopping at the first sink failure.
pub async fn publish_all(
    sink: &mut dyn RecordSink,
    records: &[OutboundRecord],
) -> Result<usize, FeedError> {
    for record in records {
        sink.send(record).await?;
    }
    info!(count = records.len(), "published records");
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn publication() -> Publication {
        let records = vec![
            SituationRecord {
                id: "works".into(),
                record_type: Some("MaintenanceWorks".into()),
                road_or_carriageway_or_lane_management_type: Some("laneClosures".into()),
                ..SituationRecord::default()
            },
            SituationRecord {
                id: "closed".into(),
                record_type: Some("NetworkManagement".into()),
                network_management_type: Some("roadClosed".into()),
                ..SituationRecord::default()
            },
            SituationRecord {
                id: "crash".into(),
                record_type: Some("Accident".into()),
                ..SituationRecord::default()
            },
        ];
        Publication {
            publication_time: Some(datetime!(2024-05-06 08:15:30 +02:00)),
            records,
        }
    }

    fn provenance() -> Provenance {
        Provenance {
            source: "ndic".into(),
            dataset: "roadworks".into(),
            fetched_at: datetime!(2024-05-06 06:20:00 UTC),
        }
    }

    fn keys(filter: RecordFilter) -> Vec<String> {
        prepare(&publication(), &filter, &ClosureVocabulary::default(), &provenance())
            .expect("prepare")
            .into_iter()
            .map(|record| record.key)
            .collect()
    }

    #[test]
    fn filters_select_expected_records() {
        assert_eq!(keys(RecordFilter::default()), ["works"]);
        assert_eq!(keys(RecordFilter::All), ["works", "closed", "crash"]);
        assert_eq!(keys(RecordFilter::AnyClosure), ["works", "closed"]);
        assert_eq!(keys(RecordFilter::FullClosure), ["closed"]);
        assert_eq!(keys(RecordFilter::LaneClosure), ["works"]);
        assert_eq!(keys(RecordFilter::RecordType("ACCIDENT".into())), ["crash"]);
    }

    #[test]
    fn payload_carries_provenance() {
        let out = prepare(
            &publication(),
            &RecordFilter::FullClosure,
            &ClosureVocabulary::default(),
            &provenance(),
        )
        .expect("prepare");
        let payload: serde_json::Value = serde_json::from_str(&out[0].payload).expect("json");
        assert_eq!(payload["situationRecordId"], "closed");
        assert_eq!(payload["_source"], "ndic");
        assert_eq!(payload["_dataset"], "roadworks");
        assert_eq!(payload["_fetchedAt"], "2024-05-06T06:20:00Z");
        assert_eq!(payload["publicationTime"], "2024-05-06T08:15:30+02:00");
        assert!(payload.get("comment").is_none());
    }

    #[tokio::test]
    async fn json_lines_sink_writes_one_payload_per_line() {
        let records = prepare(
            &publication(),
            &RecordFilter::AnyClosure,
            &ClosureVocabulary::default(),
            &provenance(),
        )
        .expect("prepare");
        let mut sink = JsonLinesSink::new(Vec::new());
        let sent = publish_all(&mut sink, &records).await.expect("publish");
        assert_eq!(sent, 2);
        let written = String::from_utf8(sink.into_inner()).expect("utf8");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], records[0].payload);
    }
}
