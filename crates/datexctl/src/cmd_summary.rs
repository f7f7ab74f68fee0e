use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use datex_feed::ClosureVocabulary;
use datex_xml::Publication;
use serde::Serialize;

use crate::common;

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct Summary {
    publication_time: String,
    records: usize,
    situations: usize,
    by_record_type: BTreeMap<String, usize>,
    full_closures: usize,
    lane_closures: usize,
    any_closures: usize,
    flagged_closed: usize,
}

fn summarize(publication: &Publication, vocabulary: &ClosureVocabulary) -> Summary {
    let mut summary = Summary {
        publication_time: common::format_time(publication.publication_time),
        records: publication.records.len(),
        ..Summary::default()
    };
    let mut situations: Vec<&str> = Vec::new();
    for record in &publication.records {
        if let Some(id) = record.situation.id.as_deref() {
            if !situations.contains(&id) {
                situations.push(id);
            }
        }
        let kind = record.record_type.as_deref().unwrap_or("unknown");
        *summary.by_record_type.entry(kind.to_string()).or_default() += 1;
        if vocabulary.is_full_closure(record) {
            summary.full_closures += 1;
        }
        if vocabulary.is_lane_closure(record) {
            summary.lane_closures += 1;
        }
        if vocabulary.is_any_closure(record) {
            summary.any_closures += 1;
        }
        if record.is_closure {
            summary.flagged_closed += 1;
        }
    }
    summary.situations = situations.len();
    summary
}

pub async fn run(input: PathBuf, vocabulary: Option<PathBuf>, json: bool) -> Result<()> {
    let vocabulary = common::load_vocabulary(vocabulary.as_deref())?;
    let publication = common::decode_input(input).await?;
    let summary = summarize(&publication, &vocabulary);

    if json {
        return common::print_json(&summary);
    }

    println!("Publication time : {}", summary.publication_time);
    println!("Situations       : {}", summary.situations);
    println!("Records          : {}", summary.records);
    println!(
        "Closures         : {} (full {}, lane {}, flagged {})",
        summary.any_closures, summary.full_closures, summary.lane_closures, summary.flagged_closed
    );
    if !summary.by_record_type.is_empty() {
        println!();
        println!("{:<28} {}", "TYPE", "COUNT");
        for (kind, count) in &summary.by_record_type {
            println!("{kind:<28} {count}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use datex_xml::{SituationContext, SituationRecord};

    fn record(situation: &str, kind: &str, lane: Option<&str>) -> SituationRecord {
        SituationRecord {
            situation: SituationContext {
                id: Some(situation.into()),
                ..SituationContext::default()
            },
            id: format!("{situation}-{kind}"),
            record_type: Some(kind.into()),
            road_or_carriageway_or_lane_management_type: lane.map(str::to_string),
            is_closure: lane.is_some_and(|value| value.contains("Closed")),
            ..SituationRecord::default()
        }
    }

    #[test]
    fn counts_types_and_closures() {
        let publication = Publication {
            publication_time: None,
            records: vec![
                record("S1", "MaintenanceWorks", Some("laneClosures")),
                record("S1", "RoadOrCarriagewayOrLaneManagement", Some("roadClosed")),
                record("S2", "MaintenanceWorks", None),
            ],
        };
        let summary = summarize(&publication, &ClosureVocabulary::default());
        assert_eq!(summary.publication_time, "-");
        assert_eq!(summary.records, 3);
        assert_eq!(summary.situations, 2);
        assert_eq!(summary.by_record_type["MaintenanceWorks"], 2);
        assert_eq!(summary.full_closures, 1);
        assert_eq!(summary.lane_closures, 1);
        assert_eq!(summary.any_closures, 2);
        assert_eq!(summary.flagged_closed, 1);
    }
}
