use std::path::PathBuf;

use anyhow::Result;
use datex_feed::{prepare, publish_all, JsonLinesSink, Provenance};
use datex_xml::SituationRecord;
use tracing::info;

use crate::common;

pub struct DecodeArgs {
    pub input: PathBuf,
    pub filter: String,
    pub record_type: Option<String>,
    pub vocabulary: Option<PathBuf>,
    pub source: String,
    pub dataset: String,
}

/// Decode one document and print the selected records.
///
/// With `--json` every selected record is written as one JSON line carrying
/// provenance fields, the same payload a watch cycle publishes.
pub async fn run(args: DecodeArgs, json: bool) -> Result<()> {
    let filter = common::parse_filter(&args.filter, args.record_type.as_deref())?;
    let vocabulary = common::load_vocabulary(args.vocabulary.as_deref())?;
    let publication = common::decode_input(args.input.clone()).await?;
    info!(
        records = publication.records.len(),
        input = %args.input.display(),
        "decoded publication"
    );

    if json {
        let provenance = Provenance::now(args.source, args.dataset);
        let outbound = prepare(&publication, &filter, &vocabulary, &provenance)?;
        let mut sink = JsonLinesSink::new(tokio::io::stdout());
        publish_all(&mut sink, &outbound).await?;
        return Ok(());
    }

    let selected: Vec<&SituationRecord> = publication
        .records
        .iter()
        .filter(|record| filter.matches(record, &vocabulary))
        .collect();
    if selected.is_empty() {
        println!("No matching records.");
        return Ok(());
    }

    println!(
        "Published {} ({} of {} records)",
        common::format_time(publication.publication_time),
        selected.len(),
        publication.records.len()
    );
    println!(
        "{:<16} {:<22} {:<8} {:<12} {}",
        "ID", "TYPE", "CLOSURE", "ROAD", "LOCATION"
    );
    for record in selected {
        let closure = if vocabulary.is_full_closure(record) {
            "full"
        } else if vocabulary.is_lane_closure(record) {
            "lane"
        } else {
            "-"
        };
        println!(
            "{:<16} {:<22} {:<8} {:<12} {}",
            record.id,
            record.record_type.as_deref().unwrap_or("-"),
            closure,
            record.road_name_or_number.as_deref().unwrap_or("-"),
            record.location_text.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
