use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use datex_feed::{ClosureVocabulary, RecordFilter};
use datex_xml::Publication;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Source name stamped on records when `--source` is not given.
pub const DEFAULT_SOURCE: &str = "datexctl";
/// Dataset name stamped on records when `--dataset` is not given.
pub const DEFAULT_DATASET: &str = "situations";

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

pub fn format_time(at: Option<OffsetDateTime>) -> String {
    at.and_then(|ts| ts.format(&Rfc3339).ok())
        .unwrap_or_else(|| "-".to_string())
}

/// Open a document path, `-` meaning standard input.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    Ok(Box::new(BufReader::with_capacity(128 * 1024, file)))
}

/// Decode a document on the blocking pool.
pub async fn decode_input(path: PathBuf) -> Result<Publication> {
    let label = path.display().to_string();
    let publication = tokio::task::spawn_blocking(move || -> Result<Publication> {
        let reader = open_input(&path)?;
        Ok(datex_xml::decode(reader)?)
    })
    .await
    .context("decode task")?
    .with_context(|| format!("decode {label}"))?;
    Ok(publication)
}

/// Closure vocabulary from a JSON file, or the built-in tokens.
pub fn load_vocabulary(path: Option<&Path>) -> Result<ClosureVocabulary> {
    let Some(path) = path else {
        return Ok(ClosureVocabulary::default());
    };
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse vocabulary {}", path.display()))
}

/// Map `--filter` and `--record-type` to a [`RecordFilter`].
pub fn parse_filter(kind: &str, record_type: Option<&str>) -> Result<RecordFilter> {
    let filter = match kind.to_ascii_lowercase().as_str() {
        "all" => RecordFilter::All,
        "any-closure" => RecordFilter::AnyClosure,
        "full-closure" => RecordFilter::FullClosure,
        "lane-closure" => RecordFilter::LaneClosure,
        "record-type" => match record_type {
            Some(fragment) if !fragment.trim().is_empty() => {
                RecordFilter::RecordType(fragment.trim().to_string())
            }
            _ => RecordFilter::default(),
        },
        other => bail!(
            "unknown filter '{other}' (expected all, any-closure, full-closure, lane-closure or record-type)"
        ),
    };
    Ok(filter)
}
