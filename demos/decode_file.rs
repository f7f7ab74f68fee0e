use std::env;

use datex_rs::feed::{prepare, Provenance};
use datex_rs::{ClosureVocabulary, RecordFilter};
use tracing::info;

fn parse_args() -> (String, RecordFilter) {
    let mut args = env::args().skip(1);
    let mut path = "situations.xml".to_string();
    let mut filter = RecordFilter::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--closures" => filter = RecordFilter::AnyClosure,
            "--all" => filter = RecordFilter::All,
            "--type" => {
                if let Some(value) = args.next() {
                    filter = RecordFilter::RecordType(value);
                }
            }
            _ => path = arg,
        }
    }
    (path, filter)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let (path, filter) = parse_args();
    info!(%path, ?filter, "decoding");

    let bytes = tokio::fs::read(&path).await?;
    let publication = datex_rs::xml::decode_slice(&bytes)?;
    let vocabulary = ClosureVocabulary::default();
    let outbound = prepare(
        &publication,
        &filter,
        &vocabulary,
        &Provenance::now("demo", "situations"),
    )?;

    if outbound.is_empty() {
        println!("No matching records.");
        return Ok(());
    }
    for record in outbound {
        println!("{:<16} {}", record.key, record.payload);
    }
    Ok(())
}
