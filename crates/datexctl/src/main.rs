use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use datexctl::cmd_decode::{self, DecodeArgs};
use datexctl::cmd_summary;
use datexctl::cmd_watch::{self, WatchArgs};
use datexctl::common::{DEFAULT_DATASET, DEFAULT_SOURCE};

#[derive(Parser, Debug)]
#[command(name = "datexctl", version, about = "DATEX II situation publication CLI")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Output JSON where applicable
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Args, Debug)]
struct Selection {
    /// all, any-closure, full-closure, lane-closure or record-type
    #[arg(long, default_value = "record-type")]
    filter: String,
    /// Record type fragment for the record-type filter
    #[arg(long)]
    record_type: Option<String>,
    /// JSON file with closure tokens
    #[arg(long)]
    vocabulary: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_SOURCE)]
    source: String,
    #[arg(long, default_value = DEFAULT_DATASET)]
    dataset: String,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Decode a document and print selected records
    Decode {
        /// Document path, `-` for stdin
        input: PathBuf,
        #[command(flatten)]
        selection: Selection,
    },
    /// Count records by type and closure kind
    Summary {
        input: PathBuf,
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },
    /// Poll a feed file and stream selected records as JSON lines
    Watch {
        input: PathBuf,
        #[arg(long, default_value_t = 300)]
        interval_s: u64,
        /// Success marker file guarding the initial pull
        #[arg(long)]
        marker: Option<PathBuf>,
        /// Separate file read by the initial pull
        #[arg(long)]
        initial: Option<PathBuf>,
        /// Run the initial pull only
        #[arg(long)]
        once: bool,
        #[command(flatten)]
        selection: Selection,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { verbose, json, cmd } = Cli::parse();

    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cmd {
        Cmd::Decode { input, selection } => {
            let args = DecodeArgs {
                input,
                filter: selection.filter,
                record_type: selection.record_type,
                vocabulary: selection.vocabulary,
                source: selection.source,
                dataset: selection.dataset,
            };
            cmd_decode::run(args, json).await?
        }
        Cmd::Summary { input, vocabulary } => cmd_summary::run(input, vocabulary, json).await?,
        Cmd::Watch {
            input,
            interval_s,
            marker,
            initial,
            once,
            selection,
        } => {
            let args = WatchArgs {
                input,
                interval_s,
                marker,
                initial,
                once,
                filter: selection.filter,
                record_type: selection.record_type,
                vocabulary: selection.vocabulary,
                source: selection.source,
                dataset: selection.dataset,
            };
            cmd_watch::run(args).await?
        }
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decode_defaults() {
        let cli = Cli::parse_from(["datexctl", "decode", "-"]);
        match cli.cmd {
            Cmd::Decode { input, selection } => {
                assert_eq!(input, PathBuf::from("-"));
                assert_eq!(selection.filter, "record-type");
                assert_eq!(selection.source, DEFAULT_SOURCE);
                assert!(selection.record_type.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn parse_watch_args() {
        let cli = Cli::parse_from([
            "datexctl",
            "-vv",
            "--json",
            "watch",
            "feed.xml",
            "--interval-s",
            "60",
            "--marker",
            "state/initial.done",
            "--initial",
            "init.xml",
            "--filter",
            "any-closure",
            "--dataset",
            "closures",
        ]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        match cli.cmd {
            Cmd::Watch {
                input,
                interval_s,
                marker,
                initial,
                once,
                selection,
            } => {
                assert_eq!(input, PathBuf::from("feed.xml"));
                assert_eq!(initial, Some(PathBuf::from("init.xml")));
                assert_eq!(interval_s, 60);
                assert_eq!(marker, Some(PathBuf::from("state/initial.done")));
                assert!(!once);
                assert_eq!(selection.filter, "any-closure");
                assert_eq!(selection.dataset, "closures");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn summary_takes_vocabulary() {
        let cli = Cli::parse_from(["datexctl", "summary", "a.xml", "--vocabulary", "v.json"]);
        match cli.cmd {
            Cmd::Summary { vocabulary, .. } => {
                assert_eq!(vocabulary, Some(PathBuf::from("v.json")))
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
