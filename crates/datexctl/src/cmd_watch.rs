use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use datex_feed::{
    prepare, publish_all, ClosureVocabulary, CycleOutcome, FeedError, FileSource, JsonLinesSink,
    Poller, Provenance, RecordFilter, SuccessMarker,
};
use datex_xml::Publication;
use tracing::{info, warn};

use crate::common;

pub struct WatchArgs {
    pub input: PathBuf,
    pub interval_s: u64,
    pub marker: Option<PathBuf>,
    pub initial: Option<PathBuf>,
    pub once: bool,
    pub filter: String,
    pub record_type: Option<String>,
    pub vocabulary: Option<PathBuf>,
    pub source: String,
    pub dataset: String,
}

#[derive(Clone)]
struct Publisher {
    filter: RecordFilter,
    vocabulary: ClosureVocabulary,
    source: String,
    dataset: String,
}

impl Publisher {
    async fn publish(self, publication: Publication) -> Result<(), FeedError> {
        let provenance = Provenance::now(self.source, self.dataset);
        let outbound = prepare(&publication, &self.filter, &self.vocabulary, &provenance)?;
        let mut sink = JsonLinesSink::new(tokio::io::stdout());
        publish_all(&mut sink, &outbound).await?;
        Ok(())
    }
}

async fn initial_pull(
    poller: &mut Poller<FileSource>,
    publisher: &Publisher,
) -> Result<(), FeedError> {
    if let Some(CycleOutcome::Decoded(publication)) = poller.poll_initial().await? {
        publisher.clone().publish(publication).await?;
    }
    Ok(())
}

/// Poll a local feed file and write selected records as JSON lines.
pub async fn run(args: WatchArgs) -> Result<()> {
    if args.input.as_os_str() == "-" {
        bail!("watch needs a file path, not standard input");
    }
    if args.interval_s == 0 {
        bail!("--interval-s must be at least 1");
    }
    let publisher = Publisher {
        filter: common::parse_filter(&args.filter, args.record_type.as_deref())?,
        vocabulary: common::load_vocabulary(args.vocabulary.as_deref())?,
        source: args.source,
        dataset: args.dataset,
    };

    let mut poller = Poller::new(FileSource::new(&args.input));
    if let Some(path) = args.initial {
        poller = poller.with_initial_source(FileSource::new(path));
    }
    if let Some(path) = args.marker {
        poller = poller.with_marker(SuccessMarker::new(path));
    }

    match initial_pull(&mut poller, &publisher).await {
        Ok(()) => {}
        Err(err) if args.once => return Err(err.into()),
        Err(err) => warn!(%err, "initial pull failed, continuing with scheduled polls"),
    }
    if args.once {
        return Ok(());
    }

    let period = Duration::from_secs(args.interval_s);
    info!(input = %args.input.display(), period_s = args.interval_s, "watching feed");
    tokio::select! {
        _ = poller.run(period, |publication| publisher.clone().publish(publication)) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("interrupted, stopping watch");
        }
    }
    Ok(())
}
