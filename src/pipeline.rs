use std::{
    env,
    fs::{self, File},
    future::Future,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use object_store::ObjectStoreScheme;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    common::{read_lines, read_object, Input, MapReduce, Output},
    config::{Mode, PipelineConfig},
    error::{Error, Result},
    frequency::RankedResult,
    map_reduce_seq::SequentialMapReduce,
    mr_parallel::ParallelMapReduce,
    oracles::NameOracle,
};

#[derive(Debug, Clone)]
pub struct Report {
    pub elapsed: Duration,
    pub ranked: RankedResult,
    pub units: usize,
    pub skipped: Vec<usize>,
}

impl Report {
    /// Text written to the output file.
    pub fn render(&self) -> String {
        let mut out = format!("cost time: {} s\n", self.elapsed.as_secs_f64());
        for (name, count) in self.ranked.iter() {
            out.push_str(&format!("{} {}\n", name, count));
        }
        out
    }
}

/// How long teardown waits for tagging calls abandoned after a timeout.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Where a document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Local(PathBuf),
    /// An object behind `s3://`, `gs://`, `az://`, `http(s)://` or `memory://`.
    Remote(Url),
}

impl Source {
    /// Path the default output name is derived from. Remote objects map to
    /// their file name in the working directory.
    pub fn local_path(&self) -> PathBuf {
        match self {
            Source::Local(path) => path.clone(),
            Source::Remote(url) => ObjectStoreScheme::parse(url)
                .ok()
                .and_then(|(_, location)| location.filename().map(PathBuf::from))
                .unwrap_or_default(),
        }
    }
}

/// Resolves a document reference: plain paths and `file://` URIs are local,
/// any scheme `object_store` can open is remote.
pub fn resolve_source(document: &str) -> Result<Source> {
    if let Some(path) = document.strip_prefix("file://") {
        return Ok(Source::Local(PathBuf::from(path)));
    }
    let Some((scheme, _)) = document.split_once("://") else {
        return Ok(Source::Local(PathBuf::from(document)));
    };
    let unsupported = || Error::UnsupportedScheme(scheme.to_string());
    let url = Url::parse(document).map_err(|_| unsupported())?;
    ObjectStoreScheme::parse(&url).map_err(|_| unsupported())?;
    Ok(Source::Remote(url))
}

/// Reads the document's lines. Store credentials and endpoints come from
/// the environment (`AWS_*`, `GOOGLE_*`, `AZURE_*`).
pub async fn load_document(source: &Source) -> Result<Input> {
    match source {
        Source::Local(path) => read_lines(path),
        Source::Remote(url) => {
            let options = env::vars().map(|(key, value)| (key.to_ascii_lowercase(), value));
            let (store, location) =
                object_store::parse_url_opts(url, options).map_err(|source| {
                    Error::ObjectStore {
                        uri: url.to_string(),
                        source,
                    }
                })?;
            debug!(%url, %location, "fetching document from object storage");
            read_object(store.as_ref(), &location, url.as_str()).await
        }
    }
}

/// Drives `future` to completion on a fresh multi-threaded runtime.
///
/// Blocking tagging calls abandoned after a timeout get at most `grace` to
/// finish before the runtime is torn down.
pub fn block_on<F: Future>(future: F, grace: Duration) -> io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

/// `<stem>res.txt` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{stem}res.txt"))
}

/// The `.partial` sibling holding counts flushed by an aborted run.
pub fn partial_output_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    output.with_file_name(name)
}

pub async fn run(
    mode: Mode,
    document: &str,
    output: &Path,
    config: PipelineConfig,
    oracle: Arc<dyn NameOracle>,
) -> Result<Report> {
    config.validate()?;
    let start = Instant::now();

    let source = resolve_source(document)?;
    let input = load_document(&source).await?;
    info!(document, lines = input.len(), "loaded document");

    let outcome = match mode {
        Mode::Sequential => SequentialMapReduce::new(config, oracle).run(input).await,
        Mode::Distributed => ParallelMapReduce::new(config, oracle).run(input).await,
    };
    let Output {
        table,
        units,
        skipped,
    } = match outcome {
        Ok(outcome) => outcome,
        Err(Error::OracleFailure {
            unit,
            source,
            partial,
        }) => {
            let report = Report {
                elapsed: start.elapsed(),
                ranked: partial.ranked(),
                units: 0,
                skipped: Vec::new(),
            };
            let partial_path = partial_output_path(output);
            match write_report(&partial_path, &report) {
                Ok(()) => warn!(path = %partial_path.display(), "partial counts written"),
                Err(err) => error!("could not flush partial counts: {err}"),
            }
            return Err(Error::OracleFailure {
                unit,
                source,
                partial,
            });
        }
        Err(err) => return Err(err),
    };

    let ranked = table.ranked();
    let report = Report {
        elapsed: start.elapsed(),
        ranked,
        units,
        skipped,
    };
    write_report(output, &report)?;
    info!(
        names = report.ranked.len(),
        units = report.units,
        skipped = report.skipped.len(),
        seconds = report.elapsed.as_secs_f64(),
        "results saved to {}",
        output.display()
    );
    Ok(report)
}

/// Replaces `path` with the rendered report; an existing file is only
/// swapped out once the new content is fully on disk.
pub fn write_report(path: &Path, report: &Report) -> Result<()> {
    let tmp = temp_sibling(path);
    let written = write_file(&tmp, &report.render()).and_then(|()| fs::rename(&tmp, path));
    written.map_err(|source| {
        let _ = fs::remove_file(&tmp);
        Error::OutputWriteFailure {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(contents.as_bytes())?;
    writer.into_inner().map_err(|err| err.into_error())?.sync_all()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
}
