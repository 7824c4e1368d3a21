use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{debug, error, info, trace};

use name_freq::{
    config::{DEFAULT_PARTITIONS, DEFAULT_REDUCERS, DEFAULT_WORKERS},
    oracles::PROPER_NAME_TAG,
    pipeline, FailurePolicy, JiebaOracle, LexiconOracle, Mode, NameOracle, PatternOracle,
    PipelineConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Tagger {
    /// jieba part-of-speech tagging, extended by --lexicon
    Jieba,
    /// Longest match over the --lexicon word list only
    Lexicon,
    /// Regex over word tokens, see --name-pattern
    Pattern,
}

/// Rank the person names mentioned in a text document by frequency.
#[derive(Parser, Debug)]
#[command(name = "name-freq", version)]
struct Cli {
    /// Document to analyse: a local path, a file:// URI or an object store
    /// URI (s3://, gs://, az://, http(s)://)
    input: String,
    /// Result file [default: <input stem>res.txt next to the input]
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = Mode::Sequential)]
    mode: Mode,
    /// Lines merged into one text unit [default: 1000 sequential, 100 distributed]
    #[arg(short, long)]
    batch_size: Option<usize>,
    #[arg(long, value_enum, default_value_t = FailurePolicy::Skip)]
    on_oracle_failure: FailurePolicy,
    /// Give up on a text unit after this many milliseconds
    #[arg(long)]
    unit_timeout_ms: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,
    #[arg(long, default_value_t = DEFAULT_REDUCERS)]
    reducers: usize,
    /// Slices the document is split into for the distributed batching stage
    #[arg(long, default_value_t = DEFAULT_PARTITIONS)]
    partitions: usize,
    #[arg(long, value_enum, default_value_t = Tagger::Jieba)]
    tagger: Tagger,
    /// Word list (`word [freq] [tag]` per line): user dictionary for jieba,
    /// the whole vocabulary for the lexicon tagger
    #[arg(long)]
    lexicon: Option<PathBuf>,
    /// Regex a token must match to count as a name with the pattern tagger
    #[arg(long, default_value = PatternOracle::DEFAULT_NAME_PATTERN)]
    name_pattern: String,
    /// Tag marking person names
    #[arg(long, default_value = PROPER_NAME_TAG)]
    name_tag: String,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::for_mode(self.mode)
            .with_failure_policy(self.on_oracle_failure)
            .with_unit_timeout(self.unit_timeout_ms.map(Duration::from_millis))
            .with_workers(self.workers, self.reducers, self.partitions);
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        config.name_tag = self.name_tag.clone();
        config
    }

    fn oracle(&self) -> anyhow::Result<Arc<dyn NameOracle>> {
        match (self.tagger, &self.lexicon) {
            (Tagger::Jieba, lexicon) => {
                let mut oracle = JiebaOracle::new();
                if let Some(path) = lexicon {
                    oracle = oracle.load_user_dict(path).with_context(|| {
                        format!("failed to load user dictionary {}", path.display())
                    })?;
                    info!(path = %path.display(), "user dictionary loaded");
                }
                Ok(Arc::new(oracle))
            }
            (Tagger::Lexicon, Some(path)) => {
                let lexicon = LexiconOracle::load(path)
                    .with_context(|| format!("failed to load lexicon {}", path.display()))?;
                info!(words = lexicon.len(), "lexicon loaded");
                Ok(Arc::new(lexicon))
            }
            (Tagger::Lexicon, None) => bail!("the lexicon tagger needs --lexicon"),
            (Tagger::Pattern, _) => {
                let oracle = PatternOracle::new(&self.name_pattern, self.name_tag.clone())
                    .with_context(|| format!("invalid name pattern `{}`", self.name_pattern))?;
                Ok(Arc::new(oracle))
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(verbose >= 1)
        .with_thread_ids(verbose >= 2)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.pipeline_config();
    let oracle = cli.oracle()?;
    let output = match &cli.output {
        Some(output) => output.clone(),
        None => {
            let source = pipeline::resolve_source(&cli.input)?;
            pipeline::default_output_path(&source.local_path())
        }
    };

    let report = pipeline::run(cli.mode, &cli.input, &output, config, oracle)
        .await
        .with_context(|| format!("analysis of {} failed", cli.input))?;

    println!("cost time: {} s", report.elapsed.as_secs_f64());
    println!("Results saved to {}", output.display());
    for (name, count) in report.ranked.iter().take(10) {
        println!("{name} {count}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    debug!("name-freq started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let outcome = pipeline::block_on(run(cli), pipeline::SHUTDOWN_GRACE)
        .context("failed to start the async runtime")
        .and_then(|result| result);
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Error during analysis: {err:#}");
            ExitCode::FAILURE
        }
    }
}
