//! CLI entry point for citeforge.

use std::sync::Arc;

use anyhow::{Context, Result};
use citeforge_core::{
    ApiKeys, ArticlePipeline, AuthorBatchCoordinator, BibtexStore, EngineConfig, RunCoordinator,
    SourceRegistry, SummaryCsvWriter, load_config, read_authors,
};
use clap::Parser;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let loaded = load_config(args.config.as_deref())?;
    if let Some(path) = loaded.path.as_deref().filter(|_| loaded.loaded_from_file) {
        info!(path = %path.display(), "using config file");
    }
    let mut config = loaded.config;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .context("invalid value after applying command-line flags")?;

    let authors = read_authors(&args.input)?;
    info!(
        authors = authors.len(),
        input = %args.input.display(),
        "citeforge starting"
    );

    let order = Arc::new(config.trust_order()?);
    let keys = ApiKeys::load(&args.keys_dir);
    debug!(?keys, "API keys loaded");

    let registry = SourceRegistry::from_config(&config, &order, &keys)
        .context("failed to build source clients")?;
    let store = BibtexStore::new(&config.output);
    let summary_path = config.output.summary_path();
    let summary = SummaryCsvWriter::open(&summary_path, &order)?;

    let pipeline = ArticlePipeline::new(&config, order, Arc::new(registry), Arc::new(store));
    let coordinator = AuthorBatchCoordinator::new(&config, pipeline);
    let run = RunCoordinator::new(coordinator, config.concurrency.author_workers);

    let (report, summary) = run.run(authors, summary).await?;

    for (author, error) in report.failures() {
        warn!(author = %author, kind = error.kind(), error = %error, "author not processed");
    }
    info!(
        saved = report.saved(),
        skipped = report.skipped(),
        failed_authors = report.failures().count(),
        summary_rows = summary.len(),
        summary = %summary.path().display(),
        "Run complete"
    );
    if report.sink_errors > 0 {
        warn!(errors = report.sink_errors, "some summary rows were not written");
    }

    Ok(())
}

/// Command-line flags take precedence over file values.
fn apply_overrides(config: &mut EngineConfig, args: &Args) {
    if let Some(dir) = &args.output {
        config.output.dir.clone_from(dir);
    }
    if let Some(workers) = args.workers {
        config.concurrency.author_workers = usize::from(workers);
    }
    if let Some(workers) = args.article_workers {
        config.concurrency.article_workers = usize::from(workers);
    }
    if let Some(delay) = args.delay_ms {
        config.concurrency.article_delay_ms = delay;
    }
    if args.no_reuse {
        config.discovery.reuse_saved_records = false;
    }
}
