//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Build verified BibTeX libraries for a list of authors.
///
/// Citeforge discovers each author's recent works, asks bibliographic sources
/// for matching records, locks DOIs where possible and writes one `.bib` file
/// per work together with a `summary.csv` of where every record came from.
#[derive(Parser, Debug)]
#[command(name = "citeforge")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Author list CSV (name, scholar_id, dblp, publications)
    #[arg(short, long, default_value = "authors.csv")]
    pub input: PathBuf,

    /// Config file (defaults to $XDG_CONFIG_HOME/citeforge/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output directory for author folders and summary.csv
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory holding SerpAPI.key, Semantic.key and Email.key
    #[arg(long, default_value = "keys")]
    pub keys_dir: PathBuf,

    /// Authors processed concurrently (1-64)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u16).range(1..=64))]
    pub workers: Option<u16>,

    /// Concurrent source calls per article (1-32)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=32))]
    pub article_workers: Option<u16>,

    /// Delay between articles of one author in milliseconds (max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay_ms: Option<u64>,

    /// Ignore .bib files saved by earlier runs
    #[arg(long)]
    pub no_reuse: bool,
}
