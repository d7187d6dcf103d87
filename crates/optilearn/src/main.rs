//! # OptiLearn CLI (`optilearn`)
//!
//! ## Usage
//!
//! ```bash
//! optilearn --config ./config/optilearn.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `optilearn recommend "<text>"` | Rank courses and certificates for a requirement |
//! | `optilearn build-corpus <dir> --output <file>` | Embed syllabus JSON into a course corpus |
//! | `optilearn stats` | Summarize the configured corpora |
//! | `optilearn serve` | Start the HTTP API |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `optilearn=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use optilearn::config;
use optilearn::recommend::{self, CorpusSelection, RecommendOptions};
use optilearn::{build_corpus, server, stats};

/// OptiLearn: course and certificate recommendations for training proposals.
#[derive(Parser)]
#[command(
    name = "optilearn",
    about = "OptiLearn: course and certificate recommendations for corporate training proposals",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/optilearn.toml`. See
    /// `config/optilearn.example.toml` for every setting.
    #[arg(long, global = true, default_value = "./config/optilearn.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend courses and certificates for a requirement text.
    Recommend {
        /// Free-text description of the training need.
        requirements: String,

        /// Share of technical content wanted, 0 (business) to 100 (technical).
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        tech_ratio: Option<u8>,

        /// Which corpus to rank (defaults to every corpus set in `[corpus]`).
        #[arg(long, value_enum)]
        corpus: Option<CorpusSelection>,

        /// Results per corpus (defaults to `[engine]` top_k_courses / top_k_certificates).
        #[arg(long)]
        top_k: Option<usize>,

        /// Organization name recorded in the report.
        #[arg(long)]
        organization: Option<String>,

        /// Write a recommendation report (JSON) to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print results as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Build a course corpus from extracted syllabus JSON files.
    ///
    /// Failed embeddings are written as zero-vector placeholders and listed
    /// in the summary.
    BuildCorpus {
        /// Directory containing syllabus `.json` files (searched recursively).
        dir: PathBuf,

        /// Output corpus file.
        #[arg(long)]
        output: PathBuf,
    },

    /// Show record counts, dimensionality and type distribution per corpus.
    Stats {
        #[arg(long, value_enum)]
        corpus: Option<CorpusSelection>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("optilearn=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Recommend {
            requirements,
            tech_ratio,
            corpus,
            top_k,
            organization,
            output,
            json,
        } => {
            recommend::run_recommend(
                &cfg,
                RecommendOptions {
                    requirements,
                    tech_ratio,
                    selection: corpus,
                    top_k,
                    organization,
                    output,
                    json,
                },
            )
            .await?;
        }
        Commands::BuildCorpus { dir, output } => {
            build_corpus::run_build_corpus(&cfg, &dir, &output).await?;
        }
        Commands::Stats { corpus } => {
            let selection =
                corpus.unwrap_or_else(|| CorpusSelection::configured(&cfg.corpus));
            stats::run_stats(&cfg, selection).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
