use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use syllabus_service::config::Config;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Outputs the result as JSON.
    Json,
    /// Outputs the result as a table.
    Table,
}

/// The collections that can be printed with `show`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    Lessons,
    Notes,
    Quizzes,
    InterviewQuestions,
    DesignPatterns,
    CodingQuestions,
    Roadmap,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Loads every module declared in the manifest and prints the cache statistics.
    Warm,
    /// Prints one collection of the catalog.
    Show {
        collection: Collection,

        /// Only show the lessons of this category.
        ///
        /// Unknown categories resolve to the fallback category of the manifest.
        #[arg(long)]
        category: Option<String>,

        /// Only show the item with this id.
        #[arg(long)]
        id: Option<String>,
    },
    /// Searches all lessons for the given text.
    Search { query: String },
}

/// A utility to inspect a content catalog through the module cache.
///
/// All modules are read and decoded the same way the content service does it, so this doubles
/// as a check that a manifest and its module files are valid.
#[derive(Clone, Parser, Debug)]
#[command(author, version, about, long_about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Path to the content manifest, overriding the one from the configuration file.
    #[arg(long, short)]
    manifest: Option<PathBuf>,

    /// The severity level of logging output.
    ///
    /// Possible values:
    /// off, error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<LevelFilter>,

    /// The output format.
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub command: Command,
    pub config: Config,
    pub output_format: OutputFormat,
}

impl Settings {
    pub fn get() -> Result<Self> {
        let cli = Cli::parse();

        let mut config = Config::get(cli.config.as_deref())?;
        if let Some(manifest) = cli.manifest {
            config.manifest = manifest;
        }
        if let Some(level) = cli.log_level {
            config.logging.level = level;
        }

        Ok(Settings {
            command: cli.command,
            config,
            output_format: cli.format,
        })
    }
}
