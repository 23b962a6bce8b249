use crate::io::OutputFormat;
use crate::planner::EngineKind;
use crate::search::RunOrder;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RunOrderArg {
    /// Try long statement runs before their sub-runs
    LongestFirst,
    /// Try single statements before longer runs
    ShortestFirst,
}

impl From<RunOrderArg> for RunOrder {
    fn from(arg: RunOrderArg) -> Self {
        match arg {
            RunOrderArg::LongestFirst => RunOrder::LongestFirst,
            RunOrderArg::ShortestFirst => RunOrder::ShortestFirst,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cogsaw")]
#[command(about = "Cognitive-complexity extraction planner", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (TOML); flags override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan extractions for every method of a file
    Analyze {
        /// Java source file
        path: PathBuf,

        /// Only the N-th method (0-based)
        #[arg(long)]
        method: Option<usize>,

        /// Complexity threshold for main and extracted methods
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Search engine
        #[arg(short, long, value_enum)]
        engine: Option<EngineKind>,

        /// Run enumeration order for the exhaustive engine
        #[arg(long, value_enum)]
        run_order: Option<RunOrderArg>,

        /// Evaluation cap for the exhaustive engine
        #[arg(long)]
        max_evaluations: Option<u64>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "terminal")]
        format: OutputFormat,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Apply the best solution and emit the rewritten source
    Refactor {
        /// Java source file
        path: PathBuf,

        /// Method to refactor (0-based); defaults to the first one over
        /// the threshold
        #[arg(long)]
        method: Option<usize>,

        /// Complexity threshold
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Search engine
        #[arg(short, long, value_enum)]
        engine: Option<EngineKind>,

        /// Rewrite the file in place
        #[arg(long)]
        write: bool,

        /// Write the transformed source here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Eager-fill the feasibility cache for one method and dump it as CSV
    Cache {
        /// Java source file
        path: PathBuf,

        /// Method to probe (0-based)
        #[arg(long, default_value = "0")]
        method: usize,

        /// Write the CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
