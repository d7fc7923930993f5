//! Command Line Interface (CLI) arguments.

use clap::{Parser, ValueEnum};
use strum_macros::Display;

/// Operations available from the command line
#[derive(Clone, Copy, Debug, Display, PartialEq, ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum OperationKind {
    /// Sum the source elements that share an index
    Add,
    /// Maximum of the source elements that share an index, with its position
    Max,
    /// Select source elements along the axis
    Gather,
    /// Softmax over the source elements that share an index
    Softmax,
}

/// Scatter reduce command line interface
#[derive(Clone, Debug, Parser)]
#[command(version, about)]
pub struct CommandLineArgs {
    /// Operation to perform
    #[arg(value_enum)]
    pub operation: OperationKind,
    /// Path to the JSON request describing the source array and index
    #[arg(long, env = "SCATTER_REDUCE_REQUEST")]
    pub request: String,
    /// Path to the raw, native-endian source array
    #[arg(long, env = "SCATTER_REDUCE_SOURCE")]
    pub source: String,
    /// Path to which the result array is written. If unset, only the response header is printed.
    #[arg(long, env = "SCATTER_REDUCE_OUTPUT")]
    pub output: Option<String>,
    /// Whether to use Rayon to process independent lanes in parallel.
    #[arg(long, default_value_t = false, env = "SCATTER_REDUCE_USE_RAYON")]
    pub use_rayon: bool,
    /// Whether to pretty print the JSON response header.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

/// Returns parsed command line arguments.
pub fn parse() -> CommandLineArgs {
    CommandLineArgs::parse()
}
