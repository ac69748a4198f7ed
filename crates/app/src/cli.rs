use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "tally",
    version,
    about = "Reconcile Auto Integrate and CarAdvise exports and compute shop rebates"
)]
pub struct Cli {
    /// System A (Auto Integrate) export.
    #[arg(long = "system-a", value_name = "FILE")]
    pub system_a: PathBuf,

    /// System B (CarAdvise) export.
    #[arg(long = "system-b", value_name = "FILE")]
    pub system_b: PathBuf,

    /// Column layouts and rebate table (defaults to the built-in configuration).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory that receives reconciled.csv and unmatched.csv.
    #[arg(long = "out-dir", value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Print the run summary as JSON.
    #[arg(long = "summary-json")]
    pub summary_json: bool,

    /// Log at debug level (overrides RUST_LOG).
    #[arg(short, long)]
    pub verbose: bool,
}
