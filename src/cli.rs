use crate::model::Severity;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "iac-audit",
    version,
    about = "Security inspect tool for Infrastructure as Code files",
    long_about = "iac-audit runs a set of detection queries against Infrastructure as Code files and reports every misconfiguration it finds, with file and line."
)]
pub struct Cli {
    /// Path to file or directory to scan
    #[arg(short, long)]
    pub path: PathBuf,

    /// Path to directory with queries
    #[arg(short, long, default_value = "./assets/queries")]
    pub queries_path: PathBuf,

    /// File path to store the scan summary in JSON format
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// File path to store the parsed source representation in JSON format
    #[arg(short = 'd', long)]
    pub payload_path: Option<PathBuf>,

    /// Lowest severity that makes the scan exit with a non-zero code
    #[arg(long, value_enum, default_value_t = Severity::Info)]
    pub fail_on: Severity,

    /// Verbose scan
    #[arg(short, long)]
    pub verbose: bool,
}
