pub mod format;
pub mod toml_config;

use crate::rules::RuleId;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "scriptwise",
    version,
    about = "Check control-system scripts against the recommended idioms"
)]
pub struct Cli {
    /// Files or directories to check
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Apply safe rewrites in place
    #[arg(long)]
    pub fix: bool,

    /// Run only this rule
    #[arg(long, value_name = "NAME")]
    pub rule: Option<RuleId>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Path to a scriptwise.toml config file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Worker threads (0 = one per core)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Per-file analysis budget in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// List the available rules and exit
    #[arg(long)]
    pub list_rules: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
