use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "dayfall", version, about = "Turn-based dungeon crawl on a text grid")]
pub(crate) struct Cli {
    /// JSON config file (falls back to DAYFALL_CONFIG, then defaults)
    #[arg(long, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Read moves from a script file instead of stdin
    #[arg(long, value_name = "PATH")]
    pub(crate) script: Option<PathBuf>,

    /// Run ticks back-to-back instead of at wall-clock pace
    #[arg(long)]
    pub(crate) unpaced: bool,

    /// Stop after this many ticks
    #[arg(long, value_name = "N")]
    pub(crate) max_ticks: Option<u64>,

    /// Board seed; overrides the config file
    #[arg(long)]
    pub(crate) seed: Option<u64>,
}
