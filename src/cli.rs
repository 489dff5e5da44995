use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "lv2file", version)]
#[command(about = "Apply an LV2 plugin to a sound file", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $LV2FILE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// More diagnostics; repeat for more
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Fewer diagnostics; repeat for fewer
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List installed plugins
    List,

    /// List the input ports of a plugin
    Ports {
        /// Plugin URI or listing index
        plugin: String,
    },

    /// List the presets of a plugin
    Presets {
        /// Plugin URI or listing index
        plugin: String,
    },

    /// Process a sound file
    Apply(ApplyArgs),
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Input sound file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output sound file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Connections, `channel:port[.instance]` separated by commas
    #[arg(short = 'c', long = "connect", value_name = "RULES")]
    pub connections: Vec<String>,

    /// Control values, `port:value` separated by commas
    #[arg(short = 'p', long = "parameters", value_name = "VALUES")]
    pub controls: Vec<String>,

    /// Frames per processing block
    #[arg(short, long)]
    pub blocksize: Option<usize>,

    /// Preset to load before applying control values
    #[arg(short = 'P', long)]
    pub preset: Option<String>,

    /// Mix all channels into the single input of a mono plugin
    #[arg(short = 'm', long = "mono")]
    pub mixdown: bool,

    /// Skip the clipping scan
    #[arg(long)]
    pub ignore_clipping: bool,

    /// Plugin URI or listing index
    pub plugin: String,
}
