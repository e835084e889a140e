//! CLI argument definitions using clap

use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

use crate::domain::Marker;

/// Collapsible value trees with skip/invert markers and search filtering
#[derive(Parser, Debug)]
#[command(name = "treemark")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Dataset directory (default: data_dir from config)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/treemark/treemark.toml)
    #[arg(long, global = true, env = "TREEMARK_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List datasets in the data directory
    List,

    /// Render a dataset as a tree
    Show {
        /// Dataset name or path to a .json file
        dataset: String,
        /// Filter nodes by name or value
        #[arg(short, long, default_value = "")]
        query: String,
        /// Set a marker on a node and its subtree: PATH=none|invert|skip
        #[arg(short, long = "mark", value_name = "PATH=MARKER")]
        marks: Vec<MarkSpec>,
        /// Toggle a marker (same marker again clears it), applied after --mark
        #[arg(short, long = "toggle", value_name = "PATH=MARKER")]
        toggles: Vec<MarkSpec>,
        /// Show the root, raw values, markers and render timing
        #[arg(long)]
        debug: bool,
        /// Collapse branches at this depth
        #[arg(long)]
        depth: Option<usize>,
        /// Disable colors
        #[arg(long)]
        plain: bool,
    },

    /// Print the aggregated value of one node
    Value {
        /// Dataset name or path to a .json file
        dataset: String,
        /// Node path like a/b (default: root)
        #[arg(default_value = "")]
        path: String,
        /// Set a marker before computing: PATH=none|invert|skip
        #[arg(short, long = "mark", value_name = "PATH=MARKER")]
        marks: Vec<MarkSpec>,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show config paths
    Path,
}

/// `PATH=MARKER` argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkSpec {
    pub path: String,
    pub marker: Marker,
}

impl FromStr for MarkSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, marker) = s
            .rsplit_once('=')
            .ok_or_else(|| format!("expected PATH=MARKER, got '{s}'"))?;
        let marker = marker.parse::<Marker>().map_err(|e| e.to_string())?;
        Ok(Self {
            path: path.to_string(),
            marker,
        })
    }
}
