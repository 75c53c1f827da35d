//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nwbi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/nwbi/config.toml)
    #[arg(long, global = true, env = "NWBI_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print errors as a JSON envelope on stderr
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline and print the KPI report
    Kpis {
        /// Input document: {"tables": {"<name>": {"columns": [...], "rows": [[...]]}}}
        input: PathBuf,
    },

    /// Build and print the fact table as JSON rows
    Facts {
        /// Input document
        input: PathBuf,
    },

    /// Normalize every table and print the quality reports
    Quality {
        /// Input document
        input: PathBuf,
    },
}

impl Commands {
    pub fn input(&self) -> &PathBuf {
        match self {
            Self::Kpis { input } | Self::Facts { input } | Self::Quality { input } => input,
        }
    }
}
