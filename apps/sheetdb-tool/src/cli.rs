use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON fixture describing tables, columns and rows
    #[arg(short, long)]
    pub fixture: PathBuf,

    /// Engine configuration JSON; unset keys keep their defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a table's columns
    Columns {
        /// Table id
        #[arg(short, long)]
        table: u64,
    },

    /// Print a table's decoded rows
    Rows {
        /// Table id
        #[arg(short, long)]
        table: u64,
    },

    /// Print the lookup options a table offers
    Lookup {
        /// Target table id
        #[arg(short, long)]
        table: u64,

        /// Column id used for labels
        #[arg(short, long)]
        display: Option<u64>,
    },

    /// Check and add a column, given as a JSON column spec
    AddColumn {
        /// Table id
        #[arg(short, long)]
        table: u64,

        /// Column spec, e.g. '{"name":"Price","dataType":"REAL"}'
        #[arg(short, long)]
        spec: String,
    },

    /// Validate and submit a record through the form controller
    Submit {
        /// Table id
        #[arg(short, long)]
        table: u64,

        /// Row id to edit; omitted for a new record
        #[arg(short, long)]
        row: Option<u64>,

        /// Field assignment `name=value`; values parse as JSON, else as text
        #[arg(short = 's', long = "set")]
        fields: Vec<String>,

        /// Accept every image URL without fetching it
        #[arg(long)]
        skip_image_check: bool,
    },
}
