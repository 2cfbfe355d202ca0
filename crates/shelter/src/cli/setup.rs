use clap::{Parser, Subcommand, ValueEnum};
use shelterapp::model::DocumentType;
use shelterapp::views::Wing;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "shelter",
    bin_name = "shelter",
    version,
    disable_help_subcommand = true
)]
#[command(about = "Resident roster and document administration for a reception shelter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true, value_name = "DIR", help_heading = "Options")]
    pub data: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, help_heading = "Options")]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true, help_heading = "Options")]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    In,
    Out,
}

impl From<TypeArg> for DocumentType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::In => DocumentType::In,
            TypeArg::Out => DocumentType::Out,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum WingArg {
    North,
    South,
}

impl From<WingArg> for Wing {
    fn from(value: WingArg) -> Self {
        match value {
            WingArg::North => Wing::North,
            WingArg::South => Wing::South,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List residents
    #[command(alias = "ls", display_order = 1)]
    Residents {
        /// Only residents of this room
        #[arg(long, conflicts_with_all = ["out", "wing"])]
        room: Option<String>,

        /// Only residents of this wing
        #[arg(long, value_enum, conflicts_with = "out")]
        wing: Option<WingArg>,

        /// List checked-out residents instead
        #[arg(long)]
        out: bool,
    },

    /// Add a resident
    #[command(display_order = 2)]
    Add {
        #[arg(long)]
        badge: String,

        #[arg(long)]
        first: String,

        #[arg(long)]
        last: String,

        #[arg(long)]
        room: Option<String>,
    },

    /// Change resident fields, given as key=value pairs
    #[command(display_order = 3)]
    Update {
        id: i64,

        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Delete one or more residents
    #[command(alias = "rm", display_order = 4)]
    Delete {
        #[arg(required = true, num_args = 1..)]
        ids: Vec<i64>,
    },

    /// Check a resident out and move their documents to OUT
    #[command(display_order = 5)]
    Checkout { id: i64 },

    /// Move a resident's IN documents to OUT
    #[command(display_order = 10)]
    Migrate { id: i64 },

    /// Copy a resident's IN documents to OUT, keeping the originals
    #[command(display_order = 11)]
    Copy { id: i64 },

    /// Create missing document rows for stored files of a badge
    #[command(display_order = 12)]
    Sync {
        badge: String,

        resident_id: i64,

        #[arg(long = "type", value_enum, default_value = "in")]
        document_type: TypeArg,
    },

    /// Delete a resident's IN and OUT folders
    #[command(display_order = 13)]
    Cleanup { id: i64 },

    /// Count a resident's IN and OUT documents
    #[command(display_order = 14)]
    Status { id: i64 },

    /// Remove duplicate document rows
    #[command(display_order = 15)]
    Dedupe,

    /// Kitchen list, sorted by room
    #[command(display_order = 20)]
    Kitchen,

    /// Beds taken per room and wing
    #[command(display_order = 21)]
    Occupancy,
}
