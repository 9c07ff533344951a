//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};

use crate::records::{Gender, Role, ScanStatus, ScanType};

/// Login command arguments.
#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Account username
    pub username: String,

    /// Account password
    #[arg(short, long)]
    pub password: String,
}

/// Account management commands (Admin only, except `passwd`).
#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// List all accounts
    List,

    /// Create an account
    Add {
        /// Username (must be unique)
        username: String,

        /// Initial password
        #[arg(short, long)]
        password: String,

        /// Account role
        #[arg(short, long, value_enum, default_value = "doctor")]
        role: RoleArg,
    },

    /// Change an account's username, role, or password
    Edit {
        /// Account id
        id: String,

        /// New username
        #[arg(short, long)]
        username: Option<String>,

        /// New role
        #[arg(short, long, value_enum)]
        role: Option<RoleArg>,

        /// New password
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Delete an account
    Delete {
        /// Account id
        id: String,
    },

    /// Change the logged-in account's password
    Passwd {
        /// Current password
        #[arg(long)]
        current: String,

        /// New password
        #[arg(long)]
        new: String,
    },
}

/// Patient commands.
#[derive(Debug, Subcommand)]
pub enum PatientCommand {
    /// List patients
    List {
        /// Only patients whose name or code contains this text
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Register a patient
    Add(PatientAddCommand),

    /// Show a patient and their scans
    Show {
        /// Patient id
        id: String,
    },

    /// Update a patient's details
    Edit {
        /// Patient id
        id: String,

        /// New name (also updated on the patient's scans)
        #[arg(short, long)]
        name: Option<String>,

        /// New age
        #[arg(short, long)]
        age: Option<u32>,

        /// New contact number
        #[arg(long)]
        contact: Option<String>,

        /// New patient code
        #[arg(long)]
        code: Option<String>,

        /// New gender
        #[arg(short, long, value_enum)]
        gender: Option<GenderArg>,

        /// Remove the recorded gender
        #[arg(long, conflicts_with = "gender")]
        clear_gender: bool,

        /// New notes
        #[arg(long)]
        notes: Option<String>,

        /// Remove the notes
        #[arg(long, conflicts_with = "notes")]
        clear_notes: bool,
    },
}

/// Patient registration arguments.
#[derive(Debug, Args)]
pub struct PatientAddCommand {
    /// Full name
    pub name: String,

    /// Age in years
    #[arg(short, long)]
    pub age: u32,

    /// Contact number
    #[arg(long)]
    pub contact: String,

    /// Patient code (defaults to the next free `P-NNNNN`)
    #[arg(long)]
    pub code: Option<String>,

    /// Gender
    #[arg(short, long, value_enum)]
    pub gender: Option<GenderArg>,

    /// Notes
    #[arg(long)]
    pub notes: Option<String>,
}

/// Scan commands.
#[derive(Debug, Subcommand)]
pub enum ScanCommand {
    /// List scans
    List {
        /// Only scans whose patient name or type contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only scans with this status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Only scans of this patient id
        #[arg(short, long)]
        patient: Option<String>,
    },

    /// Upload a scan for a patient
    Add(ScanAddCommand),

    /// Show a scan
    Show {
        /// Scan id
        id: String,
    },

    /// Submit a review of a pending scan (Doctor only)
    Review {
        /// Scan id
        id: String,

        /// Review outcome
        #[arg(short, long, value_enum, default_value = "reviewed")]
        status: StatusArg,

        /// Review notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Override a scan's status without touching review details
    SetStatus {
        /// Scan id
        id: String,

        /// New status
        #[arg(value_enum)]
        status: StatusArg,
    },
}

/// Scan upload arguments.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("image").required(true)))]
pub struct ScanAddCommand {
    /// Patient id
    pub patient: String,

    /// Scan modality
    #[arg(short = 't', long = "type", value_enum)]
    pub scan_type: ScanTypeArg,

    /// File holding the encoded image payload (e.g. a data URL)
    #[arg(long, group = "image")]
    pub image_file: Option<PathBuf>,

    /// Encoded image payload given inline
    #[arg(long, group = "image")]
    pub image_data: Option<String>,
}

/// Report commands.
#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Show dashboard counts
    Stats,

    /// Show per-status counts and scans
    Show {
        /// Only scans of this patient id
        #[arg(short, long)]
        patient: Option<String>,
    },

    /// Export the report as JSON
    Export {
        /// Only scans of this patient id
        #[arg(short, long)]
        patient: Option<String>,

        /// Output file or directory (defaults to the configured export dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

/// Role argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Account manager
    Admin,
    /// Scan reviewer
    Doctor,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Self::Admin,
            RoleArg::Doctor => Self::Doctor,
        }
    }
}

/// Gender argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GenderArg {
    /// Male
    Male,
    /// Female
    Female,
    /// Other
    Other,
    /// Prefer not to say
    PreferNotToSay,
}

impl From<GenderArg> for Gender {
    fn from(arg: GenderArg) -> Self {
        match arg {
            GenderArg::Male => Self::Male,
            GenderArg::Female => Self::Female,
            GenderArg::Other => Self::Other,
            GenderArg::PreferNotToSay => Self::PreferNotToSay,
        }
    }
}

/// Scan modality argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScanTypeArg {
    /// Computed tomography
    Ct,
    /// Plain radiograph
    XRay,
}

impl From<ScanTypeArg> for ScanType {
    fn from(arg: ScanTypeArg) -> Self {
        match arg {
            ScanTypeArg::Ct => Self::Ct,
            ScanTypeArg::XRay => Self::XRay,
        }
    }
}

/// Scan status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Not yet reviewed
    Pending,
    /// Reviewed
    Reviewed,
    /// Requires follow-up
    FollowUp,
}

impl From<StatusArg> for ScanStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => Self::Pending,
            StatusArg::Reviewed => Self::Reviewed,
            StatusArg::FollowUp => Self::RequiresFollowUp,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// JSON output
    Json,
}
