//! Command-line interface for mediscan.
//!
//! This module provides the CLI structure for the `mediscan` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AccountCommand, ConfigCommand, GenderArg, LoginCommand, OutputFormat, PatientAddCommand,
    PatientCommand, ReportCommand, RoleArg, ScanAddCommand, ScanCommand, ScanTypeArg, StatusArg,
};

/// mediscan - Patient and scan records for a small clinic
///
/// Keeps accounts, patients and diagnostic scans in a local database.
/// Admins manage accounts; doctors review scans.
#[derive(Debug, Parser)]
#[command(name = "mediscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain", global = true)]
    pub format: OutputFormat,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and start a session
    Login(LoginCommand),

    /// End the current session
    Logout,

    /// Show the logged-in account
    Whoami,

    /// Manage accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Manage patients
    #[command(subcommand)]
    Patient(PatientCommand),

    /// Manage scans
    #[command(subcommand)]
    Scan(ScanCommand),

    /// Dashboard counts and scan reports
    #[command(subcommand)]
    Report(ReportCommand),

    /// Erase all records and restore the default accounts (Admin only)
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
