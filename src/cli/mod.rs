//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{DecodeCommand, RunCommand, StoreCommand, ValidateCommand};
use std::ffi::OsString;

/// Host runner for the GNSS tracker
#[derive(Debug, Parser, Clone)]
#[command(name = "tracker")]
#[command(version = "0.1.0")]
#[command(about = "Drives a cellular GNSS tracker modem and ships its fixes as CBOR", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the tracker against a modem bridge
    Run(RunCommand),

    /// Validate a tracker configuration
    Validate(ValidateCommand),

    /// Decode a raw CBOR control message
    Decode(DecodeCommand),

    /// Show the contents of a store image
    Store(StoreCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
