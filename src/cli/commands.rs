//! CLI command definitions

use clap::Args;

/// Run the tracker
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to tracker YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Modem bridge address, overriding the configured one
    #[arg(short, long)]
    pub modem: Option<String>,

    /// Stop after this many completed cycles
    #[arg(long)]
    pub cycles: Option<u64>,

    /// Keep the store in memory only
    #[arg(long)]
    pub no_store: bool,
}

/// Validate a tracker configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to tracker YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Decode a control message
#[derive(Debug, Args, Clone)]
pub struct DecodeCommand {
    /// File holding the raw CBOR bytes
    #[arg(short, long)]
    pub file: String,
}

/// Inspect a store image
#[derive(Debug, Args, Clone)]
pub struct StoreCommand {
    /// Store image path; defaults to the user data directory
    #[arg(short, long)]
    pub path: Option<String>,
}
