//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use clap::Parser;

/// Passive OSPFv2 routing-protocol probe.
#[derive(Debug, Parser)]
#[command(name = "ospfprobed", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "/etc/ospfprobed.toml")]
    pub config: String,

    /// Load and validate configuration, then exit without opening a socket.
    #[arg(long)]
    pub validate_config: bool,

    /// Override the configured log level (e.g. "debug", "warn").
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override the configured log file path.
    #[arg(long)]
    pub log_file: Option<String>,
}
