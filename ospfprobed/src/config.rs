//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use ospfprobe_core::interface::LinkType;
use ospfprobe_packet::options::Options;
use serde::Deserialize;

/// Start-up configuration, loaded once from a TOML file and never reloaded
/// (§6: "provided at start-up, no reload").
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub router_id: Ipv4Addr,
    pub area: Ipv4Addr,
    pub interface_name: String,
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    #[serde(default)]
    pub link_type: ConfigLinkType,
    #[serde(default = "default_hello_interval")]
    pub hello_interval: u16,
    #[serde(default = "default_rxmt_interval")]
    pub rxmt_interval: u16,
    #[serde(default)]
    pub options: String,
    #[serde(default)]
    pub packet_display: bool,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub query: Query,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigLinkType {
    #[default]
    Broadcast,
    PointToPoint,
}

impl From<ConfigLinkType> for LinkType {
    fn from(link_type: ConfigLinkType) -> LinkType {
        match link_type {
            ConfigLinkType::Broadcast => LinkType::Broadcast,
            ConfigLinkType::PointToPoint => LinkType::PointToPoint,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub level: String,
    pub file: Option<String>,
    pub style: LoggingStyle,
}

impl Default for Logging {
    fn default() -> Logging {
        Logging {
            level: "info".to_owned(),
            file: None,
            style: LoggingStyle::Compact,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingStyle {
    Compact,
    Json,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Query {
    pub bind_host: String,
    pub bind_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for Query {
    fn default() -> Query {
        Query {
            bind_host: "127.0.0.1".to_owned(),
            bind_port: 2328,
            username: None,
            password: None,
        }
    }
}

fn default_mtu() -> u16 {
    1500
}

fn default_hello_interval() -> u16 {
    10
}

fn default_rxmt_interval() -> u16 {
    5
}

/// Errors that keep the probe from starting. Each maps to a distinct
/// non-zero exit code (§6).
#[derive(Debug)]
pub enum ConfigError {
    ReadFile(std::io::Error),
    Parse(toml::de::Error),
    IllegalHelloInterval(u16),
    IllegalOptions(String),
    UnresolvableInterface(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadFile(error) => write!(f, "failed to read configuration file: {error}"),
            ConfigError::Parse(error) => write!(f, "failed to parse configuration file: {error}"),
            ConfigError::IllegalHelloInterval(value) => {
                write!(f, "illegal hello_interval: {value}")
            }
            ConfigError::IllegalOptions(error) => write!(f, "illegal options string: {error}"),
            ConfigError::UnresolvableInterface(name) => {
                write!(f, "interface not found: {name}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    /// Distinct non-zero exit codes per failure category (§6).
    pub fn exit_code(&self) -> i32 {
        match self {
            ConfigError::ReadFile(_) => 2,
            ConfigError::Parse(_) => 3,
            ConfigError::IllegalHelloInterval(_) => 4,
            ConfigError::IllegalOptions(_) => 5,
            ConfigError::UnresolvableInterface(_) => 6,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates fields the codec/FSM cannot reject on their own: an
    /// `options` string naming an unknown flag, an illegal hello interval,
    /// or (when actually opening the socket) an unresolvable interface
    /// name. Run once at start-up, before the socket is opened (§6a).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hello_interval == 0 {
            return Err(ConfigError::IllegalHelloInterval(self.hello_interval));
        }
        self.parsed_options()?;
        Ok(())
    }

    pub fn parsed_options(&self) -> Result<Options, ConfigError> {
        Options::parse_names(&self.options).map_err(ConfigError::IllegalOptions)
    }
}
