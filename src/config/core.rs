use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use crossterm::style::Color;
use serde_yaml::Value;
use thiserror::Error;

use crate::logging::{FileSink, Logger, LoggingResult, StderrSink};
use crate::routes::{RouteError, RouteTable};
use crate::runtime::driver::terminal::TerminalSettings;

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Startup failures. All of them are fatal: nothing is displayed and the
/// control plane never binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed route file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("route file must be a mapping of key: resource pairs")]
    NotAMapping,
    #[error("route key {0} must be a string or number")]
    InvalidKey(String),
    #[error("resource for route `{0}` must be a string")]
    InvalidResource(String),
    #[error("{0}")]
    Routes(#[from] RouteError),
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "kiosk-switcher",
    version,
    about = "Preloads named pages and switches between them over HTTP"
)]
pub struct KioskArgs {
    /// YAML file mapping route keys to resources; the first entry shows on startup
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Control-plane bind host
    #[arg(long, default_value = "0.0.0.0")]
    pub api_host: String,

    /// Control-plane bind port
    #[arg(long, default_value_t = 8080)]
    pub api_port: u16,

    /// Full-screen presentation without chrome
    #[arg(long)]
    pub kiosk: bool,

    /// Hide the cursor in kiosk mode
    #[arg(long)]
    pub no_mouse: bool,

    /// Show only this resource as route `test`, ignoring the config file
    #[arg(long)]
    pub test_url: Option<String>,

    /// Background colour: a name (white, black, ...) or #RRGGBB
    #[arg(long, default_value = "white", value_parser = parse_color)]
    pub bg_color: Color,

    /// Run without a terminal; surfaces exist only in memory
    #[arg(long)]
    pub headless: bool,

    /// Write JSON log lines to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Truncate the log file once it would exceed this size (0 = unlimited)
    #[arg(long, default_value_t = 1024 * 1024)]
    pub log_max_bytes: u64,
}

impl KioskArgs {
    /// Build the route table from `--test-url` or the config file.
    pub fn route_table(&self) -> ConfigResult<RouteTable> {
        match self.test_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => Ok(RouteTable::single("test", url)?),
            _ => load_routes(&self.config),
        }
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// File logging when `--log-file` is given, stderr in headless mode,
    /// otherwise nothing (stderr would scribble over the terminal display).
    pub fn logger(&self) -> LoggingResult<Option<Logger>> {
        if let Some(path) = self.log_file.as_ref() {
            return Ok(Some(Logger::new(FileSink::new(path, self.log_max_bytes)?)));
        }
        if self.headless {
            return Ok(Some(Logger::new(StderrSink)));
        }
        Ok(None)
    }

    pub fn terminal_settings(&self) -> TerminalSettings {
        TerminalSettings {
            background: self.bg_color,
            kiosk: self.kiosk,
            hide_cursor: self.kiosk && self.no_mouse,
        }
    }
}

pub fn load_routes(path: impl AsRef<Path>) -> ConfigResult<RouteTable> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_routes(&text)
}

/// Parse an ordered `key: resource` mapping. Document order is kept.
pub fn parse_routes(text: &str) -> ConfigResult<RouteTable> {
    let has_content = text
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#') && line != "---");
    if !has_content {
        return Err(RouteError::Empty.into());
    }

    let mapping = match serde_yaml::from_str::<Value>(text)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Err(RouteError::Empty.into()),
        _ => return Err(ConfigError::NotAMapping),
    };

    let mut entries = Vec::with_capacity(mapping.len());
    for (key, resource) in mapping {
        let key = match key {
            Value::String(key) => key,
            Value::Number(number) => number.to_string(),
            other => return Err(ConfigError::InvalidKey(format!("{other:?}"))),
        };
        let resource = match resource {
            Value::String(resource) => resource,
            _ => return Err(ConfigError::InvalidResource(key)),
        };
        entries.push((key, resource));
    }
    Ok(RouteTable::from_entries(entries)?)
}

/// Accepts the usual colour names and `#RRGGBB`.
pub fn parse_color(value: &str) -> Result<Color, String> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return Err(format!("invalid hex colour `{value}`"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|err| err.to_string())
        };
        return Ok(Color::Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        });
    }
    let color = match value.to_ascii_lowercase().as_str() {
        "white" => Color::White,
        "black" => Color::Black,
        "grey" | "gray" => Color::Grey,
        "darkgrey" | "darkgray" => Color::DarkGrey,
        "red" => Color::Red,
        "green" => Color::Green,
        "blue" => Color::Blue,
        "yellow" => Color::Yellow,
        "cyan" => Color::Cyan,
        "magenta" => Color::Magenta,
        _ => return Err(format!("unknown colour `{value}`")),
    };
    Ok(color)
}
