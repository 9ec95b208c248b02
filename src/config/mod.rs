//! Startup configuration: command-line flags and the YAML route file.

mod core;

pub use self::core::{ConfigError, ConfigResult, KioskArgs, load_routes, parse_color, parse_routes};
