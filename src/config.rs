//! Configuration for taillight.
//!
//! Values come from built-in defaults, then an optional
//! `config.toml` in the user config directory, then `TAILLIGHT_*`
//! environment variables, last one wins.

use std::path::PathBuf;

use serde::Deserialize;

use crate::tail::{DEFAULT_FETCH_MAX_LINES, DEFAULT_LIMIT_BYTES, DEFAULT_POLL_INTERVAL_MS};

pub const DEFAULT_BUFFER_CAPACITY: usize = 2000;
const APP_DIR: &str = "taillight";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of log lines to keep in the ring buffer
    pub buffer_capacity: usize,
    /// Delay between tail polls while following
    pub poll_interval_ms: u64,
    /// Byte budget per poll
    pub limit_bytes: u64,
    /// Line budget per poll
    pub fetch_max_lines: usize,
    /// Font size the line height is derived from
    pub font_size: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            limit_bytes: DEFAULT_LIMIT_BYTES,
            fetch_max_lines: DEFAULT_FETCH_MAX_LINES,
            font_size: 12,
        }
    }
}

impl Config {
    pub fn load() -> Self {
        Self::from_config_file()
            .unwrap_or_default()
            .with_overrides(|name| std::env::var(name).ok())
    }

    fn from_config_file() -> Option<Self> {
        let path = Self::config_dir()?.join("config.toml");
        let raw = std::fs::read_to_string(path).ok()?;
        toml::from_str(&raw).ok()
    }

    /// Apply `TAILLIGHT_*` overrides from the given lookup.
    pub fn with_overrides(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        fn parse<T: std::str::FromStr>(
            get: &impl Fn(&str) -> Option<String>,
            name: &str,
        ) -> Option<T> {
            get(name).and_then(|s| s.parse().ok())
        }

        if let Some(v) = parse(&get, "TAILLIGHT_BUFFER_CAPACITY") {
            self.buffer_capacity = v;
        }
        if let Some(v) = parse(&get, "TAILLIGHT_POLL_INTERVAL_MS") {
            self.poll_interval_ms = v;
        }
        if let Some(v) = parse(&get, "TAILLIGHT_LIMIT_BYTES") {
            self.limit_bytes = v;
        }
        if let Some(v) = parse(&get, "TAILLIGHT_FETCH_MAX_LINES") {
            self.fetch_max_lines = v;
        }
        if let Some(v) = parse(&get, "TAILLIGHT_FONT_SIZE") {
            self.font_size = v;
        }
        self
    }

    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR))
    }

    /// Where viewer preferences are kept.
    pub fn prefs_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("prefs.json"))
    }

    /// Where the debug log goes (the terminal itself is taken by the TUI).
    pub fn log_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join(APP_DIR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.buffer_capacity, 2000);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.limit_bytes, 65536);
        assert_eq!(config.fetch_max_lines, 400);
        assert_eq!(config.font_size, 12);
    }

    #[test]
    fn test_toml_fills_missing_fields() {
        let config: Config = toml::from_str("buffer_capacity = 500\nfont_size = 14\n").unwrap();
        assert_eq!(config.buffer_capacity, 500);
        assert_eq!(config.font_size, 14);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_env_overrides_win() {
        let config = Config::default().with_overrides(|name| match name {
            "TAILLIGHT_POLL_INTERVAL_MS" => Some("250".to_string()),
            "TAILLIGHT_FETCH_MAX_LINES" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.poll_interval_ms, 250);
        // Unparseable values are ignored
        assert_eq!(config.fetch_max_lines, 400);
    }
}
