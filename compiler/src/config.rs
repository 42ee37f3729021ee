//! Run configuration.

use std::path::{Path, PathBuf};

use breeze_schema::Options;
use serde::Deserialize;

use crate::{error::BreezeError, parser::BREEZE, registry::ALL, utils::quote};

/// How one generation run is set up.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry name of the parser
    pub parser:          String,
    /// Comma-separated backend names, or `all`
    pub templates:       String,
    /// Output root; each backend writes below `<write_path>/<backend name>/`
    pub write_path:      Option<PathBuf>,
    /// Run-level options, inherited by every schema that does not set them
    pub options:         Options,
    /// Collapse the package of every schema onto this one
    pub uniform_package: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parser:          BREEZE.to_string(),
            templates:       ALL.to_string(),
            write_path:      None,
            options:         Options::new(),
            uniform_package: None,
        }
    }
}

impl Config {
    /// Reads a JSON config file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Config, BreezeError> {
        let text = std::fs::read_to_string(path).map_err(|e| BreezeError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| BreezeError::Config(format!("{}: {}", path.display(), e)))
    }
}

/// Parses `key=value,key2=value2` as passed on the command line.
pub fn parse_options(text: &str) -> Result<Options, BreezeError> {
    let mut options = Options::new();
    for item in text.split(',').map(str::trim).filter(|i| !i.is_empty()) {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| BreezeError::Config(format!("wrong option {}, expected key=value", quote(item))))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(BreezeError::Config(format!("option without key: {}", quote(item))));
        }
        options.insert(key.to_string(), value.trim().to_string());
    }
    Ok(options)
}
