use std::path::PathBuf;

use breeze_schema::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BreezeError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Type error at line {line}: {source}")]
    Grammar {
        line:   usize,
        #[source]
        source: TypeError,
    },

    #[error("Syntax error at line {line}: {msg}")]
    Syntax {
        msg:  String,
        line: usize,
    },

    #[error("Structural error: {0}")]
    Structural(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template {template} failed: {msg}")]
    Template {
        template: String,
        msg:      String,
    },
}

impl BreezeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BreezeError::Io { path: path.into(), source }
    }
}
