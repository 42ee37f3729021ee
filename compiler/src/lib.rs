//! breeze-compiler
//!
//! This crate implements:
//!  1) The line based parser for `.breeze` IDL files,
//!  2) A schema verifier (empty schemas, empty segments, map keys),
//!  3) `GenerationContext`: option inheritance and the cross-file message index,
//!  4) Plugin registries and the two-phase generation pipeline (`Generator`),
//!  5) Built-in `json` and `rust` backends,
//!  6) A best-effort `.proto` to `.breeze` converter,
//!  7) Error types (`BreezeError`) and run configuration (`Config`).
//!
//! ```no_run
//! use std::path::Path;
//! use breeze_compiler::{Config, Generator};
//!
//! let config = Config { templates: "json".into(), ..Config::default() };
//! let report = Generator::default().generate_path(Path::new("schemas"), &config)?;
//! for issue in &report.issues {
//!     eprintln!("warning: {}", issue);
//! }
//! # Ok::<(), breeze_compiler::BreezeError>(())
//! ```

pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod generator;
pub mod parser;
pub mod registry;
pub mod templates;
pub mod traits;
pub mod utils;
pub mod verifier;

pub use config::{parse_options, Config};
pub use context::GenerationContext;
pub use error::BreezeError;
pub use generator::{GenerationIssue, GenerationReport, Generator, Stage};
pub use parser::{parse_schema, BreezeParser};
pub use registry::Registry;
pub use traits::{CodeTemplate, GeneratedFiles, Plugin, SchemaParser};
