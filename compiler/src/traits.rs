use std::collections::BTreeMap;

use breeze_schema::Schema;

use crate::{context::GenerationContext, error::BreezeError};

/// Named output buffers of a backend, keyed by path relative to the
/// backend's output directory. Keys use `/` as separator.
pub type GeneratedFiles = BTreeMap<String, Vec<u8>>;

/// Anything that can be looked up by name in a [`Registry`](crate::registry::Registry).
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
}

/// Turns the raw bytes of one source file into a [`Schema`].
pub trait SchemaParser: Plugin {
    /// Files not ending in this suffix are skipped when walking directories.
    fn file_suffix(&self) -> &str;

    fn parse_schema(&self, content: &[u8], context: &GenerationContext) -> Result<Schema, BreezeError>;
}

/// A backend emitting source or configuration for one target.
///
/// The backend name doubles as its output subdirectory.
pub trait CodeTemplate: Plugin {
    fn generate_code(&self, schema: &Schema, context: &GenerationContext) -> Result<GeneratedFiles, BreezeError>;

    /// Called once after every schema went through [`generate_code`](Self::generate_code).
    /// Returned buffers are written like per-schema output.
    fn finalize_run(&self, _context: &GenerationContext) -> Result<GeneratedFiles, BreezeError> {
        Ok(GeneratedFiles::new())
    }
}
