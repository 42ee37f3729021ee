use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    config::Config,
    context::{Collision, GenerationContext},
    error::BreezeError,
    parser::BreezeParser,
    registry::Registry,
    templates::{JsonTemplate, RustTemplate},
    traits::{CodeTemplate, GeneratedFiles, SchemaParser},
    utils::quote,
};

/// Where in the pipeline a best-effort failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading, parsing or ingesting a file found while walking a directory.
    Ingest,
    /// Cross-file checks after every file is ingested.
    Resolve,
    /// A backend's `generate_code`.
    Generate,
    /// A backend's `finalize_run`.
    Finalize,
    /// Creating directories or writing output.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Ingest   => "ingest",
            Stage::Resolve  => "resolve",
            Stage::Generate => "generate",
            Stage::Finalize => "finalize",
            Stage::Write    => "write",
        };
        f.write_str(name)
    }
}

/// A failure that skipped part of the run without aborting it.
#[derive(Debug)]
pub struct GenerationIssue {
    pub stage:    Stage,
    pub path:     Option<PathBuf>,
    pub template: Option<String>,
    pub error:    BreezeError,
}

impl fmt::Display for GenerationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stage)?;
        if let Some(template) = &self.template {
            write!(f, " [{}]", template)?;
        }
        if let Some(path) = &self.path {
            write!(f, " {}", path.display())?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Outcome of a run that was not aborted.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// File names of every ingested schema, sorted.
    pub schemas: Vec<String>,
    pub issues:  Vec<GenerationIssue>,
}

impl GenerationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, stage: Stage, path: Option<PathBuf>, template: Option<&str>, error: BreezeError) {
        let issue = GenerationIssue { stage, path, template: template.map(str::to_string), error };
        warn!("{}", issue);
        self.issues.push(issue);
    }
}

/// Drives parsers and backends over a set of schema files.
///
/// A run has two phases: every file is parsed and ingested into one
/// [`GenerationContext`], then every selected backend is run over every
/// schema. Backends never see a partially ingested context.
pub struct Generator {
    parsers:   Registry<dyn SchemaParser>,
    templates: Registry<dyn CodeTemplate>,
}

impl Default for Generator {
    /// A generator with the built-in `breeze` parser and the `json` and
    /// `rust` backends.
    fn default() -> Self {
        let mut generator = Generator::new();
        generator.register_parser(Arc::new(BreezeParser));
        generator.register_template(Arc::new(JsonTemplate));
        generator.register_template(Arc::new(RustTemplate));
        generator
    }
}

impl Generator {
    /// A generator without any plugins.
    pub fn new() -> Self {
        Generator {
            parsers:   Registry::new("parser"),
            templates: Registry::new("template"),
        }
    }

    pub fn register_parser(&mut self, parser: Arc<dyn SchemaParser>) {
        debug!("registering parser {}", parser.name());
        self.parsers.register(parser);
    }

    pub fn register_template(&mut self, template: Arc<dyn CodeTemplate>) {
        debug!("registering template {}", template.name());
        self.templates.register(template);
    }

    pub fn parsers(&self) -> &Registry<dyn SchemaParser> {
        &self.parsers
    }

    pub fn templates(&self) -> &Registry<dyn CodeTemplate> {
        &self.templates
    }

    /// Resolves the parser and backends named by `config` into a fresh context.
    pub fn init_context(&self, config: &Config) -> Result<GenerationContext, BreezeError> {
        let parser = self.parsers.get(&config.parser)?;
        let templates = self.templates.select(&config.templates)?;
        Ok(GenerationContext::new(
            parser,
            templates,
            config.options.clone(),
            config.uniform_package.clone(),
        ))
    }

    /// Generates code for the file or directory tree at `path`.
    ///
    /// A single file that fails to parse aborts the run. Inside a
    /// directory, such files are reported and skipped. Output goes to
    /// `config.write_path`, or next to the input when unset.
    pub fn generate_path(&self, path: &Path, config: &Config) -> Result<GenerationReport, BreezeError> {
        let metadata = fs::metadata(path).map_err(|e| BreezeError::io(path, e))?;
        let mut context = self.init_context(config)?;
        let mut report = GenerationReport::default();

        if metadata.is_dir() {
            self.ingest_dir(path, &mut context, &mut report)?;
        } else {
            self.ingest_file(path, &mut context, &mut report)?;
        }

        let write_path = match &config.write_path {
            Some(write_path) => write_path.clone(),
            None if metadata.is_dir() => path.to_path_buf(),
            None => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        self.finish(&context, &write_path, &mut report);
        Ok(report)
    }

    /// Generates code for one in-memory schema file called `name`.
    pub fn generate(&self, name: &str, content: &[u8], config: &Config) -> Result<GenerationReport, BreezeError> {
        let mut context = self.init_context(config)?;
        let mut report = GenerationReport::default();
        let collisions = context.parse_and_ingest(name, content)?;
        report_collisions(&collisions, Path::new(name), &mut report);

        let write_path = config.write_path.clone().unwrap_or_else(|| PathBuf::from("."));
        self.finish(&context, &write_path, &mut report);
        Ok(report)
    }

    /// Runs the whole pipeline without touching the filesystem.
    ///
    /// Output keys are `<backend>/<relative path>`. Unlike the file based
    /// entry points, any failure aborts.
    pub fn generate_in_memory(
        &self,
        files:  &BTreeMap<String, String>,
        config: &Config,
    ) -> Result<GeneratedFiles, BreezeError> {
        let mut context = self.init_context(config)?;
        for (name, content) in files {
            context.parse_and_ingest(name, content.as_bytes())?;
        }

        let mut output = GeneratedFiles::new();
        for template in context.templates() {
            let name = template.name();
            let mut produced = Vec::new();
            for schema in context.schemas().values() {
                produced.extend(template.generate_code(schema, &context)?);
            }
            produced.extend(template.finalize_run(&context)?);

            for (relative, content) in produced {
                if output.insert(format!("{}/{}", name, relative), content).is_some() {
                    return Err(duplicate_output(name, &relative));
                }
            }
        }
        Ok(output)
    }

    /// Ingests every file below `dir` carrying the parser's suffix, in file
    /// name order. Symlinked files are read; symlinked directories are not
    /// descended into.
    fn ingest_dir(
        &self,
        dir:     &Path,
        context: &mut GenerationContext,
        report:  &mut GenerationReport,
    ) -> Result<(), BreezeError> {
        let suffix = context.parser().file_suffix().to_string();

        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(walk_error(dir, e)),
                Err(e) => {
                    let path = e.path().unwrap_or(dir).to_path_buf();
                    report.push(Stage::Ingest, Some(path.clone()), None, walk_error(&path, e));
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() || !has_suffix(path, &suffix) {
                if entry.depth() > 0 {
                    debug!("skipping {}", path.display());
                }
                continue;
            }
            if let Err(error) = self.ingest_file(path, context, report) {
                report.push(Stage::Ingest, Some(path.to_path_buf()), None, error);
            }
        }
        Ok(())
    }

    fn ingest_file(
        &self,
        path:    &Path,
        context: &mut GenerationContext,
        report:  &mut GenerationReport,
    ) -> Result<(), BreezeError> {
        let content = fs::read(path).map_err(|e| BreezeError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("parsing {}", path.display());
        let collisions = context.parse_and_ingest(&name, &content)?;
        report_collisions(&collisions, path, report);
        Ok(())
    }

    /// Second phase: cross-file checks, then every backend over every schema.
    fn finish(&self, context: &GenerationContext, write_path: &Path, report: &mut GenerationReport) {
        for unresolved in context.unresolved_references() {
            let error = BreezeError::Resolution(format!(
                "type {} of field {} in message {} is not defined",
                quote(&unresolved.type_),
                quote(&unresolved.field),
                quote(&unresolved.message)
            ));
            report.push(Stage::Resolve, Some(PathBuf::from(&unresolved.schema)), None, error);
        }

        for template in context.templates() {
            self.run_template(template.as_ref(), context, write_path, report);
        }
        report.schemas = context.schemas().keys().cloned().collect();
    }

    fn run_template(
        &self,
        template:   &dyn CodeTemplate,
        context:    &GenerationContext,
        write_path: &Path,
        report:     &mut GenerationReport,
    ) {
        let name = template.name();
        let base = write_path.join(name);
        if let Err(e) = fs::create_dir_all(&base) {
            report.push(Stage::Write, Some(base.clone()), Some(name), BreezeError::io(&base, e));
            return;
        }

        let mut written = BTreeSet::new();
        for schema in context.schemas().values() {
            match template.generate_code(schema, context) {
                Ok(files) => write_files(&base, name, files, &mut written, report),
                Err(error) => report.push(Stage::Generate, Some(PathBuf::from(&schema.name)), Some(name), error),
            }
        }

        match template.finalize_run(context) {
            Ok(files) => write_files(&base, name, files, &mut written, report),
            Err(error) => report.push(Stage::Finalize, None, Some(name), error),
        }
    }
}

fn report_collisions(collisions: &[Collision], path: &Path, report: &mut GenerationReport) {
    for collision in collisions {
        let msg = match collision {
            Collision::Schema(name) => format!("schema {} replaced an earlier one", quote(name)),
            Collision::Message(name) => format!("message {} replaced an earlier one", quote(name)),
        };
        report.push(Stage::Ingest, Some(path.to_path_buf()), None, BreezeError::Structural(msg));
    }
}

fn walk_error(path: &Path, error: walkdir::Error) -> BreezeError {
    BreezeError::io(path, io::Error::from(error))
}

fn duplicate_output(template: &str, relative: &str) -> BreezeError {
    BreezeError::Template {
        template: template.to_string(),
        msg:      format!("output {} was produced twice", quote(relative)),
    }
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(suffix))
        .unwrap_or(false)
}

/// Maps a backend's relative output name below `base`. Absolute names and
/// names leaving `base` are refused.
fn output_path(base: &Path, relative: &str) -> Result<PathBuf, BreezeError> {
    let rel = Path::new(relative);
    let inside = !relative.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if !inside {
        return Err(BreezeError::io(
            rel,
            io::Error::new(io::ErrorKind::InvalidInput, "output name must stay inside the backend directory"),
        ));
    }
    Ok(base.join(rel))
}

/// Writes `files` below `base`. A name this backend already wrote during the
/// run is refused instead of overwritten.
fn write_files(
    base:     &Path,
    template: &str,
    files:    GeneratedFiles,
    written:  &mut BTreeSet<String>,
    report:   &mut GenerationReport,
) {
    for (relative, content) in files {
        if !written.insert(relative.clone()) {
            report.push(
                Stage::Write,
                Some(PathBuf::from(&relative)),
                Some(template),
                duplicate_output(template, &relative),
            );
            continue;
        }
        let result = output_path(base, &relative).and_then(|path| {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| BreezeError::io(parent, e))?;
            }
            fs::write(&path, &content).map_err(|e| BreezeError::io(&path, e))?;
            Ok(path)
        });
        match result {
            Ok(path) => info!("[{}] wrote {}", template, path.display()),
            Err(error) => report.push(Stage::Write, Some(PathBuf::from(&relative)), Some(template), error),
        }
    }
}
