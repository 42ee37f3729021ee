use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use breeze_schema::{Message, Options, Schema, Type};
use tracing::{info, warn};

use crate::{
    error::BreezeError,
    traits::{CodeTemplate, SchemaParser},
    utils::quote,
    verifier::verify_schema,
};

/// State shared by every step of one generation run.
///
/// Schemas are ingested one file at a time; backends only run once every
/// file is in, because message references are resolved by qualified name
/// through [`GenerationContext::message`].
pub struct GenerationContext {
    parser:          Arc<dyn SchemaParser>,
    templates:       Vec<Arc<dyn CodeTemplate>>,
    uniform_package: Option<String>,
    schemas:         BTreeMap<String, Schema>,
    messages:        HashMap<String, Message>,
    options:         Options,
}

/// A field whose message type is not known to the context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedReference {
    pub schema:  String,
    pub message: String,
    pub field:   String,
    pub type_:   String,
}

/// Non-fatal findings of [`GenerationContext::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collision {
    /// A schema with the same file name was replaced.
    Schema(String),
    /// A message with the same qualified name was replaced.
    Message(String),
}

impl GenerationContext {
    pub fn new(
        parser:          Arc<dyn SchemaParser>,
        templates:       Vec<Arc<dyn CodeTemplate>>,
        options:         Options,
        uniform_package: Option<String>,
    ) -> Self {
        GenerationContext {
            parser,
            templates,
            uniform_package: uniform_package.filter(|p| !p.is_empty()),
            schemas: BTreeMap::new(),
            messages: HashMap::new(),
            options,
        }
    }

    pub fn parser(&self) -> &Arc<dyn SchemaParser> {
        &self.parser
    }

    pub fn templates(&self) -> &[Arc<dyn CodeTemplate>] {
        &self.templates
    }

    /// Package every schema of this run collapses onto, if any.
    pub fn uniform_package(&self) -> Option<&str> {
        self.uniform_package.as_deref()
    }

    /// Run-level options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Ingested schemas keyed by file name.
    pub fn schemas(&self) -> &BTreeMap<String, Schema> {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Looks a message up by qualified name, e.g. `pkg.a.Foo`.
    pub fn message(&self, qualified_name: &str) -> Option<&Message> {
        self.messages.get(qualified_name)
    }

    /// Every known qualified message name, sorted.
    pub fn qualified_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.messages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves a message reference made from inside `schema`. Names
    /// containing a `.` are taken as qualified; bare names are looked up
    /// in the referencing schema's package.
    pub fn resolve(&self, type_: &Type, schema: &Schema) -> Option<&Message> {
        let name = type_.message_name()?;
        self.resolve_name(name, schema)
    }

    pub fn resolve_name(&self, name: &str, schema: &Schema) -> Option<&Message> {
        if name.contains('.') {
            self.message(name)
        } else {
            self.message(&schema.qualified_name(name))
        }
    }

    /// Parses `content` with the run's parser and ingests the result under
    /// `name`.
    pub fn parse_and_ingest(&mut self, name: &str, content: &[u8]) -> Result<Vec<Collision>, BreezeError> {
        let mut schema = self.parser.parse_schema(content, self)?;
        schema.name = name.to_string();
        self.ingest(schema)
    }

    /// Validates `schema`, applies option inheritance and registers it and
    /// its messages.
    ///
    /// Options flow top-down and only fill gaps: run options into the
    /// schema, then schema options into each message. A file name or
    /// qualified message name seen before is replaced; the replacement is
    /// reported, not rejected.
    pub fn ingest(&mut self, mut schema: Schema) -> Result<Vec<Collision>, BreezeError> {
        verify_schema(&schema)?;

        merge_options(&mut schema.options, &self.options);
        for message in schema.messages.values_mut() {
            merge_options(&mut message.options, &schema.options);
        }

        let mut collisions = Vec::new();
        for (name, message) in &schema.messages {
            let qualified = schema.qualified_name(name);
            if self.messages.insert(qualified.clone(), message.clone()).is_some() {
                warn!("message {} is defined more than once; {} wins", quote(&qualified), schema.name);
                collisions.push(Collision::Message(qualified));
            }
        }

        info!(
            "ingested schema {} (package {}, {} messages, {} services)",
            schema.name,
            quote(&schema.package),
            schema.messages.len(),
            schema.services.len()
        );
        let file_name = schema.name.clone();
        if self.schemas.insert(file_name.clone(), schema).is_some() {
            warn!("schema {} was ingested twice; the last one wins", quote(&file_name));
            collisions.push(Collision::Schema(file_name));
        }
        Ok(collisions)
    }

    /// Field types referring to messages that no ingested schema defines.
    /// Only meaningful once every file of the run is ingested.
    pub fn unresolved_references(&self) -> Vec<UnresolvedReference> {
        let mut unresolved = Vec::new();
        for schema in self.schemas.values() {
            for message in schema.messages.values() {
                for field in message.fields() {
                    let mut missing = false;
                    field.type_.visit_messages(&mut |name| {
                        if self.resolve_name(name, schema).is_none() {
                            missing = true;
                        }
                    });
                    if missing {
                        unresolved.push(UnresolvedReference {
                            schema:  schema.name.clone(),
                            message: message.name.clone(),
                            field:   field.name.clone(),
                            type_:   field.type_.to_string(),
                        });
                    }
                }
            }
        }
        unresolved
    }
}

/// Copies every entry of `from` whose key is missing (or empty) in `to`.
pub fn merge_options(to: &mut Options, from: &Options) {
    for (key, value) in from {
        match to.get(key) {
            Some(existing) if !existing.is_empty() => {}
            _ => {
                to.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::BreezeParser;

    fn context(options: Options) -> GenerationContext {
        GenerationContext::new(Arc::new(BreezeParser), Vec::new(), options, None)
    }

    #[test]
    fn test_option_inheritance() {
        let text = "option x = 1;\npackage p;\nmessage A(x = 2) {\n string a = 1;\n}\nmessage B {\n string b = 1;\n}\n";
        let mut ctx = context(Options::new());
        ctx.parse_and_ingest("a.breeze", text.as_bytes()).unwrap();

        let schema = ctx.schema("a.breeze").unwrap();
        assert_eq!(schema.messages["A"].options["x"], "2");
        assert_eq!(schema.messages["B"].options["x"], "1");
        assert_eq!(ctx.message("p.A").unwrap().options["x"], "2");
        assert_eq!(ctx.message("p.B").unwrap().options["x"], "1");
    }

    #[test]
    fn test_run_options_fill_gaps_only() {
        let mut run = Options::new();
        run.insert("x".into(), "run".into());
        run.insert("y".into(), "run".into());
        let mut ctx = context(run);
        ctx.parse_and_ingest("a.breeze", b"option x = file\nmessage A {\n string a = 1\n}\n").unwrap();

        let schema = ctx.schema("a.breeze").unwrap();
        assert_eq!(schema.options["x"], "file");
        assert_eq!(schema.options["y"], "run");
        assert_eq!(schema.messages["A"].options["y"], "run");
    }

    #[test]
    fn test_cross_file_resolution() {
        let mut ctx = context(Options::new());
        ctx.parse_and_ingest("b.breeze", b"package pkg.b\nmessage Bar {\n pkg.a.Foo foo = 1\n Baz baz = 2\n}\nmessage Baz {\n int32 n = 1\n}\n")
            .unwrap();
        assert_eq!(ctx.unresolved_references().len(), 1);

        ctx.parse_and_ingest("a.breeze", b"package pkg.a\nmessage Foo {\n string s = 1\n}\n").unwrap();
        assert!(ctx.unresolved_references().is_empty());

        let b = ctx.schema("b.breeze").unwrap();
        let foo_type = &b.messages["Bar"].fields().next().unwrap().type_;
        let foo = ctx.resolve(foo_type, b).unwrap();
        assert_eq!(foo, &ctx.schema("a.breeze").unwrap().messages["Foo"]);
        assert_eq!(ctx.message("pkg.a.Foo"), Some(foo));
        assert_eq!(ctx.qualified_names(), vec!["pkg.a.Foo", "pkg.b.Bar", "pkg.b.Baz"]);
    }

    #[test]
    fn test_empty_schema_is_not_registered() {
        let mut ctx = context(Options::new());
        let err = ctx.parse_and_ingest("empty.breeze", b"package p\noption a = b\n").unwrap_err();
        assert!(matches!(err, BreezeError::Structural(_)), "got {:?}", err);
        assert!(ctx.schemas().is_empty());
    }

    #[test]
    fn test_collisions_are_reported() {
        let mut ctx = context(Options::new());
        let text = b"package p\nmessage M {\n string s = 1\n}\n";
        assert!(ctx.parse_and_ingest("one.breeze", text).unwrap().is_empty());
        let collisions = ctx.parse_and_ingest("two.breeze", text).unwrap();
        assert_eq!(collisions, vec![Collision::Message("p.M".into())]);
        let collisions = ctx.parse_and_ingest("two.breeze", text).unwrap();
        assert_eq!(collisions, vec![Collision::Message("p.M".into()), Collision::Schema("two.breeze".into())]);
    }

    #[test]
    fn test_uniform_package_from_context() {
        let mut ctx = GenerationContext::new(Arc::new(BreezeParser), Vec::new(), Options::new(), Some("flat".into()));
        ctx.parse_and_ingest("a.breeze", b"package a.b\nmessage M {\n x.y.N n = 1\n}\nmessage N {\n bool b = 1\n}\n").unwrap();
        assert!(ctx.message("flat.M").is_some());
        assert!(ctx.unresolved_references().is_empty());
    }
}
