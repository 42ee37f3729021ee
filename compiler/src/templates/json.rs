use breeze_schema::Schema;
use serde_json::json;

use crate::{
    context::GenerationContext,
    error::BreezeError,
    templates::with_package_dir,
    traits::{CodeTemplate, GeneratedFiles, Plugin},
};

pub const JSON: &str = "json";

/// Dumps every schema as pretty JSON, plus an `index.json` of the run.
#[derive(Debug, Default)]
pub struct JsonTemplate;

impl Plugin for JsonTemplate {
    fn name(&self) -> &str {
        JSON
    }
}

fn template_error(err: serde_json::Error) -> BreezeError {
    BreezeError::Template { template: JSON.to_string(), msg: err.to_string() }
}

impl CodeTemplate for JsonTemplate {
    fn generate_code(&self, schema: &Schema, _context: &GenerationContext) -> Result<GeneratedFiles, BreezeError> {
        let mut content = serde_json::to_vec_pretty(schema).map_err(template_error)?;
        content.push(b'\n');

        let mut files = GeneratedFiles::new();
        files.insert(with_package_dir(&format!("{}.json", schema.stem()), schema), content);
        Ok(files)
    }

    fn finalize_run(&self, context: &GenerationContext) -> Result<GeneratedFiles, BreezeError> {
        let index = json!({
            "schemas":  context.schemas().keys().collect::<Vec<_>>(),
            "messages": context.qualified_names(),
        });
        let mut content = serde_json::to_vec_pretty(&index).map_err(template_error)?;
        content.push(b'\n');

        let mut files = GeneratedFiles::new();
        files.insert("index.json".to_string(), content);
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use breeze_schema::Options;

    use super::*;
    use crate::parser::BreezeParser;

    #[test]
    fn test_json_output() {
        let mut options = Options::new();
        options.insert("with_package_dir".into(), "true".into());
        let mut ctx = GenerationContext::new(Arc::new(BreezeParser), Vec::new(), options, None);
        ctx.parse_and_ingest("user.breeze", b"package a.b\nmessage User {\n map<string,int64> scores = 1\n}\n")
            .unwrap();

        let schema = ctx.schema("user.breeze").unwrap();
        let files = JsonTemplate.generate_code(schema, &ctx).unwrap();
        let content = &files["a/b/user.json"];
        let value: serde_json::Value = serde_json::from_slice(content).unwrap();
        assert_eq!(value["package"], "a.b");
        assert_eq!(value["messages"]["User"]["body"]["Fields"]["1"]["type"], "map<string,int64>");

        let index = JsonTemplate.finalize_run(&ctx).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&index["index.json"]).unwrap();
        assert_eq!(value["schemas"][0], "user.breeze");
        assert_eq!(value["messages"][0], "a.b.User");
    }
}
