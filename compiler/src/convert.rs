//! Best-effort conversion of `.proto` files into breeze schemas.
//!
//! This is a sequence of textual rewrites, not a proto parser. Anything
//! without a breeze counterpart (imports, `oneof`, `extend`, repeated
//! fields, nested messages, field modifiers) is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::{error::BreezeError, parser::BREEZE_SUFFIX};

lazy_static! {
    static ref REWRITES: Vec<(Regex, &'static str)> = [
        (r"extend[^{}]+\{[^{}]+\}", ""),
        (r"oneof[^{}]+\{[^{}]+\}", ""),
        (r"\t", "    "),
        (r"//.*\n*", "\n"),
        (r" *rpc +", "    "),
        (r"\) *returns *\(([^()]+)\) *;", " request)${1};"),
        (r"import .*\n", ""),
        (r"required +", ""),
        (r"optional +", ""),
        (r"syntax[^\n]+\n?", ""),
        (r"repeated[^\n]+\n?", ""),
        (r"singular[^\n]+\n?", ""),
        (r"extensions[^;]+;\n?", ""),
        (r"\[[^\[\n]+;", ";"),
        (r"\n {2,}", "\n    "),
        (r"^\n+", ""),
        (r"\n+", "\n"),
        (r"(\d) +;", "${1};"),
        (r"double +", "float64 "),
        (r"float +", "float32 "),
        (r"uint32 +", "int64 "),
        (r"uint64 +", "int64 "),
        (r"sint32 +", "int32 "),
        (r"sint64 +", "int64 "),
        (r"sfixed32 +", "int32 "),
        (r"sfixed64 +", "int64 "),
        (r"fixed32 +", "int64 "),
        (r"fixed64 +", "int64 "),
        (r"(\n?) *message", "${1}message"),
        (r" *\}(\n?)", "}${1}"),
        (r" *\n", "\n"),
        (r"\n *\n", "\n"),
    ]
    .iter()
    .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), *replacement))
    .collect();
}

/// Rewrites the text of one `.proto` file into breeze syntax.
pub fn proto_to_breeze(text: &str) -> String {
    let mut text = text.to_string();
    for (pattern, replacement) in REWRITES.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }

    // Keep top-level segments only; nested segments are dropped whole.
    let mut open = 0;
    let mut close = 0;
    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let mut line = line.to_string();
        if open == 0 && line.starts_with("option") {
            if line.contains("go_package") && !line.contains("go_package_prefix") {
                line = line.replacen("go_package", "go_package_prefix", 1);
            } else if !line.contains("java_package") {
                continue;
            }
        }
        if line.ends_with('{') {
            open += 1;
        } else if line.ends_with('}') {
            close += 1;
        }
        if open != close && open > 1 {
            continue;
        }
        lines.push(line);
        if open == close {
            open = 0;
            close = 0;
        }
    }
    lines.join("\n")
}

/// Converts every `*.proto` file directly inside `src` into
/// `dest/<stem>.breeze`. Returns the written paths.
pub fn convert_dir(src: &Path, dest: &Path) -> Result<Vec<PathBuf>, BreezeError> {
    fs::create_dir_all(dest).map_err(|e| BreezeError::io(dest, e))?;

    let mut protos: Vec<PathBuf> = fs::read_dir(src)
        .map_err(|e| BreezeError::io(src, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().map(|ext| ext == "proto").unwrap_or(false))
        .collect();
    protos.sort();

    let mut written = Vec::with_capacity(protos.len());
    for proto in protos {
        let text = fs::read_to_string(&proto).map_err(|e| BreezeError::io(&proto, e))?;
        let stem = proto
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = dest.join(format!("{}{}", stem, BREEZE_SUFFIX));
        fs::write(&target, proto_to_breeze(&text)).map_err(|e| BreezeError::io(&target, e))?;
        info!("converted {} -> {}", proto.display(), target.display());
        written.push(target);
    }
    Ok(written)
}
