use std::collections::BTreeMap;

use breeze_schema::{
    parse_type, type_extent, Field, Message, MessageBody, Method, Options, Param, Schema, Service,
    TypeError, Type, ALIAS,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::{
    context::GenerationContext,
    error::BreezeError,
    traits::{Plugin, SchemaParser},
    utils::{first_upper, quote, syntax_error},
};

pub const BREEZE:        &str = "breeze";
pub const BREEZE_SUFFIX: &str = ".breeze";

const OPTION:  &str = "option";
const PACKAGE: &str = "package";
const MESSAGE: &str = "message";
const SERVICE: &str = "service";
const ENUM:    &str = "enum";

lazy_static! {
    static ref PACKAGE_NAME: Regex = Regex::new(r"^[\w.]+$").unwrap();
    static ref IDENTIFIER:   Regex = Regex::new(r"^[A-Za-z_]\w*$").unwrap();
    static ref FIELD_LINE:   Regex = Regex::new(r"^([\w<>., ]+) +(\w+) *= *(\d+)$").unwrap();
    static ref ENUM_LINE:    Regex = Regex::new(r"^(\w+) *= *(-?\d+)$").unwrap();
}

/// The built-in parser for `.breeze` files.
#[derive(Debug, Default)]
pub struct BreezeParser;

impl Plugin for BreezeParser {
    fn name(&self) -> &str {
        BREEZE
    }
}

impl SchemaParser for BreezeParser {
    fn file_suffix(&self) -> &str {
        BREEZE_SUFFIX
    }

    fn parse_schema(&self, content: &[u8], context: &GenerationContext) -> Result<Schema, BreezeError> {
        let text = std::str::from_utf8(content)
            .map_err(|e| syntax_error(&format!("schema is not valid UTF-8: {}", e), 0))?;
        parse_schema(text, context.uniform_package())
    }
}

/// Walks the logical lines of one file. A logical line is a physical line
/// cut at its first `;` and at `//`, then trimmed.
struct LineCursor<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    line:  usize,
}

impl<'a> LineCursor<'a> {
    fn new(text: &'a str) -> Self {
        LineCursor { lines: text.lines().enumerate(), line: 0 }
    }

    fn next_clean_line(&mut self) -> Option<&'a str> {
        let (number, raw) = self.lines.next()?;
        self.line = number + 1;
        Some(clean_line(raw))
    }
}

fn clean_line(raw: &str) -> &str {
    let line = match raw.find(';') {
        Some(end) => &raw[..end],
        None => raw,
    };
    let line = match line.find("//") {
        Some(comment) => &line[..comment],
        None => line,
    };
    line.trim()
}

/// Parse the text of one schema file.
///
/// `uniform_package`, when set, replaces the effective package of the schema
/// and strips package prefixes from every message reference.
pub fn parse_schema(text: &str, uniform_package: Option<&str>) -> Result<Schema, BreezeError> {
    let mut cursor = LineCursor::new(text);
    let mut schema = Schema::default();
    let strip_package = uniform_package.is_some();

    while let Some(line) = cursor.next_clean_line() {
        if line.is_empty() {
            continue;
        }
        let line_no = cursor.line;

        match leading_keyword(line) {
            OPTION => {
                let (key, value) = parse_option(&line[OPTION.len()..], line, line_no)?;
                schema.options.insert(key, value);
            }
            PACKAGE => {
                let package = line[PACKAGE.len()..].trim();
                if !PACKAGE_NAME.is_match(package) {
                    return Err(syntax_error(
                        &format!("package name illegal: {}", quote(package)),
                        line_no,
                    ));
                }
                schema.raw_package = package.to_string();
                schema.package = package.to_string();
            }
            MESSAGE => {
                let message = parse_message(&mut cursor, line, strip_package)?;
                insert_message(&mut schema, message)?;
            }
            ENUM => {
                let message = parse_enum(&mut cursor, line)?;
                insert_message(&mut schema, message)?;
            }
            SERVICE => {
                let service = parse_service(&mut cursor, line, strip_package)?;
                if schema.services.contains_key(&service.name) {
                    return Err(BreezeError::Structural(format!(
                        "The service {} is defined twice",
                        quote(&service.name)
                    )));
                }
                schema.services.insert(service.name.clone(), service);
            }
            other => debug!("line {}: ignoring statement starting with {}", line_no, quote(other)),
        }
    }

    if let Some(package) = uniform_package {
        schema.package = package.to_string();
    }
    Ok(schema)
}

fn leading_keyword(line: &str) -> &str {
    let end = line
        .find(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .unwrap_or(line.len());
    &line[..end]
}

fn insert_message(schema: &mut Schema, message: Message) -> Result<(), BreezeError> {
    if schema.messages.contains_key(&message.name) {
        return Err(BreezeError::Structural(format!(
            "The type {} is defined twice",
            quote(&message.name)
        )));
    }
    schema.messages.insert(message.name.clone(), message);
    Ok(())
}

/// Parses `key = value`; `text` is everything after the `option` keyword.
fn parse_option(text: &str, line: &str, line_no: usize) -> Result<(String, String), BreezeError> {
    let parts: Vec<&str> = text.split('=').collect();
    if parts.len() != 2 || parts[0].trim().is_empty() {
        return Err(syntax_error(&format!("wrong option line: {}", quote(line)), line_no));
    }
    Ok((parts[0].trim().to_string(), parts[1].trim().to_string()))
}

struct SegmentHeader {
    name:    String,
    options: Options,
}

/// Parses `Name(k=v, ...) {` following `keyword`.
fn parse_header(line: &str, keyword: &str, line_no: usize) -> Result<SegmentHeader, BreezeError> {
    let rest = &line[keyword.len()..];
    let mut options = Options::new();

    let name = match rest.find(|c: char| c == '(' || c == '{') {
        Some(open) if rest[open..].starts_with('(') => {
            let close = rest[open..]
                .find(')')
                .map(|c| open + c)
                .ok_or_else(|| syntax_error(&format!("wrong format: {}", quote(line)), line_no))?;
            for item in rest[open + 1..close].split(',') {
                if item.trim().is_empty() {
                    continue;
                }
                let (key, value) = parse_option(item, line, line_no)?;
                options.insert(key, value);
            }
            &rest[..open]
        }
        Some(brace) => &rest[..brace],
        None => rest,
    };

    let name = name.trim();
    if !IDENTIFIER.is_match(name) {
        return Err(syntax_error(&format!("segment name illegal: {}", quote(line)), line_no));
    }
    Ok(SegmentHeader { name: first_upper(name), options })
}

/// Parses a segment header and hands every body line to `parse_line` until
/// the closing `}`.
fn parse_segment<'a, F>(
    cursor:    &mut LineCursor<'a>,
    first:     &str,
    keyword:   &str,
    mut parse_line: F,
) -> Result<SegmentHeader, BreezeError>
where
    F: FnMut(&'a str, usize) -> Result<(), BreezeError>,
{
    let header = parse_header(first, keyword, cursor.line)?;
    debug!("line {}: parsing {} {}", cursor.line, keyword, header.name);

    loop {
        let line = cursor.next_clean_line().ok_or_else(|| {
            BreezeError::Structural(format!("unexpected segment end. name: {}", quote(&header.name)))
        })?;
        match line {
            "" | "{" => continue,
            "}" => return Ok(header),
            _ => parse_line(line, cursor.line)?,
        }
    }
}

fn grammar_error(line: usize) -> impl Fn(TypeError) -> BreezeError {
    move |source| BreezeError::Grammar { line, source }
}

fn alias_of(options: &Options) -> Option<String> {
    options.get(ALIAS).filter(|a| !a.is_empty()).cloned()
}

fn parse_message(cursor: &mut LineCursor, first: &str, strip_package: bool) -> Result<Message, BreezeError> {
    let mut fields: BTreeMap<u32, Field> = BTreeMap::new();

    let header = parse_segment(cursor, first, MESSAGE, |line, line_no| {
        let caps = FIELD_LINE
            .captures(line)
            .ok_or_else(|| syntax_error(&format!("wrong field format: {}", quote(line)), line_no))?;
        let type_ = parse_type(&caps[1], strip_package).map_err(grammar_error(line_no))?;
        let name = caps[2].to_string();
        let index: u32 = caps[3]
            .parse()
            .map_err(|_| syntax_error(&format!("wrong field index: {}", quote(line)), line_no))?;

        if index == 0 {
            return Err(BreezeError::Structural(format!(
                "The index of field {} must be positive",
                quote(&name)
            )));
        }
        if let Some(existing) = fields.get(&index) {
            return Err(BreezeError::Structural(format!(
                "The index {} of field {} is already used by field {}",
                index,
                quote(&name),
                quote(&existing.name)
            )));
        }
        fields.insert(index, Field { index, name, type_ });
        Ok(())
    })?;

    if fields.is_empty() {
        return Err(BreezeError::Structural(format!(
            "message field is empty. message: {}",
            quote(&header.name)
        )));
    }
    Ok(Message {
        alias:   alias_of(&header.options),
        name:    header.name,
        options: header.options,
        body:    MessageBody::Fields(fields),
    })
}

fn parse_enum(cursor: &mut LineCursor, first: &str) -> Result<Message, BreezeError> {
    let mut values: BTreeMap<i32, String> = BTreeMap::new();

    let header = parse_segment(cursor, first, ENUM, |line, line_no| {
        let caps = ENUM_LINE
            .captures(line)
            .ok_or_else(|| syntax_error(&format!("wrong enum format: {}", quote(line)), line_no))?;
        let ordinal: i32 = caps[2]
            .parse()
            .map_err(|_| syntax_error(&format!("wrong enum index: {}", quote(line)), line_no))?;
        if let Some(existing) = values.get(&ordinal) {
            return Err(BreezeError::Structural(format!(
                "The enum index {} of {} is already used by {}",
                ordinal,
                quote(&caps[1]),
                quote(existing)
            )));
        }
        values.insert(ordinal, caps[1].to_string());
        Ok(())
    })?;

    if values.is_empty() {
        return Err(BreezeError::Structural(format!(
            "enum value is empty. enum: {}",
            quote(&header.name)
        )));
    }
    Ok(Message {
        alias:   alias_of(&header.options),
        name:    header.name,
        options: header.options,
        body:    MessageBody::Enum(values),
    })
}

fn parse_service(cursor: &mut LineCursor, first: &str, strip_package: bool) -> Result<Service, BreezeError> {
    let mut methods: BTreeMap<String, Method> = BTreeMap::new();

    let header = parse_segment(cursor, first, SERVICE, |line, line_no| {
        let method = parse_method(line, line_no, strip_package)?;
        if methods.contains_key(&method.name) {
            return Err(BreezeError::Structural(format!(
                "The method {} is defined twice",
                quote(&method.name)
            )));
        }
        methods.insert(method.name.clone(), method);
        Ok(())
    })?;

    Ok(Service { name: header.name, options: header.options, methods })
}

/// Parses `name(type a, type b) returnType`.
pub fn parse_method(line: &str, line_no: usize, strip_package: bool) -> Result<Method, BreezeError> {
    let wrong_format = || syntax_error(&format!("wrong method format: {}", quote(line)), line_no);

    let open = line.find('(').ok_or_else(wrong_format)?;
    let close = line[open..].find(')').map(|c| open + c).ok_or_else(wrong_format)?;

    let name = line[..open].trim();
    if !IDENTIFIER.is_match(name) {
        return Err(syntax_error(&format!("method name illegal: {}", quote(line)), line_no));
    }

    let params = parse_params(&line[open + 1..close], line, line_no, strip_package)?;

    let ret = line[close + 1..].trim();
    let return_type = if ret.is_empty() {
        None
    } else {
        Some(parse_type(ret, strip_package).map_err(grammar_error(line_no))?)
    };

    Ok(Method { name: name.to_string(), params, return_type })
}

/// Splits a parameter list on top-level commas. Commas nested inside
/// `map<...>` or `array<...>` belong to the parameter's type.
fn parse_params(
    text:          &str,
    line:          &str,
    line_no:       usize,
    strip_package: bool,
) -> Result<BTreeMap<usize, Param>, BreezeError> {
    let mut params = BTreeMap::new();
    let mut rest = text.trim();
    if rest.is_empty() {
        return Ok(params);
    }

    loop {
        let end = type_extent(rest).map_err(grammar_error(line_no))?;
        let type_: Type = parse_type(&rest[..end], strip_package).map_err(grammar_error(line_no))?;
        rest = &rest[end..];

        let (name, next) = match rest.find(',') {
            Some(comma) => (&rest[..comma], Some(&rest[comma + 1..])),
            None => (rest, None),
        };
        let name = name.trim();
        if !IDENTIFIER.is_match(name) {
            return Err(syntax_error(
                &format!("wrong param {} in method: {}", quote(name), quote(line)),
                line_no,
            ));
        }

        let index = params.len();
        params.insert(index, Param { index, name: name.to_string(), type_ });

        match next {
            Some(next) => rest = next,
            None => break,
        }
    }
    Ok(params)
}
