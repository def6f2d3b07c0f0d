//! Filename templates.
//!
//! Supports the Liquid output-tag subset used for collection filenames:
//! `{{ name }}`, dotted lookups (`{{ author.id }}`) and a chain of filters
//! (`{{ published_at | date: '%Y-%m-%d' }}`). Unknown variables render empty.
//!
//! Filters: `date`, `downcase`, `upcase`, `strip`, `slugify` /
//! `parameterize`, `append`, `prepend`, `default`, `replace`.

use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::inflect::parameterize;
use crate::timestamp;

static OUTPUT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(.*?)\s*\}\}").expect("output tag pattern is a valid regex"));

/// A parsed filename template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
}

impl FilenameTemplate {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Root variable names referenced by the template, in order of appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for captures in OUTPUT_TAG.captures_iter(&self.source) {
            let expression = split_unquoted(&captures[1], '|');
            let Some(path) = expression.first() else {
                continue;
            };
            let root = path.trim().split('.').next().unwrap_or_default().to_string();
            if !root.is_empty() && !names.contains(&root) {
                names.push(root);
            }
        }
        names
    }

    /// Renders against a flat variable map.
    pub fn render(&self, variables: &Map<String, Value>) -> String {
        OUTPUT_TAG
            .replace_all(&self.source, |captures: &regex::Captures<'_>| {
                evaluate(&captures[1], variables)
            })
            .into_owned()
    }
}

fn evaluate(expression: &str, variables: &Map<String, Value>) -> String {
    let mut segments = split_unquoted(expression, '|').into_iter();
    let Some(path) = segments.next() else {
        return String::new();
    };
    let path = path.trim();
    let mut current = match unquote(path) {
        Some(literal) => literal.to_string(),
        None => lookup(path, variables).map(to_text).unwrap_or_default(),
    };
    for filter in segments {
        current = apply_filter(filter.trim(), current);
    }
    current
}

fn lookup<'v>(path: &str, variables: &'v Map<String, Value>) -> Option<&'v Value> {
    let mut parts = path.split('.');
    let mut value = variables.get(parts.next()?)?;
    for part in parts {
        value = match value {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn apply_filter(filter: &str, input: String) -> String {
    let (name, args) = match filter.split_once(':') {
        Some((name, args)) => (
            name.trim(),
            split_unquoted(args, ',')
                .into_iter()
                .map(|arg| unquote(arg.trim()).unwrap_or(arg.trim()).to_string())
                .collect::<Vec<_>>(),
        ),
        None => (filter.trim(), Vec::new()),
    };
    let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");

    match name {
        "date" => format_date(&input, arg(0)),
        "downcase" => input.to_lowercase(),
        "upcase" => input.to_uppercase(),
        "strip" => input.trim().to_string(),
        "slugify" | "parameterize" => parameterize(&input),
        "append" => input + arg(0),
        "prepend" => format!("{}{input}", arg(0)),
        "default" if input.is_empty() => arg(0).to_string(),
        "default" => input,
        "replace" => input.replace(arg(0), arg(1)),
        unknown => {
            warn!(filter = unknown, "Unknown template filter; value left unchanged");
            input
        }
    }
}

/// Formats a timestamp in its own offset; unparseable input or an invalid
/// format passes the value through.
fn format_date(input: &str, format: &str) -> String {
    let Some(datetime) = timestamp::parse_with_offset(input) else {
        return input.to_string();
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        warn!(format, "Invalid date format in template");
        return input.to_string();
    }
    datetime.format_with_items(items.into_iter()).to_string()
}

fn unquote(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    ['\'', '"'].iter().find_map(|quote| {
        raw.strip_prefix(*quote)
            .and_then(|rest| rest.strip_suffix(*quote))
    })
}

/// Splits on `separator` outside single or double quotes.
fn split_unquoted(raw: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, c) if c == separator => {
                parts.push(&raw[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}
