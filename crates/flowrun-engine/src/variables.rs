//! `${node.path}` template resolution against accumulated run data.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::Value;

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{\s*([^}]*?)\s*\}").expect("valid placeholder regex"))
}

/// Replace every `${path}` in `template` with the value found in `data`.
///
/// The first path segment is a node id; the rest walk object keys or array
/// indices. Missing paths and `null` become the empty string; objects and
/// arrays are rendered as pretty-printed JSON.
pub fn resolve(template: &str, data: &HashMap<String, Value>) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| {
            lookup(&caps[1], data).map(render).unwrap_or_default()
        })
        .into_owned()
}

/// Resolve templates in every string nested inside `value`.
pub fn resolve_value(value: &Value, data: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve(s, data)),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, data)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, data)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Follow a dotted path into the run data.
pub fn lookup<'a>(path: &str, data: &'a HashMap<String, Value>) -> Option<&'a Value> {
    let mut segments = path.split('.').map(str::trim);
    let root = data.get(segments.next()?)?;

    segments.try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => serde_json::to_string_pretty(nested).unwrap_or_default(),
    }
}
