//! `{{ path }}` substitution for agent options.
//!
//! Only plain variable lookups are supported: `{{ url }}`, `{{ meta.source }}`,
//! `{{ items.0 }}`. Filters and tags are left untouched. A path that does not
//! resolve renders as an empty string.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::Value;

static TEMPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\s*\}\}").unwrap()
});

/// Interpolate every string inside `options` against `context`.
/// Object keys are never interpolated.
pub fn interpolate(options: &Value, context: &Value) -> Value {
    match options {
        Value::String(s) => Value::String(render(s, context)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| interpolate(item, context))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render(template: &str, context: &Value) -> String {
    TEMPLATE_RE.replace_all(template, |caps: &Captures| {
        match lookup(context, &caps[1]) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    })
    .into_owned()
}

fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
