//! Extraction of plugin settings from a WaTTS service configuration.
//!
//! WaTTS configures each service with lines of the form
//! `service.<id>.plugin.<key> = <value>`. Only lines of exactly that shape for
//! the requested identifier are consumed.

use regex::Regex;
use serde_json::{Map, Value};

/// Collects the plugin settings of service `identifier` from `text`.
///
/// Returns an empty map when no line matches; deciding whether that is an
/// error is up to the caller.
#[must_use]
pub fn extract_conf_params(text: &str, identifier: &str) -> Map<String, Value> {
    let Some(pattern) = line_pattern(identifier) else {
        return Map::new();
    };
    text.lines()
        .filter_map(|line| pattern.captures(line.trim_end_matches('\r')))
        .filter_map(|captures| {
            let key = captures.name("key")?.as_str();
            let value = captures.name("value")?.as_str();
            Some((key.to_owned(), Value::String(value.to_owned())))
        })
        .collect()
}

fn line_pattern(identifier: &str) -> Option<Regex> {
    let pattern = format!(
        r"^service\.{}\.plugin\.(?P<key>.+?) = (?P<value>.+)$",
        regex::escape(identifier)
    );
    Regex::new(&pattern).ok()
}
