//! Report rendering.
//!
//! A [`Report`] is an ordered list of `key -> JSON value` fragments built up
//! while a command runs. Human rendering prints one right-aligned key per
//! line with the value's pretty JSON indented underneath; machine rendering
//! prints the whole report as one JSON object.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

/// Indentation step of pretty-printed JSON.
const INDENT: &[u8] = b"    ";

/// Width of the right-aligned key column in human reports.
const KEY_WIDTH: usize = 15;

/// How a report is written to standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReportMode {
    Human,
    Machine,
}

impl ReportMode {
    pub(crate) const fn from_machine_flag(machine: bool) -> Self {
        if machine { Self::Machine } else { Self::Human }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Report {
    entries: Vec<(String, Value)>,
}

impl Report {
    /// Records `value` under `key`, replacing an earlier value in place.
    pub(crate) fn record(&mut self, key: &str, value: impl Into<Value>) {
        let fragment = value.into();
        if let Some((_, slot)) = self.entries.iter_mut().find(|(existing, _)| existing == key) {
            *slot = fragment;
            return;
        }
        self.entries.push((key.to_owned(), fragment));
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(existing, value)| (existing == key).then_some(value))
    }

    pub(crate) fn render(&self, mode: ReportMode) -> Result<String, serde_json::Error> {
        match mode {
            ReportMode::Machine => {
                let object: Map<String, Value> = self.entries.iter().cloned().collect();
                let mut text = pretty_json(&object)?;
                text.push('\n');
                Ok(text)
            }
            ReportMode::Human => {
                let continuation = format!("\n{}", " ".repeat(KEY_WIDTH + 2));
                let mut text = String::new();
                for (key, value) in &self.entries {
                    let json = pretty_json(value)?.replace('\n', &continuation);
                    text.push_str(&format!("{key:>KEY_WIDTH$}: {json}\n"));
                }
                Ok(text)
            }
        }
    }
}

/// Serialises `value` as JSON indented by four spaces per level.
pub(crate) fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
