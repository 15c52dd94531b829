//! Crate-level test doubles, end-to-end and BDD tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use watts_schemes::SchemaRegistry;

use crate::check::check_output;
use crate::document::Document;
use crate::error::{ExecutionFailure, PluginError};
use crate::input::{InputOverrides, specify};
use crate::process::{ExecutionResult, PluginExecutor};


/// A conforming answer to the `parameter` action.
pub(crate) const PARAMETER_OK: &[u8] =
    br#"{"result":"ok","version":"1.0.0","conf_params":[],"request_params":[]}"#;

/// Replays canned results in order and records every document it receives.
///
/// Once the script is exhausted every call answers [`PARAMETER_OK`].
#[derive(Debug, Default)]
pub(crate) struct ScriptedExecutor {
    replies: RefCell<VecDeque<Result<ExecutionResult, PluginError>>>,
    seen: RefCell<Vec<Document>>,
}

impl ScriptedExecutor {
    pub(crate) fn new(
        replies: impl IntoIterator<Item = Result<ExecutionResult, PluginError>>,
    ) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().collect()),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn seen(&self) -> Vec<Document> {
        self.seen.borrow().clone()
    }
}

impl PluginExecutor for ScriptedExecutor {
    fn execute(&self, _plugin: &Path, document: &Document) -> Result<ExecutionResult, PluginError> {
        self.seen.borrow_mut().push(document.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| reply(PARAMETER_OK))
    }
}

/// A clean exit that printed `output`.
pub(crate) fn reply(output: &[u8]) -> Result<ExecutionResult, PluginError> {
    Ok(ExecutionResult::new(
        output.to_vec(),
        None,
        Duration::from_millis(5),
    ))
}

/// A plugin that printed `output` and exited with `status`.
pub(crate) fn crash(output: &[u8], status: i32) -> Result<ExecutionResult, PluginError> {
    Ok(ExecutionResult::new(
        output.to_vec(),
        Some(ExecutionFailure::NonZeroExit { status }),
        Duration::from_millis(5),
    ))
}

fn run_default_scenario(output: &[u8]) -> crate::check::OutputCheck {
    let registry = SchemaRegistry::builtin();
    let input = specify(&registry, Document::default_input(), &InputOverrides::default())
        .expect("default input is valid");
    let executor = ScriptedExecutor::new([reply(output)]);
    let execution = executor
        .execute(Path::new("plugin"), input.document())
        .expect("execute");
    let version = input.watts_version().expect("default input names a version");
    check_output(&registry, version, input.action(), execution.output())
}

#[test]
fn default_input_against_conforming_plugin_passes() {
    let check = run_default_scenario(PARAMETER_OK);
    assert!(check.passed());
    assert_eq!(check.path(), None);
}

#[test]
fn default_input_against_bad_result_names_result_field() {
    let check = run_default_scenario(br#"{"result":"bad"}"#);
    assert!(!check.passed());
    assert_eq!(check.path().as_deref(), Some("$.result"));
}

#[test]
fn executor_receives_specified_document() {
    let registry = SchemaRegistry::builtin();
    let overrides = InputOverrides {
        action: Some("revoke".to_owned()),
        ..InputOverrides::default()
    };
    let input = specify(&registry, Document::default_input(), &overrides).expect("specify");
    let executor = ScriptedExecutor::default();
    executor
        .execute(Path::new("plugin"), input.document())
        .expect("execute");
    let seen = executor.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].get("action"), Some(&json!("revoke")));
    assert!(seen[0].get("watts_userid").is_some());
}
