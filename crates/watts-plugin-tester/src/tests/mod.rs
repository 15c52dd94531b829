//! Runtime tests for the tester CLI.
//!
//! Configuration is injected through a static loader and the plugins are
//! shell scripts written into a temporary directory.


use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;
use watts_config::Config;

use crate::config::ConfigLoader;
use crate::errors::AppError;
use crate::{IoStreams, run_with_loader};

pub(crate) const PARAMETER_OK: &str =
    r#"{"result":"ok","version":"1.0.0","conf_params":[],"request_params":[]}"#;

pub(crate) struct StaticConfigLoader {
    config: Config,
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Captured result of one CLI invocation.
pub(crate) struct Run {
    pub(crate) exit: ExitCode,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

impl Run {
    pub(crate) fn json(&self) -> Value {
        serde_json::from_str(&self.stdout).expect("stdout is JSON")
    }
}

pub(crate) fn run_cli(config: &Config, args: &[&str]) -> Run {
    let mut stdout: Vec<u8> = Vec::new();
    let mut stderr: Vec<u8> = Vec::new();
    let loader = StaticConfigLoader {
        config: config.clone(),
    };
    let argv = std::iter::once("watts-plugin-tester")
        .chain(args.iter().copied())
        .map(OsString::from);
    let exit = {
        let mut io = IoStreams::new(&mut stdout, &mut stderr);
        run_with_loader(argv, &mut io, &loader)
    };
    Run {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout utf8"),
        stderr: String::from_utf8(stderr).expect("stderr utf8"),
    }
}

#[cfg(unix)]
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write plugin");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod plugin");
    path
}

/// A plugin that prints `answer` verbatim.
#[cfg(unix)]
pub(crate) fn answering_plugin(dir: &Path, answer: &str) -> PathBuf {
    write_script(dir, "plugin.sh", &format!("printf '%s' '{answer}'"))
}

#[fixture]
fn workspace() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}

#[test]
fn default_prints_the_baseline_document() {
    let run = run_cli(&Config::default(), &["default"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    let document = run.json();
    assert_eq!(document["action"], json!("parameter"));
    assert_eq!(document["watts_version"], json!("1.0.0"));
    assert_eq!(document["cred_state"], json!("undefined"));
}

#[test]
fn specific_applies_the_overrides() {
    let run = run_cli(
        &Config::default(),
        &["specific", "--json", r#"{"cred_state": "TTS_1"}"#, "-a", "revoke"],
    );
    assert_eq!(run.exit, ExitCode::SUCCESS, "{}", run.stderr);
    let document = run.json();
    assert_eq!(document["action"], json!("revoke"));
    assert_eq!(document["cred_state"], json!("TTS_1"));
    assert!(document["watts_userid"].is_string());
}

#[test]
fn malformed_override_is_a_user_error() {
    let run = run_cli(&Config::default(), &["specific", "--json", "{not json"]);
    assert_eq!(run.exit, ExitCode::from(4));
    assert!(run.stderr.contains("invalid JSON in --json"), "{}", run.stderr);
    assert!(run.stdout.is_empty());
}

#[test]
fn unknown_action_is_a_user_error() {
    let run = run_cli(&Config::default(), &["specific", "-a", "delete"]);
    assert_eq!(run.exit, ExitCode::from(4));
}

#[test]
fn input_rejected_by_the_schema_breaks_the_contract() {
    let run = run_cli(
        &Config::default(),
        &["specific", "--json", r#"{"action":"request","params":{"Bad":1}}"#],
    );
    assert_eq!(run.exit, ExitCode::from(1));
    assert!(run.stderr.contains("unable to validate plugin input"), "{}", run.stderr);
    assert!(run.stderr.contains("params"), "{}", run.stderr);
}

#[test]
fn check_without_plugin_is_a_user_error() {
    let run = run_cli(&Config::default(), &["check"]);
    assert_eq!(run.exit, ExitCode::from(4));
    assert!(run.stderr.contains("--plugin-name"), "{}", run.stderr);
}

#[rstest]
fn check_with_missing_plugin_is_a_user_error(workspace: TempDir) {
    let absent = workspace.path().join("absent.sh");
    let run = run_cli(&Config::default(), &["check", "-p", path_arg(&absent)]);
    assert_eq!(run.exit, ExitCode::from(4));
    assert!(run.stderr.contains("not found"), "{}", run.stderr);
}

#[test]
fn help_is_written_to_stdout() {
    let run = run_cli(&Config::default(), &["--help"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    assert!(run.stdout.contains("Usage"), "{}", run.stdout);
}

#[test]
fn unknown_subcommand_is_a_user_error() {
    let run = run_cli(&Config::default(), &["inspect"]);
    assert_eq!(run.exit, ExitCode::from(4));
    assert!(!run.stderr.is_empty());
}

#[test]
fn test_without_expected_output_is_a_user_error() {
    let run = run_cli(&Config::default(), &["test", "-p", "plugin.sh"]);
    assert_eq!(run.exit, ExitCode::from(4));
    assert!(run.stderr.contains("--expected-output"), "{}", run.stderr);
}

#[cfg(unix)]
#[rstest]
fn conforming_plugin_passes_check(workspace: TempDir) {
    let plugin = answering_plugin(workspace.path(), PARAMETER_OK);
    let run = run_cli(&Config::default(), &["check", "-p", path_arg(&plugin)]);
    assert_eq!(run.exit, ExitCode::SUCCESS, "{}", run.stderr);
    assert!(run.stdout.contains("    description: \"validation passed\"\n"), "{}", run.stdout);
    assert!(run.stdout.contains("    plugin_time: "), "{}", run.stdout);
    assert!(run.stdout.contains("         result: \"ok\"\n"), "{}", run.stdout);
}

#[cfg(unix)]
#[rstest]
fn schema_violation_reports_the_path(workspace: TempDir) {
    let plugin = answering_plugin(workspace.path(), r#"{"result":"bad"}"#);
    let run = run_cli(&Config::default(), &["check", "-m", "-p", path_arg(&plugin)]);
    assert_eq!(run.exit, ExitCode::from(1));
    let report = run.json();
    assert_eq!(report["result"], json!("error"));
    assert_eq!(report["path"], json!("$.result"));
    assert_eq!(report["plugin_output"], json!({"result": "bad"}));
}

#[cfg(unix)]
#[rstest]
fn non_json_output_breaks_the_contract(workspace: TempDir) {
    let plugin = answering_plugin(workspace.path(), "hello");
    let run = run_cli(&Config::default(), &["check", "-m", "-p", path_arg(&plugin)]);
    assert_eq!(run.exit, ExitCode::from(1));
    let report = run.json();
    assert_eq!(
        report["description"],
        json!("error processing the output of the plugin")
    );
    assert_eq!(report["plugin_output"], json!("hello"));
}

#[cfg(unix)]
#[rstest]
fn crashing_plugin_is_an_execution_error(workspace: TempDir) {
    let plugin = write_script(workspace.path(), "plugin.sh", "printf 'boom'\nexit 3");
    let run = run_cli(&Config::default(), &["check", "-m", "-p", path_arg(&plugin)]);
    assert_eq!(run.exit, ExitCode::from(2));
    let report = run.json();
    assert_eq!(report["description"], json!("error executing the plugin"));
    assert_eq!(report["plugin_output"], json!("boom"));
    assert!(report.get("plugin_time").is_none());
}

#[cfg(unix)]
#[rstest]
fn stalled_plugin_times_out(workspace: TempDir) {
    let plugin = write_script(workspace.path(), "plugin.sh", "exec sleep 5");
    let config = Config {
        plugin_timeout_secs: 1,
        ..Config::default()
    };
    let run = run_cli(&config, &["check", "-m", "-p", path_arg(&plugin)]);
    assert_eq!(run.exit, ExitCode::from(2));
    let error = run.json()["error"].as_str().unwrap_or_default().to_owned();
    assert!(error.contains("timed out"), "{error}");
}

#[cfg(unix)]
#[rstest]
fn environment_transport_uses_the_configured_variable(workspace: TempDir) {
    let body = format!(
        "if [ -n \"$PLUGIN_INPUT\" ] && [ -z \"$HOME\" ]; then printf '%s' '{PARAMETER_OK}'; \
         else printf 'missing'; fi"
    );
    let plugin = write_script(workspace.path(), "plugin.sh", &body);
    let config = Config {
        env_var: "PLUGIN_INPUT".to_owned(),
        ..Config::default()
    };
    let run = run_cli(&config, &["check", "-e", "-p", path_arg(&plugin)]);
    assert_eq!(run.exit, ExitCode::SUCCESS, "{}", run.stdout);
}

#[cfg(unix)]
#[rstest]
fn test_passes_when_output_matches(workspace: TempDir) {
    let plugin = answering_plugin(workspace.path(), PARAMETER_OK);
    let run = run_cli(
        &Config::default(),
        &[
            "test",
            "-p",
            path_arg(&plugin),
            "--expected-output-string",
            r#"{"result": "ok", "conf_params": []}"#,
        ],
    );
    assert_eq!(run.exit, ExitCode::SUCCESS, "{}", run.stderr);
    let report = run.json();
    assert_eq!(
        report["description"],
        json!("Test passed. All output as expected")
    );
    assert_eq!(
        report["plugin_output_expected"],
        json!({"result": "ok", "conf_params": []})
    );
}

#[cfg(unix)]
#[rstest]
fn test_reports_the_first_mismatch(workspace: TempDir) {
    let plugin = answering_plugin(workspace.path(), PARAMETER_OK);
    let expected = workspace.path().join("expected.json");
    fs::write(&expected, r#"{"version": "2.0.0"}"#).expect("write expected");
    let run = run_cli(
        &Config::default(),
        &[
            "test",
            "-p",
            path_arg(&plugin),
            "--expected-output-file",
            path_arg(&expected),
        ],
    );
    assert_eq!(run.exit, ExitCode::from(1));
    let report = run.json();
    assert_eq!(report["result"], json!("error"));
    assert_eq!(
        report["description"],
        json!(r#"unexpected output for key version: "1.0.0" instead of "2.0.0""#)
    );
}

#[cfg(unix)]
#[rstest]
fn generate_fills_conf_params_with_declared_defaults(workspace: TempDir) {
    let answer = json!({
        "result": "ok",
        "version": "1.0.0",
        "request_params": [],
        "conf_params": [
            {"name": "host", "type": "string", "default": "localhost"},
            {"name": "port", "type": "string", "default": "22"},
        ],
    });
    let plugin = answering_plugin(workspace.path(), &answer.to_string());
    let run = run_cli(&Config::default(), &["generate", "-p", path_arg(&plugin)]);
    assert_eq!(run.exit, ExitCode::SUCCESS, "{}", run.stderr);
    let document = run.json();
    assert_eq!(document["action"], json!("parameter"));
    assert_eq!(
        document["conf_params"],
        json!({"host": "localhost", "port": "22"})
    );
}

#[cfg(unix)]
#[rstest]
fn generate_keeps_the_requested_action(workspace: TempDir) {
    let plugin = answering_plugin(workspace.path(), PARAMETER_OK);
    let run = run_cli(
        &Config::default(),
        &["generate", "-a", "request", "-p", path_arg(&plugin)],
    );
    assert_eq!(run.exit, ExitCode::SUCCESS, "{}", run.stderr);
    assert_eq!(run.json()["action"], json!("request"));
}

#[cfg(unix)]
#[rstest]
fn generate_rejects_unusable_parameter_names(workspace: TempDir) {
    let answer = json!({
        "result": "ok",
        "version": "1.0.0",
        "request_params": [],
        "conf_params": [{"name": "Bad Key", "type": "string", "default": "x"}],
    });
    let plugin = answering_plugin(workspace.path(), &answer.to_string());
    let run = run_cli(
        &Config::default(),
        &["generate", "-a", "request", "-p", path_arg(&plugin)],
    );
    assert_eq!(run.exit, ExitCode::from(1));
    assert_eq!(run.json()["path"], json!("$.conf_params.Bad Key"));
}

#[cfg(unix)]
#[rstest]
fn suite_runs_every_case_from_the_configuration(workspace: TempDir) {
    let plugin = answering_plugin(workspace.path(), PARAMETER_OK);
    let config_path = workspace.path().join("tests.json");
    let suite = json!({
        "exec_file": path_arg(&plugin),
        "tests": [
            {"expected_output": {"result": "ok"}},
            {"input": {"cred_state": "TTS_1"}, "expected_output": {"version": "2.0.0"}},
            {}
        ]
    });
    fs::write(&config_path, suite.to_string()).expect("write suite");

    let run = run_cli(&Config::default(), &["suite", path_arg(&config_path)]);
    assert_eq!(run.exit, ExitCode::from(1));
    let result = run.json();
    assert_eq!(result["total"], json!(3));
    assert_eq!(result["passed"], json!(2));
    assert_eq!(result["failed"], json!(1));
    assert_eq!(result["failed_cases"][0]["index"], json!(1));
    assert_eq!(
        result["failed_cases"][0]["plugin_input"]["cred_state"],
        json!("TTS_1")
    );
}

#[rstest]
fn suite_with_missing_configuration_is_a_user_error(workspace: TempDir) {
    let absent = workspace.path().join("tests.json");
    let run = run_cli(&Config::default(), &["suite", path_arg(&absent)]);
    assert_eq!(run.exit, ExitCode::from(4));
    assert!(
        run.stderr.contains("failed to read test configuration"),
        "{}",
        run.stderr
    );
}
