//! Command flows.
//!
//! Each subcommand assembles the plugin input, drives the plugin when it
//! needs to, and turns the verdict into an [`Outcome`]: the text written to
//! standard output plus the exit category. Problems with the plugin's answer
//! are part of the report; only user, harness and output failures surface as
//! [`AppError`]s.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use watts_config::Config;
use watts_plugins::input::parse_object;
use watts_plugins::{
    CheckOutcome, Document, ExecutionSettings, InputError, InputOverrides, PluginExecutor,
    ProcessExecutor, SpecifiedInput, SuiteConfig, SuiteRunner, Transport, check_output,
    compare_to_expected, declared_conf_params, specify,
};
use watts_schemes::{Action, SchemaRegistry};

use crate::cli::{Cli, CliCommand, ExpectedOutputArgs, PluginArgs};
use crate::errors::{AppError, ExitCategory};
use crate::report::{Report, ReportMode, pretty_json};

/// Tracing target for command flows.
const COMMAND_TARGET: &str = "watts_plugin_tester::commands";

/// What a command writes to standard output and how the process exits.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) text: String,
    pub(crate) exit: ExitCategory,
}

impl Outcome {
    fn report(report: &Report, mode: ReportMode, exit: ExitCategory) -> Result<Self, AppError> {
        let text = report.render(mode).map_err(AppError::Render)?;
        Ok(Self { text, exit })
    }

    fn json(value: &impl serde::Serialize, exit: ExitCategory) -> Result<Self, AppError> {
        let mut text = pretty_json(value).map_err(AppError::Render)?;
        text.push('\n');
        Ok(Self { text, exit })
    }

    fn document(document: &Document) -> Result<Self, AppError> {
        Self::json(document.as_map(), ExitCategory::Success)
    }
}

/// Where a plugin run ended up.
enum Stage {
    /// The output is valid JSON conforming to the schema.
    Passed(Value),
    Stopped(ExitCategory),
}

/// Runs the parsed command line against `config`.
pub(crate) fn execute(cli: &Cli, config: &Config) -> Result<Outcome, AppError> {
    let registry = SchemaRegistry::builtin();
    let session = Session::new(&registry, &cli.plugin, config);
    match &cli.command {
        CliCommand::Check => session.check(),
        CliCommand::Test(expected) => session.test(expected),
        CliCommand::Default => Outcome::document(&Document::default_input()),
        CliCommand::Specific => session.specific(),
        CliCommand::Generate => session.generate(),
        CliCommand::Suite { path } => session.suite(path),
    }
}

struct Session<'a> {
    registry: &'a SchemaRegistry,
    args: &'a PluginArgs,
    executor: ProcessExecutor,
    mode: ReportMode,
}

impl<'a> Session<'a> {
    fn new(registry: &'a SchemaRegistry, args: &'a PluginArgs, config: &Config) -> Self {
        let transport = if args.env {
            Transport::environment(config.env_var())
        } else {
            Transport::Argument
        };
        let executor = ProcessExecutor::new(ExecutionSettings {
            transport,
            timeout: config.plugin_timeout(),
        });
        Self {
            registry,
            args,
            executor,
            mode: ReportMode::from_machine_flag(args.machine),
        }
    }

    fn plugin(&self) -> Result<&'a Path, AppError> {
        self.args.plugin_name.as_deref().ok_or(AppError::MissingPlugin)
    }

    fn specify_input(&self, overrides: &InputOverrides) -> Result<SpecifiedInput, AppError> {
        Ok(specify(self.registry, Document::default_input(), overrides)?)
    }

    fn check(&self) -> Result<Outcome, AppError> {
        let input = self.specify_input(&self.args.overrides())?;
        let mut report = Report::default();
        let exit = match self.run_and_check(&input, &mut report)? {
            Stage::Passed(_) => ExitCategory::Success,
            Stage::Stopped(category) => category,
        };
        Outcome::report(&report, self.mode, exit)
    }

    fn test(&self, expected: &ExpectedOutputArgs) -> Result<Outcome, AppError> {
        let wanted = expected_output(expected)?;
        let input = self.specify_input(&self.args.overrides())?;
        let mut report = Report::default();
        let exit = match self.run_and_check(&input, &mut report)? {
            Stage::Stopped(category) => category,
            Stage::Passed(output) => {
                report.record("plugin_output_expected", Value::Object(wanted.clone()));
                let (result, description, category) = compare_to_expected(&output, &wanted)
                    .map_or_else(
                        |mismatch| ("error", mismatch.to_string(), ExitCategory::PluginContract),
                        |()| {
                            let passed = "Test passed. All output as expected".to_owned();
                            ("ok", passed, ExitCategory::Success)
                        },
                    );
                report.record("result", result);
                report.record("description", description);
                category
            }
        };
        Outcome::report(&report, ReportMode::Machine, exit)
    }

    fn specific(&self) -> Result<Outcome, AppError> {
        let input = self.specify_input(&self.args.overrides())?;
        Outcome::document(input.document())
    }

    fn generate(&self) -> Result<Outcome, AppError> {
        let overrides = self.args.overrides();
        let input = self.specify_input(&overrides)?;
        let probe = self.specify_input(&InputOverrides {
            action: Some(Action::Parameter.as_str().to_owned()),
            ..overrides
        })?;

        let mut report = Report::default();
        let output = match self.run_and_check(&probe, &mut report)? {
            Stage::Passed(output) => output,
            Stage::Stopped(category) => {
                return Outcome::report(&report, ReportMode::Machine, category);
            }
        };

        let action = input.action();
        let mut document = input.into_document();
        document.insert("conf_params", Value::Object(declared_conf_params(&output)));
        if let Err(violation) = self.registry.validate_input(action, &document.to_value()) {
            report.record("result", "error");
            report.record(
                "description",
                format!("generated plugin input is invalid: {}", violation.reason),
            );
            report.record("path", violation.path.to_string());
            return Outcome::report(&report, ReportMode::Machine, ExitCategory::PluginContract);
        }
        Outcome::document(&document)
    }

    fn suite(&self, path: &Path) -> Result<Outcome, AppError> {
        let config = SuiteConfig::load(path)?;
        let plugin = self.args.plugin_name.clone().unwrap_or(config.exec_file);
        let runner = SuiteRunner::new(self.registry, self.executor.clone())
            .with_overrides(self.args.overrides());
        let result = runner.run(&plugin, &config.tests)?;
        let exit = if result.is_success() {
            ExitCategory::Success
        } else {
            ExitCategory::PluginContract
        };
        Outcome::json(&result, exit)
    }

    /// Runs the plugin on `input` and validates its answer, recording every
    /// step in `report`.
    fn run_and_check(
        &self,
        input: &SpecifiedInput,
        report: &mut Report,
    ) -> Result<Stage, AppError> {
        let plugin = self.plugin()?;
        report.record("plugin_name", plugin.display().to_string());
        report.record("plugin_input", input.document().to_value());

        let execution = self.executor.execute(plugin, input.document())?;
        if let Some(failure) = execution.failure() {
            report.record("result", "error");
            report.record("error", failure.to_string());
            report.record("plugin_output", execution.output_lossy());
            report.record("description", "error executing the plugin");
            return Ok(Stage::Stopped(ExitCategory::PluginExecution));
        }
        report.record("plugin_time", format!("{:?}", execution.elapsed()));

        let requested = input
            .watts_version()
            .unwrap_or_else(|| self.registry.default_version());
        let check = check_output(self.registry, requested, input.action(), execution.output());
        if check.fell_back() {
            warn!(
                target: COMMAND_TARGET,
                requested,
                used = check.version(),
                "unknown protocol version, validating against the default"
            );
        }
        debug!(
            target: COMMAND_TARGET,
            action = input.action().as_str(),
            passed = check.passed(),
            "plugin output checked"
        );

        match check.outcome() {
            CheckOutcome::NotJson { message } => {
                report.record("result", "error");
                report.record("description", check.description());
                report.record("error", message.clone());
                report.record("plugin_output", execution.output_lossy());
                Ok(Stage::Stopped(ExitCategory::PluginContract))
            }
            CheckOutcome::SchemaViolation(violation) => {
                report.record("plugin_output", check.output().cloned().unwrap_or(Value::Null));
                report.record("result", "error");
                report.record("description", check.description());
                report.record("path", violation.path.to_string());
                Ok(Stage::Stopped(ExitCategory::PluginContract))
            }
            CheckOutcome::Passed => {
                let output = check.output().cloned().unwrap_or(Value::Null);
                report.record("plugin_output", output.clone());
                report.record("result", "ok");
                report.record("description", check.description());
                Ok(Stage::Passed(output))
            }
        }
    }
}

fn expected_output(args: &ExpectedOutputArgs) -> Result<Map<String, Value>, AppError> {
    if let Some(path) = &args.expected_output_file {
        let text = fs::read_to_string(path).map_err(|source| InputError::ReadFile {
            path: path.clone(),
            source: Arc::new(source),
        })?;
        return Ok(parse_object(&text, &path.display().to_string())?.into_map());
    }
    if let Some(text) = &args.expected_output_string {
        return Ok(parse_object(text, "--expected-output-string")?.into_map());
    }
    Err(AppError::MissingExpectedOutput)
}
