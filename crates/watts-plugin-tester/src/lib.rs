//! Command-line runtime for the WaTTS plugin tester.
//!
//! The module owns argument parsing, configuration bootstrapping and exit
//! code mapping. The interface is exercised both from the binary entrypoint
//! and from tests where configuration loading and IO streams can be
//! substituted.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;

mod cli;
mod commands;
mod config;
mod errors;
mod report;
mod telemetry;

use cli::Cli;
use config::{ConfigArgumentSplit, ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::{AppError, ExitCategory};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: This list must be kept in sync with the fields of
/// `watts_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--env-var",
    "--plugin-timeout-secs",
];

/// Bundles the IO streams provided to the CLI runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }
}

struct CliRunner<'a, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
}

impl<'a, W, E, L> CliRunner<'a, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'a, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run<I>(&mut self, args: I) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);
        let cli_arguments = prepare_cli_arguments(&args, &split);

        let result = Cli::try_parse_from(cli_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| {
                telemetry::initialise(&config)?;
                commands::execute(&cli, &config)
            })
            .and_then(|outcome| {
                self.io
                    .stdout
                    .write_all(outcome.text.as_bytes())
                    .and_then(|()| self.io.stdout.flush())
                    .map_err(AppError::Write)?;
                Ok(outcome.exit)
            });

        match result {
            Ok(exit) => exit.into(),
            Err(AppError::CliUsage(error)) => self.report_usage(&error),
            Err(error) => {
                let _ = writeln!(self.io.stderr, "{error}");
                error.category().into()
            }
        }
    }

    /// Help and version requests are answered on stdout and succeed; every
    /// other parse failure is a user error.
    fn report_usage(&mut self, error: &clap::Error) -> ExitCode {
        let rendered = error.render();
        match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = write!(self.io.stdout, "{rendered}");
                ExitCategory::Success.into()
            }
            _ => {
                let _ = write!(self.io.stderr, "{rendered}");
                ExitCategory::User.into()
            }
        }
    }
}

/// Runs the CLI using the provided arguments and IO handles.
///
/// Exit codes: `0` success, `1` the plugin broke the protocol or the
/// expectations, `2` the plugin could not be run, `3` internal error, `4`
/// user error.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr);
    run_with_loader(args, &mut io, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<'a, I, W, E, L>(
    args: I,
    io: &'a mut IoStreams<'a, W, E>,
    loader: &'a L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    CliRunner::new(io, loader).run(args)
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    cli_arguments.extend(args.iter().skip(split.command_start).cloned());
    cli_arguments
}

#[cfg(test)]
mod tests;
