//! CLI entrypoint for the WaTTS plugin tester.
//!
//! The binary delegates to [`watts_plugin_tester::run`], which loads
//! configuration, parses the command line, drives the plugin, and maps the
//! outcome to a process exit code.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    watts_plugin_tester::run(std::env::args_os(), &mut stdout, &mut stderr)
}
