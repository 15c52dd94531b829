//! Process-based plugin execution.
//!
//! [`ProcessExecutor`] implements the [`PluginExecutor`] trait by serialising
//! the request document to compact JSON, base64-encoding it, and handing it to
//! the plugin either as its only argument or through an environment variable.
//! Standard output and standard error share one pipe, so the captured bytes
//! are exactly what the plugin wrote, interleaved as written.
//!
//! Launch failures, abnormal exits and timeouts are not errors here; they are
//! recorded in the returned [`ExecutionResult`]. Only problems detected before
//! the launch (a missing executable, an unserialisable document) are returned
//! as [`PluginError`]s.

use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{ExecutionFailure, PluginError};

/// Tracing target for plugin process operations.
const PROCESS_TARGET: &str = "watts_plugins::process";

/// How often a plugin with a deadline is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected once a timed-out plugin was killed.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// How the encoded request reaches the plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Transport {
    /// The encoded request is the plugin's only argument.
    #[default]
    Argument,
    /// The encoded request is stored in an environment variable and the
    /// plugin receives no arguments. The rest of the environment is cleared.
    Environment {
        /// Name of the variable carrying the request.
        variable: String,
    },
}

impl Transport {
    /// Environment transport through `variable`.
    #[must_use]
    pub fn environment(variable: impl Into<String>) -> Self {
        Self::Environment {
            variable: variable.into(),
        }
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Argument => "argument",
            Self::Environment { .. } => "environment",
        }
    }
}

/// Options governing a single plugin invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// How the request is delivered.
    pub transport: Transport,
    /// Upper bound on the plugin's run time. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// Outcome of one plugin invocation.
///
/// A result is produced for every launch attempt, whether or not the plugin
/// behaved. Decoding [`output`](Self::output) is left to the caller.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    output: Vec<u8>,
    failure: Option<ExecutionFailure>,
    elapsed: Duration,
}

impl ExecutionResult {
    /// Assembles a result.
    #[must_use]
    pub const fn new(
        output: Vec<u8>,
        failure: Option<ExecutionFailure>,
        elapsed: Duration,
    ) -> Self {
        Self {
            output,
            failure,
            elapsed,
        }
    }

    /// Combined standard output and standard error.
    #[must_use]
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Why the plugin did not complete normally, if it did not.
    #[must_use]
    pub const fn failure(&self) -> Option<&ExecutionFailure> {
        self.failure.as_ref()
    }

    /// Wall-clock time from just before launch until the plugin terminated.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether the plugin launched and exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// The output decoded as UTF-8, with invalid sequences replaced.
    #[must_use]
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Trait abstracting plugin execution for testability.
///
/// The production implementation is [`ProcessExecutor`]. Test code can
/// implement this trait to return canned output without spawning processes.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use std::time::Duration;
///
/// use watts_plugins::{Document, ExecutionResult, PluginError, PluginExecutor};
///
/// struct CannedExecutor;
///
/// impl PluginExecutor for CannedExecutor {
///     fn execute(
///         &self,
///         _plugin: &Path,
///         _document: &Document,
///     ) -> Result<ExecutionResult, PluginError> {
///         Ok(ExecutionResult::new(br#"{"result":"ok"}"#.to_vec(), None, Duration::ZERO))
///     }
/// }
/// ```
pub trait PluginExecutor {
    /// Runs `plugin` with `document` as its request.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the plugin cannot be attempted at all:
    /// the executable does not exist or the request cannot be serialised.
    fn execute(&self, plugin: &Path, document: &Document) -> Result<ExecutionResult, PluginError>;
}

/// Executes plugins as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    settings: ExecutionSettings,
}

impl ProcessExecutor {
    /// Creates an executor with the given settings.
    #[must_use]
    pub const fn new(settings: ExecutionSettings) -> Self {
        Self { settings }
    }

    /// The settings applied to every invocation.
    #[must_use]
    pub const fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }
}

impl PluginExecutor for ProcessExecutor {
    fn execute(&self, plugin: &Path, document: &Document) -> Result<ExecutionResult, PluginError> {
        fs::metadata(plugin).map_err(|source| PluginError::ExecutableNotFound {
            path: plugin.to_path_buf(),
            source: Arc::new(source),
        })?;
        let encoded = encode_document(document)?;

        let mut command = Command::new(plugin);
        match &self.settings.transport {
            Transport::Argument => {
                command.arg(&encoded);
            }
            Transport::Environment { variable } => {
                command.env_clear().env(variable, &encoded);
            }
        }

        debug!(
            target: PROCESS_TARGET,
            plugin = %plugin.display(),
            transport = self.settings.transport.label(),
            input_bytes = encoded.len(),
            "spawning plugin process"
        );

        let result = run_to_completion(command, self.settings.timeout);

        debug!(
            target: PROCESS_TARGET,
            plugin = %plugin.display(),
            output_bytes = result.output.len(),
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            failure = result.failure.as_ref().map(ToString::to_string),
            "plugin process finished"
        );
        Ok(result)
    }
}

/// Serialises `document` compactly and base64-encodes it (standard alphabet).
///
/// # Errors
///
/// Returns [`PluginError::SerializeInput`] if serialisation fails.
pub fn encode_document(document: &Document) -> Result<String, PluginError> {
    let json = serde_json::to_vec(document).map_err(|error| PluginError::SerializeInput {
        message: error.to_string(),
    })?;
    Ok(STANDARD.encode(json))
}

fn run_to_completion(mut command: Command, timeout: Option<Duration>) -> ExecutionResult {
    let start = Instant::now();
    let (reader, writer) = match combined_pipe() {
        Ok(pipe) => pipe,
        Err(source) => return failed_launch(ExecutionFailure::Io { source }, start),
    };
    command.stdin(Stdio::null()).stdout(writer.0).stderr(writer.1);
    isolate_process_group(&mut command);

    let spawned = command.spawn();
    // The command still owns the parent's write ends; they must close before
    // the reader can see end-of-file.
    drop(command);
    let mut child = match spawned {
        Ok(child) => child,
        Err(source) => {
            return failed_launch(
                ExecutionFailure::Launch {
                    source: Arc::new(source),
                },
                start,
            );
        }
    };

    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut reader = reader;
        let mut output = Vec::new();
        drop(sender.send(reader.read_to_end(&mut output).map(|_| output)));
    });

    let mut exit = wait_for_exit(&mut child, timeout);
    let collected = match timeout {
        None => receiver.recv().unwrap_or_else(|_| Err(collector_stopped())),
        Some(limit) => {
            let budget = if matches!(exit, Err(ExecutionFailure::TimedOut { .. })) {
                DRAIN_GRACE
            } else {
                limit.saturating_sub(start.elapsed()).max(DRAIN_GRACE)
            };
            receive_within(&receiver, budget).unwrap_or_else(|| {
                // A descendant still holds the pipe open after the deadline.
                warn!(
                    target: PROCESS_TARGET,
                    timeout_secs = limit.as_secs_f64(),
                    "plugin output still open at deadline, killing process group"
                );
                kill_process_group(&child);
                if exit.is_ok() {
                    exit = Err(ExecutionFailure::TimedOut { timeout: limit });
                }
                receive_within(&receiver, DRAIN_GRACE).unwrap_or_else(|| Ok(Vec::new()))
            })
        }
    };
    let elapsed = start.elapsed();

    match (exit, collected) {
        (Err(failure), Ok(output)) => ExecutionResult::new(output, Some(failure), elapsed),
        (Err(failure), Err(_)) => ExecutionResult::new(Vec::new(), Some(failure), elapsed),
        (Ok(()), Ok(output)) => ExecutionResult::new(output, None, elapsed),
        (Ok(()), Err(source)) => ExecutionResult::new(
            Vec::new(),
            Some(ExecutionFailure::Io {
                source: Arc::new(source),
            }),
            elapsed,
        ),
    }
}

type Collected = io::Result<Vec<u8>>;

fn receive_within(receiver: &mpsc::Receiver<Collected>, budget: Duration) -> Option<Collected> {
    match receiver.recv_timeout(budget) {
        Ok(collected) => Some(collected),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(collector_stopped())),
    }
}

fn collector_stopped() -> io::Error {
    io::Error::other("plugin output collector stopped")
}

/// Places the plugin in a process group of its own so that a timeout can
/// reach every process it started.
#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    command.process_group(0);
}

#[cfg(not(unix))]
const fn isolate_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(child: &Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(errno) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        debug!(target: PROCESS_TARGET, %errno, "plugin process group already gone");
    }
}

#[cfg(not(unix))]
const fn kill_process_group(_child: &Child) {}

type PipeWriters = (io::PipeWriter, io::PipeWriter);

fn combined_pipe() -> Result<(io::PipeReader, PipeWriters), Arc<io::Error>> {
    let (reader, writer) = io::pipe().map_err(Arc::new)?;
    let duplicate = writer.try_clone().map_err(Arc::new)?;
    Ok((reader, (writer, duplicate)))
}

fn failed_launch(failure: ExecutionFailure, start: Instant) -> ExecutionResult {
    ExecutionResult::new(Vec::new(), Some(failure), start.elapsed())
}

/// Waits for the child to exit, enforcing `timeout` when one is set.
fn wait_for_exit(child: &mut Child, timeout: Option<Duration>) -> Result<(), ExecutionFailure> {
    let status = match timeout {
        None => child.wait().map_err(io_failure)?,
        Some(limit) => wait_with_deadline(child, limit)?,
    };
    debug!(target: PROCESS_TARGET, ?status, "plugin process exited");
    exit_failure(status).map_or(Ok(()), Err)
}

fn wait_with_deadline(child: &mut Child, limit: Duration) -> Result<ExitStatus, ExecutionFailure> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().map_err(io_failure)? {
            return Ok(status);
        }
        if start.elapsed() > limit {
            warn!(
                target: PROCESS_TARGET,
                timeout_secs = limit.as_secs_f64(),
                "plugin timed out, killing process"
            );
            kill_process_group(child);
            drop(child.kill());
            drop(child.wait());
            return Err(ExecutionFailure::TimedOut { timeout: limit });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn exit_failure(status: ExitStatus) -> Option<ExecutionFailure> {
    if status.success() {
        return None;
    }
    Some(status.code().map_or_else(
        || ExecutionFailure::Terminated {
            description: status.to_string(),
        },
        |code| ExecutionFailure::NonZeroExit { status: code },
    ))
}

fn io_failure(source: io::Error) -> ExecutionFailure {
    ExecutionFailure::Io {
        source: Arc::new(source),
    }
}
