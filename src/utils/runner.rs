//! Child process supervision for borg (and rclone)
//!
//! Each run spawns one child and two tasks draining its stdout and stderr
//! line by line. The run completes only after both streams have closed and
//! the child has exited. Output is only logged unless the caller asks for
//! it with [`CommandRunner::run_captured`]. A non-zero exit is reported through
//! [`RunOutcome::success`]; only failures to start or wait on the child are
//! errors.

use crate::managers::logging::Logger;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

pub const BORG_EXECUTABLE: &str = "borg";
pub const RCLONE_EXECUTABLE: &str = "rclone";

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("{0} command was not found or is not installed.")]
    MissingExecutable(String),

    #[error("Failed to start {program}: {source}")]
    Start {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed reading {stream} of {program}: {source}")]
    StreamRead {
        program: String,
        stream: StreamKind,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create process runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl ExecutionError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecutionError::MissingExecutable(_) => 1,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// How a completed child process ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub success: bool,
    /// `None` when the child was terminated by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout lines (empty unless run captured)
    pub stdout: Vec<String>,
    /// Captured stderr lines (empty unless run captured)
    pub stderr: Vec<String>,
}

/// Abstraction for running external tools, enabling mocking in tests
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        env: &[(String, String)],
        args: &[String],
    ) -> Result<RunOutcome, ExecutionError>;

    /// Like [`run`](Self::run), but stdout is handed back in
    /// [`RunOutcome::stdout`] instead of being logged, and stderr is kept too
    fn run_captured(
        &self,
        program: &str,
        env: &[(String, String)],
        args: &[String],
    ) -> Result<RunOutcome, ExecutionError>;
}

/// Runs real child processes on a private tokio runtime
pub struct ProcessRunner {
    runtime: tokio::runtime::Runtime,
    logger: Arc<dyn Logger>,
}

impl ProcessRunner {
    pub fn new(logger: Arc<dyn Logger>) -> Result<Self, ExecutionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExecutionError::Runtime)?;

        Ok(Self { runtime, logger })
    }

    fn execute(
        &self,
        program: &str,
        env: &[(String, String)],
        args: &[String],
        capture: bool,
    ) -> Result<RunOutcome, ExecutionError> {
        let executable = which::which(program)
            .map_err(|_| ExecutionError::MissingExecutable(program.to_string()))?;

        self.runtime
            .block_on(self.run_child(&executable, program, env, args, capture))
    }

    async fn run_child(
        &self,
        executable: &Path,
        program: &str,
        env: &[(String, String)],
        args: &[String],
        capture: bool,
    ) -> Result<RunOutcome, ExecutionError> {
        let mut cmd = Command::new(executable);
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        self.logger
            .debug(&format!("Running command: {} {}", program, args.join(" ")));

        let mut child = cmd.spawn().map_err(|source| ExecutionError::Start {
            program: program.to_string(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stdout_task = tokio::spawn(drain_owned(
            stdout,
            StreamKind::Stdout,
            self.logger.clone(),
            capture,
        ));
        let stderr_task = tokio::spawn(drain_owned(
            stderr,
            StreamKind::Stderr,
            self.logger.clone(),
            capture,
        ));

        // Wait for both readers before reaping the child
        let (stdout_result, stderr_result) = tokio::join!(stdout_task, stderr_task);
        let stdout_lines = self.collect(program, StreamKind::Stdout, stdout_result)?;
        let stderr_lines = self.collect(program, StreamKind::Stderr, stderr_result)?;

        let status = child.wait().await.map_err(|source| ExecutionError::Wait {
            program: program.to_string(),
            source,
        })?;

        self.logger
            .debug(&format!("{} exited with {}", program, status));

        Ok(RunOutcome {
            success: status.success(),
            exit_code: status.code(),
            stdout: stdout_lines,
            stderr: stderr_lines,
        })
    }

    fn collect(
        &self,
        program: &str,
        stream: StreamKind,
        joined: Result<io::Result<Vec<String>>, tokio::task::JoinError>,
    ) -> Result<Vec<String>, ExecutionError> {
        joined
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .and_then(|result| result)
            .map_err(|source| ExecutionError::StreamRead {
                program: program.to_string(),
                stream,
                source,
            })
    }
}

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        program: &str,
        env: &[(String, String)],
        args: &[String],
    ) -> Result<RunOutcome, ExecutionError> {
        self.execute(program, env, args, false)
    }

    fn run_captured(
        &self,
        program: &str,
        env: &[(String, String)],
        args: &[String],
    ) -> Result<RunOutcome, ExecutionError> {
        self.execute(program, env, args, true)
    }
}

async fn drain_owned<R>(
    reader: Option<R>,
    stream: StreamKind,
    logger: Arc<dyn Logger>,
    capture: bool,
) -> io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => drain_lines(reader, stream, logger.as_ref(), capture).await,
        None => Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            format!("{} was not captured", stream),
        )),
    }
}

/// Read `reader` line by line until it closes.
///
/// Stderr lines are logged at debug level and echoed to the user. Stdout
/// lines are logged at debug level, or only collected when `capture` is set
/// since the caller then reports them itself. Bytes that are not UTF-8 are
/// replaced rather than failing the run.
pub async fn drain_lines<R>(
    reader: R,
    stream: StreamKind,
    logger: &dyn Logger,
    capture: bool,
) -> io::Result<Vec<String>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');

        match stream {
            StreamKind::Stdout if capture => {}
            StreamKind::Stdout => logger.debug(line),
            StreamKind::Stderr => {
                logger.debug(line);
                logger.echo_stderr(line);
            }
        }
        if capture {
            captured.push(line.to_string());
        }
    }

    Ok(captured)
}

/// A mock runner for testing that records calls and returns configured outcomes
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Recorded invocation
    #[derive(Clone, Debug)]
    pub struct RunCall {
        pub program: String,
        pub env: Vec<(String, String)>,
        pub args: Vec<String>,
        /// Made through [`CommandRunner::run_captured`]
        pub captured: bool,
    }

    impl RunCall {
        /// First argument, i.e. the borg subcommand
        pub fn subcommand(&self) -> Option<&str> {
            self.args.first().map(String::as_str)
        }

        pub fn env_var(&self, key: &str) -> Option<&str> {
            self.env
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        }
    }

    /// Configured response
    #[derive(Clone, Debug)]
    pub enum MockResponse {
        Exit(i32),
        MissingExecutable,
        StartFailure,
    }

    impl Default for MockResponse {
        fn default() -> Self {
            MockResponse::Exit(0)
        }
    }

    /// Mock runner for testing
    #[derive(Clone, Default)]
    pub struct MockRunner {
        calls: Arc<Mutex<Vec<RunCall>>>,
        /// Responses keyed by program name or `program subcommand`
        responses: Arc<Mutex<HashMap<String, MockResponse>>>,
        default_response: Arc<Mutex<MockResponse>>,
    }

    impl MockRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure a response for `program`, or for one subcommand with `"borg init"`
        pub fn expect(self, key: &str, response: MockResponse) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(key.to_string(), response);
            self
        }

        /// Set the default response for unconfigured programs
        pub fn with_default_response(self, response: MockResponse) -> Self {
            *self.default_response.lock().unwrap() = response;
            self
        }

        pub fn calls(&self) -> Vec<RunCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Argument lists of every call, in order
        pub fn call_args(&self) -> Vec<Vec<String>> {
            self.calls().into_iter().map(|c| c.args).collect()
        }

        pub fn call_count(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }

        fn respond(
            &self,
            program: &str,
            env: &[(String, String)],
            args: &[String],
            captured: bool,
        ) -> Result<RunOutcome, ExecutionError> {
            self.calls.lock().unwrap().push(RunCall {
                program: program.to_string(),
                env: env.to_vec(),
                args: args.to_vec(),
                captured,
            });

            match self.response_for(program, args) {
                MockResponse::Exit(code) => Ok(RunOutcome {
                    success: code == 0,
                    exit_code: Some(code),
                    ..RunOutcome::default()
                }),
                MockResponse::MissingExecutable => {
                    Err(ExecutionError::MissingExecutable(program.to_string()))
                }
                MockResponse::StartFailure => Err(ExecutionError::Start {
                    program: program.to_string(),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "mock start failure"),
                }),
            }
        }

        fn response_for(&self, program: &str, args: &[String]) -> MockResponse {
            let responses = self.responses.lock().unwrap();
            if let Some(sub) = args.first() {
                if let Some(r) = responses.get(&format!("{} {}", program, sub)) {
                    return r.clone();
                }
            }
            responses
                .get(program)
                .cloned()
                .unwrap_or_else(|| self.default_response.lock().unwrap().clone())
        }
    }

    impl CommandRunner for MockRunner {
        fn run(
            &self,
            program: &str,
            env: &[(String, String)],
            args: &[String],
        ) -> Result<RunOutcome, ExecutionError> {
            self.respond(program, env, args, false)
        }

        fn run_captured(
            &self,
            program: &str,
            env: &[(String, String)],
            args: &[String],
        ) -> Result<RunOutcome, ExecutionError> {
            self.respond(program, env, args, true)
        }
    }
}
