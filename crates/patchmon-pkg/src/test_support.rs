//! Test doubles shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use patchmon_exec::{CommandResult, ExecError, Executor};
use tracing_subscriber::fmt::MakeWriter;

/// Executor that replays canned results keyed by the full command line
#[derive(Default)]
pub struct ScriptedExecutor {
    responses: HashMap<String, Result<CommandResult, ExecError>>,
    resolvable: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark programs as present on the search path
    pub fn with_programs(mut self, programs: &[&str]) -> Self {
        self.resolvable
            .extend(programs.iter().map(|p| (*p).to_string()));
        self
    }

    /// Reply to `command` with the given exit status and stdout
    pub fn with_output(mut self, command: &str, status: i32, stdout: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            Ok(CommandResult::new(status, stdout, "")),
        );
        self
    }

    /// Reply to `command` with an error
    pub fn with_error(mut self, command: &str, error: ExecError) -> Self {
        self.responses.insert(command.to_string(), Err(error));
        self
    }

    /// Command lines run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandResult, ExecError> {
        let mut command = program.to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        self.calls.lock().unwrap().push(command.clone());

        self.responses
            .get(&command)
            .cloned()
            .unwrap_or_else(|| Err(ExecError::NotFound(program.to_string())))
    }

    fn resolve(&self, program: &str) -> bool {
        self.resolvable.contains(program)
    }

    fn executor_type(&self) -> &'static str {
        "scripted"
    }
}

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a scoped subscriber and return what it logged
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}
