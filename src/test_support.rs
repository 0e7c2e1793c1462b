use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::options::ExecOptions;
use crate::process::{ExecutionError, ExecutionResult, Executor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub command_line: String,
    pub options: ExecOptions,
    pub cwd: Option<PathBuf>,
}

/// Answers every command with the same output and remembers what it was asked to run.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeExecutor {
    stdout: String,
    stderr: String,
    exit_code: i32,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl FakeExecutor {
    pub(crate) fn new(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn failing(exit_code: i32, stderr: &str) -> Self {
        Self {
            stderr: stderr.to_string(),
            exit_code,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn command_lines(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command_line).collect()
    }
}

impl Executor for FakeExecutor {
    fn execute(
        &self,
        command_line: &str,
        options: &ExecOptions,
        cwd: Option<&Path>,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.calls.lock().unwrap().push(RecordedCall {
            command_line: command_line.to_string(),
            options: options.clone(),
            cwd: cwd.map(Path::to_path_buf),
        });
        Ok(ExecutionResult {
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            command_line: command_line.to_string(),
            options: options.clone(),
        })
    }
}

/// A directory that passes the repository marker check without needing git
pub(crate) fn fake_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs_err::create_dir_all(dir.path().join(".git")).unwrap();
    fs_err::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
    dir
}
