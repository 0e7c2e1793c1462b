//! Command objects: each one builds a single invocation and decides what its result means.
//! They are looked up by name on a [`Git`] handle and instantiated once per handle.

use std::sync::Arc;

use fs_err as fs;

use crate::git::{Git, GitError};
use crate::process::ExecutionResult;
use crate::registry::CommandRegistry;

pub trait GitCommand: Send + Sync {
    fn run(&self, git: &mut Git, args: &[&str]) -> Result<ExecutionResult, GitError>;
}

/// `name` followed by `args`, quoted so that it tokenizes back to the same argv
fn command_line(name: &str, args: &[&str]) -> String {
    shell_words::join(std::iter::once(name).chain(args.iter().copied()))
}

fn ensure_success(result: ExecutionResult) -> Result<ExecutionResult, GitError> {
    if result.success() {
        Ok(result)
    } else {
        Err(GitError::CommandFailed {
            command_line: result.command_line,
            exit_code: result.exit_code,
            stderr: result.stderr.trim().to_string(),
        })
    }
}

/// Creates a repository at the handle's path, creating the directory if needed,
/// and initializes the handle on it.
#[derive(Debug, Default)]
pub struct GitInit;

impl GitCommand for GitInit {
    fn run(&self, git: &mut Git, args: &[&str]) -> Result<ExecutionResult, GitError> {
        let path = git.path().ok_or(GitError::MissingPath)?.to_path_buf();
        if !path.is_dir() {
            fs::create_dir_all(&path)?;
        }

        let result = ensure_success(git.exec(&command_line("init", args), None)?)?;
        git.set_path(&path)?;
        git.set_initialized()?;
        Ok(result)
    }
}

#[derive(Debug, Default)]
pub struct GitConfig;

impl GitCommand for GitConfig {
    fn run(&self, git: &mut Git, args: &[&str]) -> Result<ExecutionResult, GitError> {
        ensure_success(git.exec(&command_line("config", args), None)?)
    }
}

#[derive(Debug, Default)]
pub struct GitStatus;

impl GitCommand for GitStatus {
    fn run(&self, git: &mut Git, args: &[&str]) -> Result<ExecutionResult, GitError> {
        ensure_success(git.exec(&command_line("status", args), None)?)
    }
}

/// The commands every handle knows about
pub(crate) fn builtin() -> CommandRegistry<dyn GitCommand> {
    let mut registry: CommandRegistry<dyn GitCommand> = CommandRegistry::new();
    registry.register("init", || Arc::new(GitInit) as Arc<dyn GitCommand>);
    registry.register("config", || Arc::new(GitConfig) as Arc<dyn GitCommand>);
    registry.register("status", || Arc::new(GitStatus) as Arc<dyn GitCommand>);
    registry
}
