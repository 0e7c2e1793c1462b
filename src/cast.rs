use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::consts::GIT_PATH_OPTION;
use crate::git::{Git, GitError};
use crate::options::{ExecOptions, resolve};
use crate::process::{ExecutionResult, Executor, ProcessRunner};
use crate::registry::CommandRegistry;

/// A command working at the level of the whole [`Cast`] instance rather than a single git call
pub trait CastCommand: Send + Sync {
    fn run(&self, cast: &mut Cast, args: &[&str]) -> Result<ExecutionResult, CastError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("The Cast command `{0}` does not exist")]
    UnknownCommand(String),
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Entry point for applications embedding the library: give it the base path of the
/// project and an option bag, it sets up the [`Git`] handle.
///
/// The repository path is the `cast.gitPath` option when there is one, the base path otherwise.
#[derive(Debug)]
pub struct Cast {
    pub git: Git,
    options: ExecOptions,
    commands: CommandRegistry<dyn CastCommand>,
}

impl Cast {
    pub fn new(base_path: Option<&Path>, options: ExecOptions) -> Result<Self, CastError> {
        Self::with_executor(base_path, options, ProcessRunner::new())
    }

    pub fn with_executor(
        base_path: Option<&Path>,
        options: ExecOptions,
        executor: impl Executor + 'static,
    ) -> Result<Self, CastError> {
        let git_path = options
            .get(GIT_PATH_OPTION)
            .map(PathBuf::from)
            .or_else(|| base_path.map(Path::to_path_buf));
        let git = Git::with_executor(git_path.as_deref(), options.clone(), executor)?;

        Ok(Self {
            git,
            options,
            commands: CommandRegistry::new(),
        })
    }

    /// Looks up an option, `call` first, then the instance options
    pub fn option<'a>(&'a self, key: &str, call: Option<&'a ExecOptions>) -> Option<&'a str> {
        let call = call.and_then(|c| c.get(key));
        let instance = self.options.get(key);
        call.or(instance)
    }

    /// Same as [`Cast::option`] but falls back to `default`
    pub fn option_or<'a>(
        &'a self,
        key: &str,
        call: Option<&'a ExecOptions>,
        default: &'a str,
    ) -> &'a str {
        resolve(
            call.and_then(|c| c.get(key)),
            self.options.get(key),
            default,
        )
    }

    pub fn register_command<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn CastCommand> + Send + Sync + 'static,
    {
        self.commands.register(name, factory);
    }

    pub fn command(&mut self, name: &str) -> Result<Arc<dyn CastCommand>, CastError> {
        self.commands
            .resolve(name)
            .ok_or_else(|| CastError::UnknownCommand(name.to_string()))
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.commands.is_loaded(name)
    }

    pub fn run(&mut self, name: &str, args: &[&str]) -> Result<ExecutionResult, CastError> {
        let command = self.command(name)?;
        command.run(self, args)
    }
}
