use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::consts::CORE_BARE_KEY;
use crate::git::commands::{self, GitCommand};
use crate::git::{GitError, is_valid_repository_path, parse_config_list};
use crate::options::{ExecOptions, parse_git_bool};
use crate::process::{ExecutionResult, Executor, ProcessRunner};
use crate::registry::CommandRegistry;

/// Absolute, without trailing slash. Doesn't touch the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .components()
        .collect()
}

/// A handle on a repository, executing commands against it through an [`Executor`].
///
/// A handle is either uninitialized or initialized, never going back. It gets initialized when
/// constructed with a path that is a repository, or later on through [`Git::set_initialized`],
/// which loads the repository config once.
pub struct Git {
    path: Option<PathBuf>,
    bare: bool,
    initialized: bool,
    config: Option<BTreeMap<String, String>>,
    options: ExecOptions,
    executor: Box<dyn Executor>,
    commands: CommandRegistry<dyn GitCommand>,
}

impl fmt::Debug for Git {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.path)
            .field("bare", &self.bare)
            .field("initialized", &self.initialized)
            .field("options", &self.options)
            .field("commands", &self.commands)
            .finish_non_exhaustive()
    }
}

impl Git {
    pub fn new(path: Option<&Path>, options: ExecOptions) -> Result<Self, GitError> {
        Self::with_executor(path, options, ProcessRunner::new())
    }

    /// A path that isn't a repository yet is kept as is, uninitialized, so that something like
    /// `init` can create it later.
    pub fn with_executor(
        path: Option<&Path>,
        options: ExecOptions,
        executor: impl Executor + 'static,
    ) -> Result<Self, GitError> {
        let bare = options.get_bool(CORE_BARE_KEY).unwrap_or(false);
        let mut git = Self {
            path: None,
            bare,
            initialized: false,
            config: None,
            options,
            executor: Box::new(executor),
            commands: commands::builtin(),
        };

        if let Some(path) = path {
            if is_valid_repository_path(path) {
                git.set_path(path)?;
                git.set_initialized()?;
            } else {
                log::debug!(
                    "{} is not a repository yet, keeping it uninitialized",
                    path.display()
                );
                git.path = Some(normalize_path(path));
            }
        }

        Ok(git)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl AsRef<Path>) -> Result<(), GitError> {
        let path = path.as_ref();
        if !is_valid_repository_path(path) {
            return Err(GitError::InvalidRepositoryPath(path.to_path_buf()));
        }
        self.path = Some(normalize_path(path));
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Loads the repository config with `config --list`, merges the instance options over it
    /// and marks the handle as initialized. Once loaded, the config is never reloaded.
    pub fn set_initialized(&mut self) -> Result<(), GitError> {
        if self.config.is_some() {
            self.initialized = true;
            return Ok(());
        }

        let path = self.path.as_deref().ok_or(GitError::MissingPath)?;
        if !is_valid_repository_path(path) {
            return Err(GitError::InvalidRepositoryPath(path.to_path_buf()));
        }

        log::debug!("Loading repository config for {}", path.display());
        let result = self.exec("config --list", None)?;
        if !result.success() {
            log::warn!(
                "`config --list` exited with {} in {}: {}",
                result.exit_code,
                path.display(),
                result.stderr.trim()
            );
        }

        let mut config = parse_config_list(&result.stdout);
        config.extend(
            self.options
                .extra
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        self.bare = config
            .get(CORE_BARE_KEY)
            .map(|v| parse_git_bool(v))
            .unwrap_or(false);
        self.config = Some(config);
        self.initialized = true;
        Ok(())
    }

    pub fn is_bare(&self) -> Result<bool, GitError> {
        if !self.initialized {
            return Err(GitError::NotInitialized("Git::is_bare"));
        }
        Ok(self.bare)
    }

    pub fn set_bare(&mut self, bare: bool) {
        self.bare = bare;
    }

    /// The repository config merged with the instance options, None until initialized
    pub fn config(&self) -> Option<&BTreeMap<String, String>> {
        self.config.as_ref()
    }

    pub fn config_value(&self, key: &str) -> Option<&str> {
        self.config.as_ref()?.get(key).map(String::as_str)
    }

    pub fn options(&self) -> &ExecOptions {
        &self.options
    }

    /// Runs `command_line` in the repository path, or in the current directory if there
    /// isn't one. `options` override the instance options for that call only.
    pub fn exec(
        &self,
        command_line: &str,
        options: Option<&ExecOptions>,
    ) -> Result<ExecutionResult, GitError> {
        let options = self.options.layered(options);
        Ok(self
            .executor
            .execute(command_line, &options, self.path.as_deref())?)
    }

    pub fn register_command<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn GitCommand> + Send + Sync + 'static,
    {
        self.commands.register(name, factory);
    }

    /// The command object for that name, built on first use and reused afterwards
    pub fn command(&mut self, name: &str) -> Result<Arc<dyn GitCommand>, GitError> {
        self.commands
            .resolve(name)
            .ok_or_else(|| GitError::UnknownCommand(name.to_string()))
    }

    /// Whether that command has already been loaded on this handle
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.is_loaded(name)
    }

    pub fn run(&mut self, name: &str, args: &[&str]) -> Result<ExecutionResult, GitError> {
        let command = self.command(name)?;
        command.run(self, args)
    }
}
