mod cancellation;
mod cast;
#[cfg(feature = "cli")]
pub mod cli;
mod git;
mod options;
mod process;
mod registry;
#[cfg(test)]
mod test_support;

pub mod consts;

pub use cancellation::Cancellation;
pub use cast::{Cast, CastCommand, CastError};
pub use git::{
    Git, GitCommand, GitConfig, GitError, GitInit, GitStatus, is_valid_repository_path,
    parse_config_list,
};
pub use options::{ExecOptions, OptionsError, parse_git_bool, resolve};
pub use process::{
    ExecutionError, ExecutionErrorKind, ExecutionResult, Executor, IdleBackoff, ProcessRunner,
    strip_escape_sequences,
};
pub use registry::CommandRegistry;
