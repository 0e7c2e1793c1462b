use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use fs_err as fs;

use crate::consts::REPOSITORY_MARKERS;
use crate::process::ExecutionError;

pub mod commands;
mod local;

pub use commands::{GitCommand, GitConfig, GitInit, GitStatus};
pub use local::Git;

/// Whether `path` looks like a repository: either `<path>/.git/HEAD` or `<path>/HEAD` (bare)
/// can be read. Only the filesystem is looked at.
pub fn is_valid_repository_path(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    REPOSITORY_MARKERS.iter().any(|marker| {
        let marker = path.join(marker);
        marker.is_file() && fs::File::open(&marker).is_ok()
    })
}

/// Parses the output of `config --list`, one `key=value` per line.
/// Only the first `=` separates key and value, a line without one is a key with an empty
/// value (that's how git prints `[section] key` without a value).
pub fn parse_config_list(output: &str) -> BTreeMap<String, String> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match line.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (line.to_string(), String::new()),
        })
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("Attempt to set the repository path to an invalid Git repository (path={})", .0.display())]
    InvalidRepositoryPath(PathBuf),
    #[error("No repository path is associated with this instance")]
    MissingPath,
    #[error("{0} requires an initialized Git repository to be associated")]
    NotInitialized(&'static str),
    #[error("The Git command `{0}` does not exist")]
    UnknownCommand(String),
    #[error("`git {command_line}` failed (exit code {exit_code}): {stderr}")]
    CommandFailed {
        command_line: String,
        exit_code: i32,
        stderr: String,
    },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_working_tree_layout() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_valid_repository_path(dir.path()));

        fs::create_dir_all(dir.path().join(".git")).unwrap();
        assert!(!is_valid_repository_path(dir.path()));

        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        assert!(is_valid_repository_path(dir.path()));
    }

    #[test]
    fn detects_bare_layout() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();
        assert!(is_valid_repository_path(dir.path()));
    }

    #[test]
    fn head_directory_is_not_a_marker() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("HEAD")).unwrap();
        assert!(!is_valid_repository_path(dir.path()));
    }

    #[test]
    fn missing_directory_is_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_valid_repository_path(dir.path().join("missing")));
    }

    #[test]
    fn can_parse_config_list() {
        let config = parse_config_list("a.b=1\nc.d=2\n");
        assert_eq!(config.len(), 2);
        assert_eq!(config["a.b"], "1");
        assert_eq!(config["c.d"], "2");
    }

    #[test]
    fn config_values_keep_their_equal_signs() {
        let config = parse_config_list(
            "remote.origin.fetch=+refs/heads/*:refs/remotes/origin/*\nalias.eq=a=b=c\n",
        );
        assert_eq!(config["remote.origin.fetch"], "+refs/heads/*:refs/remotes/origin/*");
        assert_eq!(config["alias.eq"], "a=b=c");
    }

    #[test]
    fn config_keys_without_value() {
        let config = parse_config_list("core.bare=false\nsection.flag\n");
        assert_eq!(config["section.flag"], "");
        assert_eq!(config["core.bare"], "false");
    }

    #[test]
    fn empty_config_output() {
        assert!(parse_config_list("").is_empty());
        assert!(parse_config_list("\n").is_empty());
    }

    #[test]
    fn later_entries_win() {
        // git lists system, global then local config so the last one is the effective value
        let config = parse_config_list("user.name=global\nuser.name=local\n");
        assert_eq!(config["user.name"], "local");
    }
}
