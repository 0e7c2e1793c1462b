use std::time::Duration;

/// Binary used when neither the call nor the instance options name one
pub const DEFAULT_GIT_BIN: &str = "git";

/// Option key naming the binary to launch
pub const GIT_BIN_OPTION: &str = "cast.git_bin";
/// Option key naming the repository path used by [`crate::Cast`]
pub const GIT_PATH_OPTION: &str = "cast.gitPath";
/// Repository config key telling whether the repository has a working tree
pub const CORE_BARE_KEY: &str = "core.bare";

/// Default options file read by the CLI
pub const OPTIONS_FILENAME: &str = "cast.toml";

/// Files whose readability marks a directory as a repository: working tree layout first,
/// then bare layout.
pub const REPOSITORY_MARKERS: [&str; 2] = [".git/HEAD", "HEAD"];

/// Upper bound of a single read from one of the child's pipes
pub const READ_CHUNK_SIZE: usize = 1024;

/// Pause used after a poll pass that captured nothing. Doubled on every idle pass
/// up to [`MAX_IDLE_PAUSE`] and reset as soon as output shows up again.
pub const MIN_IDLE_PAUSE: Duration = Duration::from_millis(10);
pub const MAX_IDLE_PAUSE: Duration = Duration::from_millis(160);
