use std::path::Path;
use std::sync::Arc;

mod utils;

pub use utils::{OutputFormat, write_err};

use crate::{Cancellation, ExecOptions, OptionsError};

/// Options from the options file if it exists, defaults otherwise, with the binary given on
/// the command line taking precedence over both.
pub fn load_options(
    options_file: &Path,
    git_bin: Option<&Path>,
) -> Result<ExecOptions, OptionsError> {
    let mut options = if options_file.is_file() {
        log::debug!("Reading options from {}", options_file.display());
        ExecOptions::from_file(options_file)?
    } else {
        ExecOptions::default()
    };

    if let Some(git_bin) = git_bin {
        options.git_bin = Some(git_bin.to_path_buf());
    }

    Ok(options)
}

/// First Ctrl+C lets the running command finish, the second one kills it.
pub fn install_cancellation_handler(cancellation: &Arc<Cancellation>) -> Result<(), ctrlc::Error> {
    let cancellation = Arc::clone(cancellation);
    ctrlc::set_handler(move || {
        cancellation.cancel();
        if cancellation.is_soft_cancellation() {
            eprintln!("Waiting for the current command to finish... Press Ctrl+C again to kill it.");
        }
    })
}
