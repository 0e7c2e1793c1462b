use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use serde_json::json;

use cast::cli::{OutputFormat, install_cancellation_handler, load_options, write_err};
use cast::consts::OPTIONS_FILENAME;
use cast::{Cancellation, Executor, Git, ProcessRunner, is_valid_repository_path};

/// cast, drive git from the command line the way the library does
#[derive(Parser)]
#[clap(version, author, about)]
pub struct Cli {
    #[command(flatten)]
    verbose: clap_verbosity_flag::Verbosity,

    /// Output in JSON format. This will also ignore the --verbose flag and not log anything.
    #[clap(long, global = true)]
    json: bool,

    /// Run as if cast was started in that directory instead of the current one
    #[clap(short = 'C', long, global = true)]
    directory: Option<PathBuf>,

    /// Binary to run instead of `git` from the $PATH
    #[clap(long, global = true)]
    git_bin: Option<PathBuf>,

    /// Path to an options file other than cast.toml in the current directory
    #[clap(short = 'c', long, default_value = OPTIONS_FILENAME, global = true)]
    options_file: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs a command line and prints its output. Exits with the exit code of the command
    Exec {
        #[clap(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Prints the configuration of the repository
    Config,
    /// Checks whether a path is a repository
    Check {
        #[clap(value_parser, default_value = ".")]
        path: PathBuf,
    },
    /// Creates a repository
    Init {
        #[clap(value_parser, default_value = ".")]
        path: PathBuf,
        /// Arguments given to `init` as is, e.g. `-- --bare`
        #[clap(last = true)]
        args: Vec<String>,
    },
}

fn try_main() -> Result<i32> {
    let cli = Cli::parse();
    let output_format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };
    env_logger::Builder::new()
        .filter_level(if output_format.is_json() {
            log::LevelFilter::Off
        } else {
            cli.verbose.log_level_filter()
        })
        .init();

    let options = load_options(&cli.options_file, cli.git_bin.as_deref())?;
    let directory = match cli.directory {
        Some(d) => d,
        None => std::env::current_dir()?,
    };

    let cancellation = Arc::new(Cancellation::default());
    install_cancellation_handler(&cancellation)?;
    let runner = ProcessRunner::with_cancellation(Arc::clone(&cancellation));

    match cli.command {
        Command::Exec { args } => {
            let command_line = shell_words::join(&args);
            let result = runner.execute(&command_line, &options, Some(directory.as_path()))?;
            if output_format.is_json() {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", result.stdout);
                eprint!("{}", result.stderr);
            }
            std::io::stdout().flush()?;
            return Ok(result.exit_code);
        }
        Command::Config => {
            let git = Git::with_executor(Some(directory.as_path()), options, runner)?;
            let Some(config) = git.config() else {
                bail!("{} is not a repository", directory.display());
            };
            if output_format.is_json() {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                for (key, value) in config {
                    println!("{key}={value}");
                }
            }
        }
        Command::Check { path } => {
            let path = directory.join(path);
            let valid = is_valid_repository_path(&path);
            if output_format.is_json() {
                println!("{}", json!({"path": path.display().to_string(), "valid": valid}));
            } else if valid {
                println!("{} is a repository", path.display());
            } else {
                println!("{} is not a repository", path.display());
            }
            if !valid {
                return Ok(1);
            }
        }
        Command::Init { path, args } => {
            let path = directory.join(path);
            let mut git = Git::with_executor(Some(path.as_path()), options, runner)?;
            let args: Vec<_> = args.iter().map(String::as_str).collect();
            git.run("init", &args)?;
            let bare = git.is_bare()?;
            let location = git.path().unwrap_or(path.as_path());
            if output_format.is_json() {
                println!(
                    "{}",
                    json!({"path": location.display().to_string(), "bare": bare})
                );
            } else {
                println!(
                    "Initialized {}repository at {}",
                    if bare { "bare " } else { "" },
                    location.display()
                );
            }
        }
    }

    Ok(0)
}

fn main() {
    match try_main() {
        Ok(code) => ::std::process::exit(code),
        Err(e) => {
            let message = match e.downcast_ref::<cast::GitError>() {
                Some(err) => write_err(err),
                None => format!("{e:?}"),
            };
            eprintln!("error: {message}");
            ::std::process::exit(1)
        }
    }
}
