//! `capped` fetches many URLs at once without ever having more than a fixed
//! number of connections open.
//!
//! The capped binary is a wrapper around capped-lib, which provides the
//! connection-limited client.
//!
//! Fetch a page thirty times, at most fifteen connections at a time:
//! ```sh
//! capped --max-concurrency 15 $(yes https://example.com | head -n 30)
//! ```
//!
//! Report as JSON, including the peak number of open connections:
//! ```sh
//! capped --format json https://example.com https://example.org
//! ```
//!
//! Remove the limit altogether:
//! ```sh
//! capped -c 0 https://example.com https://example.org
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    rustdoc::invalid_html_tags,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    variant_size_differences,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]
#![deny(missing_docs)]

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Error, Result, bail};
use clap::Parser;
use log::{error, warn};

mod client;
mod commands;
mod formatters;
mod options;
mod stats;
mod verbosity;

use crate::formatters::{get_stats_formatter, log::init_logging};
use crate::options::{CAPPED_CONFIG_FILE, CappedOptions, Config};

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator.
    #[allow(unused)]
    UnexpectedFailure = 1,
    FetchFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file and command-line arguments
fn load_config() -> Result<CappedOptions> {
    let mut opts = CappedOptions::parse();

    init_logging(&opts.config.verbose);

    // An explicitly given config file has to exist, the default one is optional
    let config_file = match &opts.config_file {
        Some(config_file) => Some(config_file.clone()),
        None => Some(PathBuf::from(CAPPED_CONFIG_FILE)).filter(|path| path.is_file()),
    };

    if let Some(config_file) = config_file {
        match Config::load_from_file(&config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    }

    Ok(opts)
}

/// Set up runtime and call capped entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            error!("Error while loading config: {e}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;

    match runtime.block_on(run(&opts)) {
        Err(e) if Some(io::ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Fetch all URLs and print the report
async fn run(opts: &CappedOptions) -> Result<i32> {
    let client = client::create(&opts.config)?;

    // On Ctrl-C, requests still waiting for a connection are cancelled while
    // open ones finish, so the report is still printed
    let interrupt = {
        let client = client.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling requests that are still waiting");
                client.shutdown();
            }
        })
    };

    let stats = commands::fetch(&client, &opts.urls).await;
    interrupt.abort();

    let formatter = get_stats_formatter(&opts.config.format);
    writeln!(io::stdout(), "{}", formatter.format(&stats)?)?;

    let exit_code = if stats.is_success() {
        ExitCode::Success
    } else {
        ExitCode::FetchFailure
    };
    Ok(exit_code as i32)
}
