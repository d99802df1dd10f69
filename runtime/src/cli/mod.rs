//! CLI subcommand implementations for the wcagscan binary.

pub mod doctor;
pub mod install_cmd;
pub mod output;
pub mod scan_cmd;
pub mod serve;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber on stderr.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to this crate
/// (`debug` with `--verbose`).
pub fn init_tracing(default_level: &str, verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { default_level };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,wcagscan={level}")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
