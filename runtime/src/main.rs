// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use wcagscan_runtime::cli::{self, output};
use wcagscan_runtime::cli::scan_cmd::{PathArg, ScanArgs, SortArg};
use wcagscan_runtime::engine::types::Impact;

#[derive(Parser)]
#[command(
    name = "wcagscan",
    about = "wcagscan — WCAG 2.2 AA accessibility scanner",
    version,
    after_help = "Run 'wcagscan <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server-mediated scan path (HTTP API)
    Serve {
        /// Port to listen on (default 3001 or WCAGSCAN_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Scan a URL for WCAG 2.2 AA violations
    Scan {
        /// Absolute http(s) URL to scan
        url: String,
        /// Which scan path to use
        #[arg(long, value_enum, default_value_t = PathArg::Auto)]
        path: PathArg,
        /// Scan server base URL (default http://localhost:3001 or WCAGSCAN_SERVER_URL)
        #[arg(long)]
        server: Option<String>,
        /// Only list violations of this impact (critical, serious, moderate, minor)
        #[arg(long)]
        impact: Option<Impact>,
        /// Listing order
        #[arg(long, value_enum, default_value_t = SortArg::Priority)]
        sort: SortArg,
        /// Save the JSON report to this file (or directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Download axe-core
    Install {
        /// Force reinstall even if axe-core is already installed
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var(output::JSON_ENV, "1");
    }
    if cli.quiet {
        std::env::set_var(output::QUIET_ENV, "1");
    }
    if cli.verbose {
        std::env::set_var(output::VERBOSE_ENV, "1");
    }
    if cli.no_color {
        std::env::set_var(output::NO_COLOR_ENV, "1");
    }

    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    cli::init_tracing(default_level, cli.verbose, cli.log_json);

    let result = match cli.command {
        Commands::Serve { port } => cli::serve::run(port).await,
        Commands::Scan {
            url,
            path,
            server,
            impact,
            sort,
            output,
        } => {
            cli::scan_cmd::run(ScanArgs {
                url,
                path,
                server,
                impact,
                sort,
                output,
            })
            .await
        }
        Commands::Doctor => cli::doctor::run().await,
        Commands::Install { force } => cli::install_cmd::run(force).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "wcagscan", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if output::is_json() {
            output::print_json(&output::error_json(e));
        } else if !output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}
