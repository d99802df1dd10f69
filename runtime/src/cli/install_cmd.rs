//! `wcagscan install` — download axe-core into the local cache.

use crate::cli::output::{self, Styled};
use crate::config::ScanConfig;
use crate::engine::axe;
use anyhow::Result;
use serde_json::json;

/// Download axe-core into `~/.wcagscan/axe.min.js` unless already present.
pub async fn run(force: bool) -> Result<()> {
    let s = Styled::new();
    let config = ScanConfig::from_env();
    let dest = ScanConfig::axe_cache_path();

    if dest.exists() && !force {
        if output::is_json() {
            output::print_json(&json!({
                "installed": false,
                "path": dest.display().to_string(),
                "reason": "already installed",
            }));
        } else if !output::is_quiet() {
            println!(
                "  {} axe-core already installed at {} (use --force to reinstall)",
                s.ok_sym(),
                dest.display()
            );
        }
        return Ok(());
    }

    let pb = output::spinner(format!("Downloading {}", config.axe_url));
    let result = axe::download(&config.axe_url, &dest).await;
    pb.finish_and_clear();
    let bytes = result?;

    if output::is_json() {
        output::print_json(&json!({
            "installed": true,
            "path": dest.display().to_string(),
            "source": config.axe_url,
            "bytes": bytes,
        }));
    } else if !output::is_quiet() {
        println!(
            "  {} axe-core installed at {} ({} KB)",
            s.ok_sym(),
            dest.display(),
            bytes / 1024
        );
    }
    Ok(())
}
