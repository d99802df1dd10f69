//! Environment readiness check.

use crate::cli::output::{self, Styled};
use crate::config::ScanConfig;
use crate::engine::axe::resolve_script_path;
use crate::renderer::chromium::find_chromium;
use crate::selector::client::ServerClient;
use anyhow::Result;
use serde_json::json;
use std::time::Duration;

/// Check Chromium, axe-core and the scan server.
pub async fn run() -> Result<()> {
    let s = Styled::new();
    let config = ScanConfig::from_env();

    let chromium = find_chromium(config.chromium_path.as_deref());
    let axe = resolve_script_path(&config);
    let server_up = match ServerClient::new(&config.server_url, Duration::from_secs(5)) {
        Ok(client) => client.health().await.unwrap_or(false),
        Err(_) => false,
    };
    let ready = chromium.is_some() && axe.is_some();

    if output::is_json() {
        output::print_json(&json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium.as_ref().map(|p| p.display().to_string()),
            "axe_core": axe.as_ref().map(|p| p.display().to_string()),
            "server_url": config.server_url,
            "server_available": server_up,
            "local_origin": config.local_origin,
            "max_concurrent": config.max_concurrent,
            "ready": ready,
        }));
        return Ok(());
    }

    println!("{}", s.bold("wcagscan doctor"));
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("{} Chromium found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} Chromium NOT found. Install Chrome/Chromium or set WCAGSCAN_CHROMIUM_PATH.",
            s.fail_sym()
        ),
    }
    match &axe {
        Some(path) => println!("{} axe-core found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} axe-core NOT found. Run `wcagscan install` or set WCAGSCAN_AXE_PATH.",
            s.fail_sym()
        ),
    }
    if server_up {
        println!("{} Scan server reachable at {}", s.ok_sym(), config.server_url);
    } else {
        println!(
            "{} Scan server not reachable at {} (scans will use the local path)",
            s.warn_sym(),
            config.server_url
        );
    }

    println!();
    println!(
        "Limits: {} concurrent scans, navigation timeout {}s (local {}s), engine timeout {}s",
        config.max_concurrent,
        config.server_profile.navigation_timeout.as_secs(),
        config.local_profile.navigation_timeout.as_secs(),
        config.engine_timeout.as_secs()
    );
    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
