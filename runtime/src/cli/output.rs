//! Terminal output helpers shared by the CLI commands.
//!
//! Global flags are passed through environment variables set once in
//! `main`, so every command can check them without threading arguments.

use crate::classify::ScanError;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

pub const JSON_ENV: &str = "WCAGSCAN_JSON";
pub const QUIET_ENV: &str = "WCAGSCAN_QUIET";
pub const VERBOSE_ENV: &str = "WCAGSCAN_VERBOSE";
pub const NO_COLOR_ENV: &str = "WCAGSCAN_NO_COLOR";

fn flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

pub fn is_json() -> bool {
    flag(JSON_ENV)
}

pub fn is_quiet() -> bool {
    flag(QUIET_ENV)
}

pub fn is_verbose() -> bool {
    flag(VERBOSE_ENV)
}

/// Print a JSON value to stdout, pretty-printed.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

/// JSON shape of a failed command. A classified scan failure keeps its kind,
/// status and guidance.
pub fn error_json(e: &anyhow::Error) -> serde_json::Value {
    let fallback = || {
        serde_json::json!({
            "error": true,
            "message": format!("{e:#}"),
        })
    };
    match e.downcast_ref::<ScanError>().map(serde_json::to_value) {
        Some(Ok(mut value)) => {
            value["error"] = serde_json::Value::Bool(true);
            value
        }
        _ => fallback(),
    }
}

/// ANSI styling that switches off for `--no-color`, `NO_COLOR` or a
/// non-terminal stderr.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        let color = !flag(NO_COLOR_ENV)
            && std::env::var_os("NO_COLOR").is_none()
            && std::io::stderr().is_terminal();
        Self { color }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    pub fn ok_sym(&self) -> String {
        self.paint("32", "\u{2713}")
    }

    pub fn warn_sym(&self) -> String {
        self.paint("33", "!")
    }

    pub fn fail_sym(&self) -> String {
        self.paint("31", "\u{2717}")
    }

    pub fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }

    pub fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    pub fn red(&self, text: &str) -> String {
        self.paint("31", text)
    }

    pub fn yellow(&self, text: &str) -> String {
        self.paint("33", text)
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

/// Spinner on stderr, hidden in quiet/JSON mode.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    if is_quiet() || is_json() || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner} {msg} {elapsed:.dim}") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
