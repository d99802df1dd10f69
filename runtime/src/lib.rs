// Copyright 2026 wcagscan Contributors
// SPDX-License-Identifier: Apache-2.0

//! wcagscan runtime — WCAG 2.2 AA accessibility scan orchestration.
//!
//! Renders a page in an isolated context, runs axe-core against it, and
//! turns the output into a prioritized report or a classified error. Scans
//! go either through an out-of-process Chromium (the server-mediated path)
//! or through a same-origin frame container (the local path).

pub mod classify;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod renderer;
pub mod report;
pub mod rest;
pub mod scanner;
pub mod selector;

pub use classify::{classify, ErrorKind, ScanError};
pub use report::{ScanReport, Violation};
pub use scanner::{cancel_pair, CancelHandle, CancelToken, Scanner};
