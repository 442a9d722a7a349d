//! ---
//! esu_section: "01-shared-foundation"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Shared primitives and utilities for the trial harness."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};

const PREFIX_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Timestamp prefix for a run starting now, in local time.
pub fn run_prefix_now() -> String {
    run_prefix_at(&Local::now())
}

/// Filesystem-safe timestamp prefix, e.g. `2024-03-09_14-05-00`.
pub fn run_prefix_at<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(PREFIX_FORMAT).to_string()
}

/// Render a duration as `H:MM:SS.mmm`.
pub fn format_elapsed(duration: Duration) -> String {
    let total_millis = duration.as_millis();
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let seconds = (total_millis / 1_000) % 60;
    let millis = total_millis % 1_000;
    format!("{hours}:{minutes:02}:{seconds:02}.{millis:03}")
}
