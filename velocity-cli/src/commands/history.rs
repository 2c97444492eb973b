//! `history` command

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use velocity_config::domains::VelocityConfig;
use velocity_core::SystemClock;
use velocity_limiter::{Gate, GateStatus, HistoryStore, JsonFileHistoryStore, LimiterStatus, RateLimiter};

/// Show the rate limiter's view of recent runs, or forget them
pub fn history_command(config: &VelocityConfig, clear: bool) -> Result<()> {
    let store = JsonFileHistoryStore::from_config_path(config.rate_limit.history_path.as_deref())
        .context("Failed to locate the test history")?;

    if clear {
        store.clear().context("Failed to clear the test history")?;
        println!("✅ Cleared test history at {:?}", store.path());
        return Ok(());
    }

    let path = store.path().to_path_buf();
    let limiter = RateLimiter::new(config.rate_limit.clone(), Arc::new(store), Arc::new(SystemClock));
    let status = limiter.status().context("Failed to read the test history")?;

    println!("History file: {:?}", path);
    if !config.rate_limit.enabled {
        println!("Rate limiting: {}", "disabled".yellow());
    }
    for line in status_lines(&status, &limiter) {
        println!("{}", line);
    }
    Ok(())
}

fn status_lines(status: &LimiterStatus, limiter: &RateLimiter) -> Vec<String> {
    let mut lines = vec![format!(
        "Runs in the last {}: {}/{}",
        format_window(status.window),
        status.runs_in_window,
        status.max_runs
    )];

    if let Some(last_run) = status.last_run.and_then(DateTime::<Utc>::from_timestamp_millis) {
        lines.push(format!(
            "Last run: {}",
            last_run.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ));
    }

    lines.push(match status.gate {
        GateStatus::Allowed => format!("Next run: {}", "allowed now".green()),
        GateStatus::Blocked { gate, retry_at } => {
            let reason = match gate {
                Gate::Quota => "quota reached",
                Gate::Cooldown => "cooling down",
            };
            format!(
                "Next run: {} ({}, wait {})",
                "blocked".red(),
                reason,
                limiter.countdown(retry_at)
            )
        }
    });
    lines
}

/// Largest whole unit that divides the window: `1h`, `90m`, `45s`
pub fn format_window(window: Duration) -> String {
    let seconds = window.as_secs();
    if seconds > 0 && seconds % 3600 == 0 {
        format!("{}h", seconds / 3600)
    } else if seconds > 0 && seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{}s", seconds)
    }
}
