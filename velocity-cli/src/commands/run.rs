//! `run` command

use anyhow::{Context, Result};
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use velocity_config::domains::VelocityConfig;
use velocity_core::{AggregateResult, Geolocation, MeasurementMethod, PhaseKind, SpeedtestError};
use velocity_engine::{FixedGeolocator, PipelineEvent, SpeedTest};
use velocity_gauge::TerminalSink;

use crate::cli::RunArgs;

/// Bar width of the terminal gauge, in cells
const GAUGE_WIDTH: usize = 40;

/// Fold the command line options into the loaded configuration
pub fn apply_run_overrides(config: &mut VelocityConfig, args: &RunArgs) {
    if let Some(catalog) = &args.catalog {
        config.locator.catalog = Some(catalog.clone());
    }
    if let Some(theme) = args.theme {
        config.gauge.theme = theme;
    }
}

/// Location given with `--location`
pub fn manual_location(lat: f64, lon: f64) -> Geolocation {
    Geolocation {
        lat,
        lon,
        city: "Manual location".to_string(),
        country: format!("{:.4}, {:.4}", lat, lon),
        isp: None,
    }
}

/// Run one speed test and print the result
pub async fn run_command(mut config: VelocityConfig, args: &RunArgs) -> Result<()> {
    apply_run_overrides(&mut config, args);
    let zones = config.gauge.zones;

    let mut builder = SpeedTest::builder(config);
    if let Some((lat, lon)) = args.location {
        builder = builder.geolocator(Arc::new(FixedGeolocator(manual_location(lat, lon))));
    }
    let test = Arc::new(builder.build().context("Failed to set up the speed test")?);

    if args.wait {
        let limiter = Arc::clone(test.limiter());
        let waited = tokio::select! {
            result = limiter.wait_until_allowed(|countdown| {
                eprint!("\r\x1b[2KRate limited, next run in {}", countdown);
                let _ = std::io::stderr().flush();
            }) => Some(result),
            _ = signal::ctrl_c() => None,
        };
        eprint!("\r\x1b[2K");
        match waited {
            Some(result) => result.context("Failed to read the test history")?,
            None => {
                println!("Cancelled");
                return Ok(());
            }
        }
    }

    let sink = if args.no_gauge || args.json {
        None
    } else {
        let sink = Arc::new(TerminalSink::new(GAUGE_WIDTH, zones));
        test.gauge().set_sink(sink.clone());
        Some(sink)
    };

    let progress = if sink.is_none() && !args.json {
        Some(tokio::spawn(print_progress(test.subscribe())))
    } else {
        None
    };

    let interrupt = {
        let test = Arc::clone(&test);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping the speed test");
                test.stop();
            }
        })
    };

    let outcome = test.run().await;

    interrupt.abort();
    if let Some(progress) = progress {
        progress.abort();
    }
    if let Some(sink) = &sink {
        if let Err(e) = sink.finish() {
            debug!("Failed to finish the gauge line: {}", e);
        }
    }

    match outcome {
        Ok(result) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&result).context("Failed to serialize result")?
                );
            } else {
                print_summary(&result);
            }
            Ok(())
        }
        Err(SpeedtestError::RateLimited { retry_at }) => Err(anyhow::anyhow!(
            "Too many speed tests, next run allowed in {}. Use --wait to wait for it.",
            test.limiter().countdown(retry_at.timestamp_millis())
        )),
        Err(SpeedtestError::Cancelled) => {
            println!("Cancelled");
            Ok(())
        }
        Err(e) => Err(e).context("Speed test failed"),
    }
}

async fn print_progress(mut events: tokio::sync::broadcast::Receiver<PipelineEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = progress_line(&event) {
                    eprintln!("{}", line);
                }
            }
            Err(RecvError::Lagged(skipped)) => debug!("Progress output skipped {} events", skipped),
            Err(RecvError::Closed) => break,
        }
    }
}

/// Plain-text progress for a pipeline event, if it is worth a line
pub fn progress_line(event: &PipelineEvent) -> Option<String> {
    match event {
        PipelineEvent::StateChanged { to, .. } => Some(format!("{}...", to)),
        PipelineEvent::Sample(sample) if !sample.success => {
            Some(format!("  {} probe lost", sample.phase))
        }
        PipelineEvent::Sample(sample) => {
            let unit = match sample.phase {
                PhaseKind::Ping => "ms",
                _ => "Mbps",
            };
            let mut line = format!("  {} {:.2} {}", sample.phase, sample.derived_value, unit);
            if sample.source.method() != MeasurementMethod::Measured {
                line.push_str(&format!(" ({})", sample.source.method()));
            }
            Some(line)
        }
        PipelineEvent::Failed { message } => Some(format!("Failed: {}", message)),
        PipelineEvent::Progress { .. } | PipelineEvent::Completed(_) => None,
    }
}

fn print_summary(result: &AggregateResult) {
    println!();
    println!("{:<12} {} Mbps", "Download:", format!("{:.2}", result.download_mbps).bold());
    println!("{:<12} {} Mbps", "Upload:", format!("{:.2}", result.upload_mbps).bold());

    let jitter = result
        .jitter_ms
        .map(|jitter| format!(" (jitter {:.1} ms)", jitter))
        .unwrap_or_default();
    println!("{:<12} {:.1} ms{}", "Ping:", result.ping_ms, jitter);

    let loss = format!("{:.1}%", result.packet_loss_percent);
    let loss = if result.packet_loss_percent > 0.0 {
        loss.yellow()
    } else {
        loss.normal()
    };
    println!("{:<12} {}", "Packet loss:", loss);

    println!(
        "{:<12} {} ({:.0} km)",
        "Server:", result.server_label, result.server_distance_km
    );
    println!("{:<12} {}", "Location:", result.location);
    if let Some(isp) = &result.isp {
        println!("{:<12} {}", "Provider:", isp);
    }

    match result.method {
        MeasurementMethod::Measured => println!("{:<12} {}", "Method:", result.method),
        _ => println!(
            "{:<12} {}",
            "Method:",
            format!("{} (some probes did not reach the server)", result.method).yellow()
        ),
    }
}
