//! `watch`: poll one switch until interrupted.

use std::time::Duration;

use chrono::Local;
use tracing::{debug, info};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::commands::ports;
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, global) = config::load(global)?;
    let entry = config::select_device(&global, &cfg)?;
    let interval_secs = args.interval.unwrap_or(cfg.scan_interval_secs);
    if interval_secs == 0 {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    let interval = Duration::from_secs(interval_secs);

    let dc = config::device_config(&global, &cfg, entry)?;
    let mut device = poectl_core::DeviceClient::new(dc)?;

    info!(device = %device.name(), interval_secs, "watching");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    // The ticker is the schedule, so every tick refreshes.
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        if device.refresh().await {
            let stamp = Local::now().format("%H:%M:%S");
            let table = ports::render_ports(&ports::views(&device), &global)?;
            output::print_output(&format!("{} @ {stamp}\n{table}", device.name()), global.quiet);
        } else {
            output::print_output(
                &format!("{}: refresh failed, showing last known state", device.name()),
                global.quiet,
            );
        }
    }
}
