//! Port command handlers.

use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use poectl_config::Config;
use poectl_core::{CoreError, DeviceClient, Fleet, PortRecord};

use crate::cli::{GlobalOpts, PortsArgs, PortsCommand};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct PortRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Port")]
    port: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Draw (W)")]
    draw: String,
    #[tabled(rename = "Max (W)")]
    max: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Schedule")]
    schedule: String,
}

/// A port record tagged with the device it came from.
#[derive(Debug, Serialize)]
pub(crate) struct PortView {
    pub device: String,
    #[serde(flatten)]
    pub record: PortRecord,
}

impl PortRow {
    fn from_view(v: &PortView, color: bool) -> Self {
        let r = &v.record;
        Self {
            device: v.device.clone(),
            port: r.port_id.clone(),
            power: output::power_label(&r.power, color),
            class: r.class.clone(),
            priority: r.priority.clone(),
            draw: format!("{:.1}", r.current_power_watts),
            max: format!("{:.1}", r.max_power_watts),
            mode: r.power_up_mode.clone(),
            schedule: format!("{} ({})", r.time_range_name, r.time_range_status),
        }
    }
}

pub(crate) fn views(device: &DeviceClient) -> Vec<PortView> {
    device
        .ports()
        .sorted()
        .into_iter()
        .map(|record| PortView {
            device: device.name().to_owned(),
            record: record.clone(),
        })
        .collect()
}

pub(crate) fn render_ports(views: &[PortView], global: &GlobalOpts) -> Result<String, CliError> {
    let color = output::should_color(&global.color_mode());
    output::render_list(
        &global.output_format(),
        views,
        |v| PortRow::from_view(v, color),
        |v| format!("{}\t{}\t{}", v.record.port_id, v.record.power, v.record.current_power_watts),
    )
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(args: PortsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, global) = config::load(global)?;
    match args.command {
        PortsCommand::List { all: true } => list_all(&global, &cfg).await,
        PortsCommand::List { all: false } => {
            let mut device = connect(&global, &cfg)?;
            device.try_refresh().await?;
            let out = render_ports(&views(&device), &global)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        PortsCommand::On { port } => switch(&global, &cfg, &port, true).await,
        PortsCommand::Off { port } => switch(&global, &cfg, &port, false).await,
    }
}

/// Build the client for the selected device.
fn connect(global: &GlobalOpts, cfg: &Config) -> Result<DeviceClient, CliError> {
    let entry = config::select_device(global, cfg)?;
    let dc = config::device_config(global, cfg, entry)?;
    Ok(DeviceClient::new(dc)?)
}

async fn list_all(global: &GlobalOpts, cfg: &Config) -> Result<(), CliError> {
    if cfg.devices.is_empty() {
        return Err(CliError::NoConfig {
            path: config::effective_path(global).display().to_string(),
        });
    }
    let configs = cfg
        .devices
        .iter()
        .map(|entry| config::device_config(global, cfg, entry))
        .collect::<Result<Vec<_>, _>>()?;
    let mut fleet = Fleet::from_configs(configs)?;

    let mut first_error: Option<CoreError> = None;
    let mut ok = 0_usize;
    for (name, result) in fleet.refresh_all().await {
        match result {
            Ok(_) => ok += 1,
            Err(e) => {
                warn!(device = %name, error = %e, "refresh failed");
                first_error.get_or_insert(e);
            }
        }
    }
    if ok == 0 {
        if let Some(e) = first_error {
            return Err(e.into());
        }
    }

    let all: Vec<PortView> = fleet.iter().flat_map(views).collect();
    let out = render_ports(&all, global)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn switch(global: &GlobalOpts, cfg: &Config, port: &str, on: bool) -> Result<(), CliError> {
    if port.trim().is_empty() {
        return Err(CliError::Validation {
            field: "port".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut device = connect(global, cfg)?;
    device.try_set_port_state(port, on).await?;

    let state = if on { "on" } else { "off" };
    output::print_output(
        &format!("{}: port {port} powered {state}", device.name()),
        global.quiet,
    );
    Ok(())
}
