//! CLI-side configuration glue: `GlobalOpts`-aware loading and device
//! selection on top of `poectl-config`.

use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use poectl_config::{Config, DeviceEntry};
use poectl_core::DeviceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Config file in effect: `--config` or the platform default.
pub fn effective_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(poectl_config::config_path)
}

/// Load the config and fill `--output` / `--color` from its `[defaults]`
/// where the command line left them unset.
pub fn load(global: &GlobalOpts) -> Result<(Config, GlobalOpts), CliError> {
    let path = effective_path(global);
    tracing::debug!(path = %path.display(), "loading config");
    let cfg = poectl_config::load_config_from(&path)?;
    let global = apply_defaults(global, &cfg)?;
    Ok((cfg, global))
}

pub fn apply_defaults(global: &GlobalOpts, cfg: &Config) -> Result<GlobalOpts, CliError> {
    let mut global = global.clone();
    if global.output.is_none() {
        global.output = Some(parse_default("defaults.output", &cfg.defaults.output)?);
    }
    if global.color.is_none() {
        global.color = Some(parse_default("defaults.color", &cfg.defaults.color)?);
    }
    Ok(global)
}

fn parse_default<E: ValueEnum>(field: &str, value: &str) -> Result<E, CliError> {
    E::from_str(value, true).map_err(|reason| CliError::Validation {
        field: field.into(),
        reason,
    })
}

/// The entry named by `--device`, or the default device.
pub fn select_device<'a>(global: &GlobalOpts, cfg: &'a Config) -> Result<&'a DeviceEntry, CliError> {
    let entry = match global.device {
        Some(ref name) => cfg.device(name),
        None => cfg.default_device(),
    };
    entry.map_err(|e| match e {
        poectl_config::ConfigError::NoDevices => CliError::NoConfig {
            path: effective_path(global).display().to_string(),
        },
        other => other.into(),
    })
}

/// Build a `DeviceConfig`, applying CLI overrides.
pub fn device_config(
    global: &GlobalOpts,
    cfg: &Config,
    entry: &DeviceEntry,
) -> Result<DeviceConfig, CliError> {
    let mut dc = poectl_config::device_config(cfg, entry)?;
    if let Some(secs) = global.timeout {
        if secs == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        dc.timeout = Duration::from_secs(secs);
    }
    Ok(dc)
}
