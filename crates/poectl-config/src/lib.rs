//! Configuration for poectl.
//!
//! A TOML file listing switches, merged with `POECTL_`-prefixed environment
//! variables, plus password resolution (env var, plaintext, keyring) and
//! translation to `poectl_core::DeviceConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use poectl_core::{Credentials, DeviceConfig, ProtocolVariant};

const KEYRING_SERVICE: &str = "poectl";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for device '{device}'")]
    NoCredentials { device: String },

    #[error("no device named '{name}' in config")]
    UnknownDevice { name: String },

    #[error("no devices configured")]
    NoDevices,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Device used when `--device` is not given.
    pub default_device: Option<String>,

    /// Seconds between refreshes in `watch`, and the minimum spacing of
    /// scheduled updates.
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Bound on each operation, handshake included.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Pause between login submission and login check.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_device: None,
            scan_interval_secs: default_scan_interval(),
            timeout_secs: default_timeout(),
            settle_delay_ms: default_settle_delay(),
            defaults: Defaults::default(),
            devices: Vec::new(),
        }
    }
}

/// CLI presentation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_scan_interval() -> u64 {
    60
}
fn default_timeout() -> u64 {
    10
}
fn default_settle_delay() -> u64 {
    1000
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Display name; defaults to the host.
    pub name: Option<String>,

    /// Host, `host:port`, or `http://host:port`.
    pub host: String,

    pub username: String,

    /// Password in plaintext (prefer `password_env` or the keyring).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Firmware family: `form-login` (default) or `query-login`.
    #[serde(default)]
    pub variant: ProtocolVariant,

    /// Force the header-repairing transport on or off. Defaults to on for
    /// query-login firmware.
    pub repair_headers: Option<bool>,

    /// Per-device override of `timeout_secs`.
    pub timeout_secs: Option<u64>,
}

impl DeviceEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.host)
    }
}

impl Config {
    /// Find a device by name (or host, for unnamed entries).
    pub fn device(&self, name: &str) -> Result<&DeviceEntry, ConfigError> {
        self.devices
            .iter()
            .find(|d| d.display_name() == name)
            .ok_or_else(|| ConfigError::UnknownDevice { name: name.into() })
    }

    /// The device to use when none was named: `default_device`, or the
    /// only configured device.
    pub fn default_device(&self) -> Result<&DeviceEntry, ConfigError> {
        if let Some(ref name) = self.default_device {
            return self.device(name);
        }
        match self.devices.as_slice() {
            [] => Err(ConfigError::NoDevices),
            [only] => Ok(only),
            _ => Err(ConfigError::Validation {
                field: "default_device".into(),
                reason: "several devices configured; pass --device or set default_device".into(),
            }),
        }
    }

    /// Copy of this config safe to print: plaintext passwords replaced.
    pub fn redacted(&self) -> Self {
        let mut cfg = self.clone();
        for device in &mut cfg.devices {
            if device.password.is_some() {
                device.password = Some("********".into());
            }
        }
        cfg
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "poectl", "poectl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("poectl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the platform path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` + environment. A missing file yields the
/// defaults with no devices.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("POECTL_").split("__"))
        .extract()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.scan_interval_secs == 0 {
        return Err(ConfigError::Validation {
            field: "scan_interval_secs".into(),
            reason: "must be at least 1".into(),
        });
    }
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            field: "timeout_secs".into(),
            reason: "must be at least 1".into(),
        });
    }
    for (i, device) in config.devices.iter().enumerate() {
        if device.host.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: format!("devices[{i}].host"),
                reason: "must not be empty".into(),
            });
        }
        if device.username.is_empty() {
            return Err(ConfigError::Validation {
                field: format!("devices[{i}].username"),
                reason: "must not be empty".into(),
            });
        }
        let name = device.display_name();
        if config.devices[..i].iter().any(|d| d.display_name() == name) {
            return Err(ConfigError::Validation {
                field: format!("devices[{i}].name"),
                reason: format!("duplicate device name '{name}'"),
            });
        }
    }
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a device password: `password_env`, then plaintext `password`,
/// then the system keyring entry `poectl` / `{device}/password`.
pub fn resolve_password(device: &DeviceEntry) -> Result<SecretString, ConfigError> {
    // 1. Env var named by the entry
    if let Some(ref env_name) = device.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Plaintext in config
    if let Some(ref pw) = device.password {
        return Ok(SecretString::from(pw.clone()));
    }

    // 3. System keyring
    let name = device.display_name();
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{name}/password")) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    Err(ConfigError::NoCredentials {
        device: name.into(),
    })
}

/// Build a `DeviceConfig` from an entry plus the global settings.
pub fn device_config(config: &Config, device: &DeviceEntry) -> Result<DeviceConfig, ConfigError> {
    let password = resolve_password(device)?;
    let credentials = Credentials::new(device.username.clone(), password.expose_secret());

    let mut dc = DeviceConfig::new(device.host.clone(), credentials, device.variant)
        .with_name(device.display_name());
    dc.timeout = Duration::from_secs(device.timeout_secs.unwrap_or(config.timeout_secs));
    dc.settle_delay = Duration::from_millis(config.settle_delay_ms);
    dc.min_refresh_interval = Duration::from_secs(config.scan_interval_secs);
    if let Some(repair) = device.repair_headers {
        dc.repair_headers = repair;
    }
    Ok(dc)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const TWO_DEVICES: &str = r#"
        default_device = "rack"
        scan_interval_secs = 30

        [[devices]]
        name = "rack"
        host = "192.168.1.2"
        username = "admin"
        password = "1234"

        [[devices]]
        host = "192.168.1.3"
        username = "admin"
        password = "abcd"
        variant = "query-login"
    "#;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("nope.toml")).unwrap();

        assert_eq!(cfg.scan_interval_secs, 60);
        assert_eq!(cfg.timeout_secs, 10);
        assert_eq!(cfg.settle_delay_ms, 1000);
        assert!(cfg.devices.is_empty());
        assert!(matches!(cfg.default_device(), Err(ConfigError::NoDevices)));
    }

    #[test]
    fn devices_and_variants_load() {
        let file = write_config(TWO_DEVICES);
        let cfg = load_config_from(file.path()).unwrap();

        assert_eq!(cfg.scan_interval_secs, 30);
        assert_eq!(cfg.default_device().unwrap().host, "192.168.1.2");
        let unnamed = cfg.device("192.168.1.3").unwrap();
        assert_eq!(unnamed.variant, ProtocolVariant::QueryLogin);
        assert!(matches!(
            cfg.device("attic"),
            Err(ConfigError::UnknownDevice { .. })
        ));
    }

    #[test]
    fn device_config_applies_globals_and_variant_defaults() {
        let file = write_config(TWO_DEVICES);
        let cfg = load_config_from(file.path()).unwrap();

        let dc = device_config(&cfg, cfg.device("192.168.1.3").unwrap()).unwrap();
        assert_eq!(dc.name, "192.168.1.3");
        assert_eq!(dc.variant, ProtocolVariant::QueryLogin);
        assert!(dc.repair_headers);
        assert_eq!(dc.timeout, Duration::from_secs(10));
        assert_eq!(dc.settle_delay, Duration::from_millis(1000));
        assert_eq!(dc.min_refresh_interval, Duration::from_secs(30));
        assert_eq!(dc.credentials.password.expose_secret(), "abcd");
    }

    #[test]
    fn password_env_wins_over_plaintext() {
        let path = std::env::var("PATH").unwrap();
        let entry = DeviceEntry {
            name: None,
            host: "10.0.0.2".into(),
            username: "admin".into(),
            password: Some("plain".into()),
            password_env: Some("PATH".into()),
            variant: ProtocolVariant::FormLogin,
            repair_headers: None,
            timeout_secs: None,
        };
        assert_eq!(resolve_password(&entry).unwrap().expose_secret(), path);

        let unset = DeviceEntry {
            password_env: Some("POECTL_TEST_SURELY_UNSET_VAR".into()),
            ..entry
        };
        assert_eq!(resolve_password(&unset).unwrap().expose_secret(), "plain");
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let file = write_config(
            r#"
            [[devices]]
            name = "a"
            host = "10.0.0.2"
            username = "admin"

            [[devices]]
            name = "a"
            host = "10.0.0.3"
            username = "admin"
            "#,
        );
        let err = load_config_from(file.path()).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "devices[1].name"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn redaction_hides_plaintext_passwords() {
        let file = write_config(TWO_DEVICES);
        let cfg = load_config_from(file.path()).unwrap();
        let shown = cfg.redacted().to_toml().unwrap();

        assert!(!shown.contains("1234"));
        assert!(!shown.contains("abcd"));
        assert!(shown.contains("********"));
    }
}
