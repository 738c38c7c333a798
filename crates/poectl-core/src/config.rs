// ── Runtime device configuration ──
//
// Describes how to reach and drive one switch. Carries credentials and
// tuning but never touches disk; the CLI builds a `DeviceConfig` from the
// config file and hands it in.

use std::time::Duration;

use poectl_api::{Credentials, DEFAULT_LOGIN_ATTEMPTS, DEFAULT_SETTLE_DELAY, ProtocolVariant};

/// Default bound on a single refresh or command, handshake included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default minimum spacing between scheduled refreshes.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for one switch.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Display name; defaults to the host.
    pub name: String,
    /// Host, `host:port`, or `http://host:port`.
    pub host: String,
    pub credentials: Credentials,
    pub variant: ProtocolVariant,
    /// Bound on each whole operation.
    pub timeout: Duration,
    /// Pause between login submission and login check.
    pub settle_delay: Duration,
    /// Full handshake attempts before giving up.
    pub login_attempts: u32,
    /// `update()` skips the refresh if the last one is newer than this.
    pub min_refresh_interval: Duration,
    /// Use the header-repairing raw transport.
    pub repair_headers: bool,
}

impl DeviceConfig {
    /// Config with defaults for everything but the address and login.
    pub fn new(host: impl Into<String>, credentials: Credentials, variant: ProtocolVariant) -> Self {
        let host = host.into();
        Self {
            name: host.clone(),
            host,
            credentials,
            variant,
            timeout: DEFAULT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            login_attempts: DEFAULT_LOGIN_ATTEMPTS,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            repair_headers: variant.needs_header_repair(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
