// ── Device façade ──
//
// One `DeviceClient` per switch: owns the protocol client (and so the
// session) plus the last known port table. Every operation is bounded by
// the device timeout. The plain methods fold failures into `false` with a
// log line; the `try_` twins return the error.

use std::future::Future;
use std::time::Duration;

use poectl_api::{
    DeviceTransport, Endpoint, PortRecord, SwitchClient, Transport, TransportConfig,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_MIN_REFRESH_INTERVAL, DEFAULT_TIMEOUT, DeviceConfig};
use crate::error::CoreError;
use crate::store::PortTable;

/// What a scheduled [`DeviceClient::update`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The port table was refreshed.
    Refreshed,
    /// A refresh was attempted and failed; the old table is kept.
    Failed,
    /// Too soon since the last attempt; nothing was sent.
    Throttled,
}

/// High-level handle to one switch.
pub struct DeviceClient<T: Transport = DeviceTransport> {
    name: String,
    client: SwitchClient<T>,
    ports: PortTable,
    timeout: Duration,
    min_refresh_interval: Duration,
    last_attempt: Option<Instant>,
}

impl DeviceClient<DeviceTransport> {
    /// Build the transport and protocol client described by `config`.
    pub fn new(config: DeviceConfig) -> Result<Self, CoreError> {
        let endpoint = Endpoint::parse(&config.host)?;
        let transport = TransportConfig {
            timeout: config.timeout,
            repair_headers: config.repair_headers,
        };
        let client = SwitchClient::new(endpoint, config.credentials, config.variant, &transport)?
            .with_settle_delay(config.settle_delay)
            .with_login_attempts(config.login_attempts);

        debug!(
            device = %config.name,
            host = %config.host,
            variant = %config.variant,
            repair_headers = config.repair_headers,
            "device client created"
        );

        Ok(Self::with_switch_client(config.name, client)
            .with_timeout(config.timeout)
            .with_min_refresh_interval(config.min_refresh_interval))
    }
}

impl<T: Transport> DeviceClient<T> {
    /// Wrap an existing protocol client with default timing.
    pub fn with_switch_client(name: impl Into<String>, client: SwitchClient<T>) -> Self {
        Self {
            name: name.into(),
            client,
            ports: PortTable::new(),
            timeout: DEFAULT_TIMEOUT,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            last_attempt: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        self.client.endpoint().host()
    }

    /// Last known state of every port seen so far.
    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    pub fn port(&self, port: &str) -> Option<&PortRecord> {
        self.ports.get(port)
    }

    // ── Fallible operations ──────────────────────────────────────────

    /// Log in if needed and scrape the port table. Returns the number of
    /// rows read. On failure the previous table is left as it was.
    ///
    /// A status page without the port table means the switch dropped the
    /// session; the client logs in from scratch and scrapes once more.
    pub async fn try_refresh(&mut self) -> Result<usize, CoreError> {
        let name = self.name.as_str();
        let client = &mut self.client;
        let records = bounded(self.timeout, async move {
            client.login().await?;
            match client.fetch_ports().await {
                Err(e) if !client.session().is_valid() => {
                    warn!(device = %name, error = %e, "session dropped by switch, logging in again");
                    client.clear_session();
                    client.login().await?;
                    client.fetch_ports().await
                }
                result => result,
            }
        })
        .await?;

        let count = records.len();
        self.ports.apply_snapshot(records);
        debug!(device = %self.name, ports = count, "port table refreshed");
        Ok(count)
    }

    /// Switch PoE power for `port`, re-authenticating once if the switch
    /// rejects the command.
    pub async fn try_set_port_state(&mut self, port: &str, on: bool) -> Result<(), CoreError> {
        let client = &mut self.client;
        let accepted = bounded(self.timeout, client.set_port_state(port, on)).await?;
        if !accepted {
            return Err(CoreError::CommandRejected {
                port: port.to_owned(),
            });
        }

        if !self.ports.mark_powered(port, on) {
            debug!(device = %self.name, port, "port not in table yet, nothing to mark");
        }
        info!(device = %self.name, port, on, "port power changed");
        Ok(())
    }

    // ── Infallible façade ────────────────────────────────────────────

    /// [`try_refresh`](Self::try_refresh), reporting success as a bool.
    pub async fn refresh(&mut self) -> bool {
        match self.try_refresh().await {
            Ok(_) => true,
            Err(e) => {
                warn!(device = %self.name, error = %e, "refresh failed");
                false
            }
        }
    }

    /// [`try_set_port_state`](Self::try_set_port_state), reporting success
    /// as a bool.
    pub async fn set_port_state(&mut self, port: &str, on: bool) -> bool {
        match self.try_set_port_state(port, on).await {
            Ok(()) => true,
            Err(e) => {
                warn!(device = %self.name, port, on, error = %e, "port command failed");
                false
            }
        }
    }

    /// Refresh unless the last attempt was less than the minimum refresh
    /// interval ago. Failed attempts count toward the interval.
    pub async fn update(&mut self) -> UpdateOutcome {
        let now = Instant::now();
        let too_soon = self
            .last_attempt
            .is_some_and(|last| now.duration_since(last) < self.min_refresh_interval);
        if too_soon {
            return UpdateOutcome::Throttled;
        }

        self.last_attempt = Some(now);
        if self.refresh().await {
            UpdateOutcome::Refreshed
        } else {
            UpdateOutcome::Failed
        }
    }
}

/// Run `fut` under `timeout`, mapping both the elapsed case and the
/// protocol error into [`CoreError`]. A transport that gives up first
/// reports the same bound.
async fn bounded<F, R>(timeout: Duration, fut: F) -> Result<R, CoreError>
where
    F: Future<Output = Result<R, poectl_api::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if !e.is_timeout() => Err(e.into()),
        Ok(Err(_)) | Err(_) => Err(CoreError::Timeout {
            timeout_secs: timeout.as_secs(),
        }),
    }
}
