// ── Multi-switch fleet ──
//
// Several independent devices, each with its own session and transport.
// Refreshes run concurrently; nothing is shared between devices.

use futures_util::future::join_all;
use tracing::debug;

use crate::config::DeviceConfig;
use crate::device::DeviceClient;
use crate::error::CoreError;

/// A named collection of [`DeviceClient`]s.
#[derive(Default)]
pub struct Fleet {
    devices: Vec<DeviceClient>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client for every config. Fails on the first bad config or
    /// a repeated name.
    pub fn from_configs(configs: impl IntoIterator<Item = DeviceConfig>) -> Result<Self, CoreError> {
        let mut fleet = Self::new();
        for config in configs {
            fleet.insert(DeviceClient::new(config)?)?;
        }
        Ok(fleet)
    }

    pub fn insert(&mut self, device: DeviceClient) -> Result<(), CoreError> {
        if self.get(device.name()).is_some() {
            return Err(CoreError::Config {
                message: format!("duplicate device name: {}", device.name()),
            });
        }
        self.devices.push(device);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(DeviceClient::name)
    }

    pub fn get(&self, name: &str) -> Option<&DeviceClient> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DeviceClient> {
        self.devices.iter_mut().find(|d| d.name() == name)
    }

    /// Like [`get_mut`](Self::get_mut) but with a not-found error.
    pub fn device(&mut self, name: &str) -> Result<&mut DeviceClient, CoreError> {
        self.get_mut(name).ok_or_else(|| CoreError::DeviceNotFound {
            name: name.to_owned(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceClient> {
        self.devices.iter()
    }

    /// Refresh every device at once. Results are in insertion order.
    pub async fn refresh_all(&mut self) -> Vec<(String, Result<usize, CoreError>)> {
        let results = join_all(self.devices.iter_mut().map(|d| async move {
            let result = d.try_refresh().await;
            (d.name().to_owned(), result)
        }))
        .await;
        debug!(devices = results.len(), "fleet refreshed");
        results
    }
}
