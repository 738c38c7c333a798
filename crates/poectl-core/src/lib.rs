//! Device-level layer between `poectl-api` and the CLI.
//!
//! - **[`DeviceClient`]**: façade over one switch. Owns the protocol client
//!   (and with it the session) plus the last known [`PortTable`]. Exposes
//!   `refresh()` / `set_port_state()` returning `bool`, fallible `try_`
//!   twins, and a throttled `update()` for schedulers.
//!
//! - **[`Fleet`]**: several devices refreshed concurrently and looked up by
//!   name.
//!
//! - **[`DeviceConfig`]**: everything needed to build a `DeviceClient`. The
//!   core never reads config files; `poectl-config` produces these.

pub mod config;
pub mod device;
pub mod error;
pub mod fleet;
pub mod store;

pub use config::{DEFAULT_MIN_REFRESH_INTERVAL, DEFAULT_TIMEOUT, DeviceConfig};
pub use device::{DeviceClient, UpdateOutcome};
pub use error::CoreError;
pub use fleet::Fleet;
pub use store::PortTable;

pub use poectl_api::{Credentials, PortRecord, PowerState, ProtocolVariant};
