// poectl-api: Async client for the web-admin protocol of managed PoE switches

pub mod auth;
pub mod client;
pub mod command;
pub mod error;
pub mod login;
pub mod obfuscate;
pub mod session;
pub mod status;
pub mod transport;

pub use auth::{Credentials, ProtocolVariant, TableLocator, TokenSource};
pub use client::{DEFAULT_LOGIN_ATTEMPTS, DEFAULT_SETTLE_DELAY, Endpoint, SwitchClient};
pub use command::is_command_accepted;
pub use error::Error;
pub use obfuscate::{EncodeParams, encode};
pub use session::Session;
pub use status::{PortRecord, PowerState, parse_port_table};
pub use transport::{
    DeviceTransport, HttpTransport, RepairingTransport, Request, Response, Transport,
    TransportConfig,
};
