//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use poectl_config::ConfigError;
use poectl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to switch at {host}")]
    #[diagnostic(
        code(poectl::connection_failed),
        help(
            "Check that the switch is reachable and its web UI is enabled.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { host: String, reason: String },

    #[error("Unexpected response from switch: {message}")]
    #[diagnostic(
        code(poectl::protocol),
        help(
            "The firmware may use the other login style.\n\
             Try setting variant = \"query-login\" or \"form-login\" for this device."
        )
    )]
    Protocol { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(poectl::auth_failed),
        help("Verify the username and password configured for this device.")
    )]
    AuthFailed { message: String },

    #[error("No password configured for device '{device}'")]
    #[diagnostic(
        code(poectl::no_credentials),
        help(
            "Set `password_env` or `password` for the device in your config,\n\
             or store it in the system keyring under service \"poectl\", entry \"{device}/password\"."
        )
    )]
    NoCredentials { device: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(poectl::not_found),
        help("Run: poectl {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Operations ───────────────────────────────────────────────────
    #[error("Switch rejected the command for port {port}")]
    #[diagnostic(
        code(poectl::command_rejected),
        help("The command was retried after logging in again. Run with -v for details.")
    )]
    CommandRejected { port: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(poectl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No devices configured")]
    #[diagnostic(
        code(poectl::no_config),
        help(
            "Add a [[devices]] entry with host, username and password.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(poectl::config))]
    Config(Box<figment::Error>),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Switch did not answer within {seconds}s")]
    #[diagnostic(
        code(poectl::timeout),
        help("Increase the timeout with --timeout or timeout_secs in the config.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    #[diagnostic(code(poectl::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    #[diagnostic(code(poectl::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML output failed: {0}")]
    #[diagnostic(code(poectl::toml))]
    Toml(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { host, reason } => {
                CliError::ConnectionFailed { host, reason }
            }
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },
            CoreError::DeviceNotFound { name } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: name,
                list_command: "config show".into(),
            },
            CoreError::CommandRejected { port } => CliError::CommandRejected { port },
            CoreError::Protocol { message } => CliError::Protocol { message },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { device } => CliError::NoCredentials { device },
            ConfigError::UnknownDevice { name } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: name,
                list_command: "config show".into(),
            },
            ConfigError::NoDevices => CliError::NoConfig {
                path: poectl_config::config_path().display().to_string(),
            },
            ConfigError::Serialization(e) => CliError::Toml(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
        }
    }
}
