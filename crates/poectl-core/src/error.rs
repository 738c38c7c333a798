// ── Core error types ──
//
// User-facing errors from poectl-core. Consumers never see raw HTTP
// statuses or socket errors; the `From<poectl_api::Error>` impl folds
// protocol-level failures into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to switch at {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Switch operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {name}")]
    DeviceNotFound { name: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Port command rejected by switch: port {port}")]
    CommandRejected { port: String },

    #[error("Unexpected response from switch: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from protocol-layer errors ────────────────────────────

impl From<poectl_api::Error> for CoreError {
    fn from(err: poectl_api::Error) -> Self {
        match err {
            poectl_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            poectl_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- re-authentication required".into(),
            },
            // Timeouts are mapped by the caller that knows the bound.
            poectl_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                host: e
                    .url()
                    .and_then(|u| u.host_str().map(String::from))
                    .unwrap_or_else(|| "<unknown>".into()),
                reason: e.to_string(),
            },
            poectl_api::Error::Io(e) => CoreError::ConnectionFailed {
                host: String::new(),
                reason: e.to_string(),
            },
            poectl_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            poectl_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid switch address: {e}"),
            },
            poectl_api::Error::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Header repair needs plain http, got {scheme}"),
            },
            poectl_api::Error::Http { status, body } => CoreError::Protocol {
                message: format!("HTTP {status}: {body}"),
            },
            poectl_api::Error::MalformedResponse { message }
            | poectl_api::Error::Scrape { message } => CoreError::Protocol { message },
            poectl_api::Error::MissingToken { source_page } => CoreError::Protocol {
                message: format!("no session token in {source_page}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_auth_errors_become_authentication_failed() {
        let err: CoreError = poectl_api::Error::SessionExpired.into();
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));

        let err: CoreError = poectl_api::Error::Authentication {
            message: "nope".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Authentication failed: nope");
    }

    #[test]
    fn raw_transport_timeout_keeps_its_bound() {
        let err: CoreError = poectl_api::Error::Timeout { timeout_secs: 10 }.into();
        assert_eq!(err.to_string(), "Switch operation timed out after 10s");
    }

    #[test]
    fn scrape_failure_is_a_protocol_error() {
        let err: CoreError = poectl_api::Error::Scrape {
            message: "port table not found".into(),
        }
        .into();
        assert!(matches!(err, CoreError::Protocol { .. }));
    }
}
