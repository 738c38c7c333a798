use thiserror::Error;

/// Top-level error type for the `poectl-api` crate.
///
/// Covers transport failures, the login handshake, and parsing of the
/// device's HTML pages. `poectl-core` maps these into user-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The login handshake used up its attempt budget.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// An operation needed a valid session but none was established.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Socket error from the raw transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The raw transport only speaks plain HTTP.
    #[error("Unsupported URL scheme for raw transport: {0}")]
    UnsupportedScheme(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response could not be parsed as HTTP, even after header repair.
    #[error("Malformed HTTP response: {message}")]
    MalformedResponse { message: String },

    // ── Device pages ────────────────────────────────────────────────
    /// The status page did not have the expected table structure.
    #[error("Status page parse error: {message}")]
    Scrape { message: String },

    /// No session token could be extracted for a command.
    #[error("Session token not found in {source_page}")]
    MissingToken { source_page: &'static str },
}

impl Error {
    /// Returns `true` if either transport gave up waiting on the switch.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}
