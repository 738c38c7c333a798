use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::obfuscate::EncodeParams;

/// Username and password for the switch's web UI.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Firmware family of the switch's web UI.
///
/// Both families speak the same `dispatcher.cgi` protocol but differ in how
/// login works, where the port table sits on the status page, and where the
/// per-command token comes from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ProtocolVariant {
    /// Older firmware: login via GET query parameters, session id delivered
    /// in a `setCookie(...)` script literal.
    QueryLogin,
    /// Newer firmware: form-POST login with an `authId` round trip, session
    /// cookie set by the device, command token in a hidden input.
    #[default]
    FormLogin,
}

/// Where the port table sits on the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLocator {
    /// The `index`-th table nested inside the first table of the document.
    NestedInFirst { index: usize, header_rows: usize },
    /// The `index`-th table in document order (nested tables included).
    Nth { index: usize },
}

/// Where the `XSSID` value submitted with a command comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Reuse the session token captured during login.
    Session,
    /// Fetch the status page and read the hidden `XSSID` input, per command.
    StatusPageInput,
}

impl ProtocolVariant {
    /// Parameters for the password obfuscation.
    pub fn encoding(&self) -> EncodeParams {
        match self {
            Self::QueryLogin => EncodeParams::QUERY_LOGIN,
            Self::FormLogin => EncodeParams::FORM_LOGIN,
        }
    }

    /// Name of the cookie that carries the session id.
    pub fn session_cookie(&self) -> &'static str {
        match self {
            Self::QueryLogin => "XSSID",
            Self::FormLogin => "HTTP_XSSID",
        }
    }

    pub fn table_locator(&self) -> TableLocator {
        match self {
            Self::QueryLogin => TableLocator::NestedInFirst {
                index: 1,
                header_rows: 1,
            },
            Self::FormLogin => TableLocator::Nth { index: 2 },
        }
    }

    pub fn token_source(&self) -> TokenSource {
        match self {
            Self::QueryLogin => TokenSource::Session,
            Self::FormLogin => TokenSource::StatusPageInput,
        }
    }

    /// Whether this firmware is known to send the malformed
    /// `Connection: close\r\n<html>` header block.
    pub fn needs_header_repair(&self) -> bool {
        matches!(self, Self::QueryLogin)
    }
}
