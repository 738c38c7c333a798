// Per-device session state.
//
// The switch identifies a logged-in browser by a session id cookie. We keep
// cookies ourselves instead of handing a jar to the HTTP client so the
// session can be inspected, cleared, and shared by both transports.

use std::collections::BTreeMap;

use tracing::trace;

/// Cookies, session token, and validity for one device.
#[derive(Debug, Default, Clone)]
pub struct Session {
    cookies: BTreeMap<String, String>,
    token: Option<String>,
    valid: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once the handshake has succeeded and nothing has since
    /// signalled expiry.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The session id extracted after login, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    /// Store a cookie, replacing any previous value.
    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        trace!(cookie = %name, "storing cookie");
        self.cookies.insert(name, value.into());
    }

    /// Absorb a raw `Set-Cookie` header value (`name=value; attrs...`).
    pub fn absorb_set_cookie(&mut self, header: &str) {
        let pair = header.split(';').next().unwrap_or_default();
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                self.set_cookie(name, value.trim());
            }
        }
    }

    /// Render the `Cookie` request header, or `None` when empty.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    /// Mark the handshake as complete.
    pub(crate) fn establish(&mut self, token: Option<String>) {
        self.token = token;
        self.valid = true;
    }

    /// Keep cookies but require a fresh handshake before the next
    /// dependent operation.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Drop everything, as if the browser had been closed.
    pub fn clear(&mut self) {
        self.cookies.clear();
        self.token = None;
        self.valid = false;
    }
}
