// Switch HTTP client
//
// Owns the transport, the session, and URL construction for the device's
// single `dispatcher.cgi` endpoint. The protocol steps (login, status
// scrape, port commands) are implemented as inherent methods in separate
// files to keep this module focused on transport mechanics.

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::auth::{Credentials, ProtocolVariant};
use crate::error::Error;
use crate::session::Session;
use crate::transport::{DeviceTransport, Request, Response, Transport, TransportConfig};

const DISPATCHER_PATH: &str = "/cgi-bin/dispatcher.cgi";

/// Default pause between submitting credentials and checking the login.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);
/// Default number of full handshake attempts before giving up.
pub const DEFAULT_LOGIN_ATTEMPTS: u32 = 2;

// ── Endpoint ─────────────────────────────────────────────────────────

/// Where a switch lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    base_url: Url,
}

impl Endpoint {
    /// Build an endpoint from a bare host (`192.168.1.2`), a host with port,
    /// or a full origin (`http://192.168.1.2:8080`).
    pub fn parse(host: &str) -> Result<Self, Error> {
        let host = host.trim().trim_end_matches('/');
        let origin = if host.contains("://") {
            host.to_owned()
        } else {
            format!("http://{host}")
        };
        let base_url = Url::parse(&origin)?.join(DISPATCHER_PATH)?;
        Ok(Self {
            host: host.to_owned(),
            base_url,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// The `dispatcher.cgi` URL every request goes to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Raw protocol client for one switch.
///
/// Holds exactly one [`Session`]. All operations take `&mut self`, so a
/// single client can never run two exchanges at once; callers that share a
/// client across tasks must serialize access themselves.
pub struct SwitchClient<T: Transport = DeviceTransport> {
    transport: T,
    endpoint: Endpoint,
    variant: ProtocolVariant,
    pub(crate) credentials: Credentials,
    pub(crate) session: Session,
    pub(crate) settle_delay: Duration,
    pub(crate) login_attempts: u32,
}

impl SwitchClient<DeviceTransport> {
    /// Create a client from a `TransportConfig`.
    pub fn new(
        endpoint: Endpoint,
        credentials: Credentials,
        variant: ProtocolVariant,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let transport = transport.build_transport()?;
        Ok(Self::with_transport(transport, endpoint, credentials, variant))
    }
}

impl<T: Transport> SwitchClient<T> {
    /// Create a client around an existing transport.
    pub fn with_transport(
        transport: T,
        endpoint: Endpoint,
        credentials: Credentials,
        variant: ProtocolVariant,
    ) -> Self {
        Self {
            transport,
            endpoint,
            variant,
            credentials,
            session: Session::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            login_attempts: DEFAULT_LOGIN_ATTEMPTS,
        }
    }

    /// Override the pause between login submission and login check.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Override the handshake attempt budget (minimum 1).
    pub fn with_login_attempts(mut self, attempts: u32) -> Self {
        self.login_attempts = attempts.max(1);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Forget the current session entirely.
    pub fn clear_session(&mut self) {
        debug!(host = %self.endpoint.host, "clearing session");
        self.session.clear();
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `dispatcher.cgi` with the given query parameters appended.
    pub(crate) fn dispatcher_url(&self, query: &[(&str, String)]) -> Url {
        let mut url = self.endpoint.base_url.clone();
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET `dispatcher.cgi` with query parameters.
    pub(crate) async fn get(&mut self, query: &[(&str, String)]) -> Result<Response, Error> {
        let url = self.dispatcher_url(query);
        self.send(Request::get(url)).await
    }

    /// POST a form to `dispatcher.cgi`.
    pub(crate) async fn post(&mut self, form: &[(&str, String)]) -> Result<Response, Error> {
        let url = self.dispatcher_url(&[]);
        let form = form
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect();
        self.send(Request::post(url, form)).await
    }

    /// Attach session cookies, send, and absorb any `Set-Cookie` headers.
    async fn send(&mut self, request: Request) -> Result<Response, Error> {
        let request = request.with_cookie(self.session.cookie_header());
        let resp = self.transport.send(request).await?;
        for header in &resp.set_cookies {
            self.session.absorb_set_cookie(header);
        }
        Ok(resp)
    }

    /// Like [`get`](Self::get) but fails on non-success status.
    pub(crate) async fn get_ok(&mut self, query: &[(&str, String)]) -> Result<String, Error> {
        let resp = self.get(query).await?;
        if !resp.is_success() {
            return Err(Error::Http {
                status: resp.status,
                body: preview(&resp.body),
            });
        }
        Ok(resp.body)
    }
}

/// First 200 bytes of a body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_owned()
}
