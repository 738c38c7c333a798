// Request/response plumbing shared by every protocol step.
//
// The switch talks plain form-encoded HTTP, but some firmware emits a header
// block with no blank line before the HTML body. `HttpTransport` uses
// reqwest and is fine for well-behaved firmware; `RepairingTransport` reads
// the raw bytes, patches the header block, and parses it with `httparse`.

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

const USER_AGENT: &str = concat!("poectl/", env!("CARGO_PKG_VERSION"));
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MAX_HEADERS: usize = 64;

/// The header line after which the broken firmware forgets the blank line.
const BROKEN_HEAD: &[u8] = b"Connection: close\r\n<html>";
const BROKEN_HEAD_SPLIT: usize = b"Connection: close\r\n".len();

// ── Request / Response ───────────────────────────────────────────────

/// One HTTP exchange with the device. Query parameters live in `url`.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub form: Vec<(String, String)>,
    pub cookie: Option<String>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            form: Vec::new(),
            cookie: None,
        }
    }

    pub fn post(url: Url, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            url,
            form,
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, cookie: Option<String>) -> Self {
        self.cookie = cookie;
        self
    }

    fn form_body(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.form.iter())
            .finish()
    }
}

/// What the protocol layer needs from a response.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in arrival order.
    pub set_cookies: Vec<String>,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ── Transport trait ──────────────────────────────────────────────────

/// Sends one request and returns the decoded response.
///
/// Implementations must not keep cookies of their own; the session owns
/// them and passes them in via [`Request::cookie`].
pub trait Transport: Send + Sync {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response, Error>> + Send;
}

// ── Configuration ────────────────────────────────────────────────────

/// Shared transport configuration for building a device transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Use [`RepairingTransport`] instead of reqwest.
    pub repair_headers: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            repair_headers: false,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Redirects are not followed: the device answers commands with a
    /// script-driven redirect that must reach the caller untouched.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(Error::Transport)
    }

    /// Build whichever transport this config asks for.
    pub fn build_transport(&self) -> Result<DeviceTransport, Error> {
        if self.repair_headers {
            Ok(DeviceTransport::Repairing(RepairingTransport::new(self.timeout)))
        } else {
            Ok(DeviceTransport::Http(HttpTransport::new(self.build_client()?)))
        }
    }
}

// ── reqwest-backed transport ─────────────────────────────────────────

/// Transport for firmware that sends well-formed HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = self.http.request(request.method.clone(), request.url.clone());
        if let Some(ref cookie) = request.cookie {
            builder = builder.header(COOKIE, cookie);
        }
        if request.method == Method::POST {
            builder = builder
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(request.form_body());
        }

        let resp = builder.send().await.map_err(Error::Transport)?;
        let status = resp.status().as_u16();
        let set_cookies = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(String::from)
            .collect();
        let body = resp.text().await.map_err(Error::Transport)?;

        trace!(status, bytes = body.len(), "response received");
        Ok(Response {
            status,
            set_cookies,
            body,
        })
    }
}

// ── Raw transport with header repair ─────────────────────────────────

/// Plain-HTTP transport that tolerates the broken header block.
///
/// Opens one connection per request (`Connection: close`), reads to EOF,
/// applies [`repair_head`], then parses the head with `httparse`.
#[derive(Debug, Clone)]
pub struct RepairingTransport {
    timeout: Duration,
}

impl RepairingTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exchange(&self, request: &Request) -> Result<Response, Error> {
        if request.url.scheme() != "http" {
            return Err(Error::UnsupportedScheme(request.url.scheme().to_owned()));
        }
        let host = request
            .url
            .host_str()
            .ok_or_else(|| Error::MalformedResponse {
                message: format!("no host in {}", request.url),
            })?;
        let port = request.url.port_or_known_default().unwrap_or(80);

        let mut stream = TcpStream::connect((host, port)).await?;
        stream.write_all(&render_request(request)).await?;

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        trace!(bytes = raw.len(), "raw response received");

        parse_response(&raw)
    }
}

impl Transport for RepairingTransport {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        debug!(method = %request.method, url = %request.url, "sending raw request");
        tokio::time::timeout(self.timeout, self.exchange(&request))
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
    }
}

/// Serialize `request` as an HTTP/1.1 message.
pub fn render_request(request: &Request) -> Vec<u8> {
    let url = &request.url;
    let target = &url[url::Position::BeforePath..url::Position::AfterQuery];
    let host = match (url.host_str(), url.port()) {
        (Some(h), Some(p)) => format!("{h}:{p}"),
        (Some(h), None) => h.to_owned(),
        (None, _) => String::new(),
    };

    let mut head = format!(
        "{} {target} HTTP/1.1\r\nHost: {host}\r\nUser-Agent: {USER_AGENT}\r\nAccept: */*\r\nConnection: close\r\n",
        request.method
    );
    if let Some(ref cookie) = request.cookie {
        head.push_str(&format!("Cookie: {cookie}\r\n"));
    }

    let body = if request.method == Method::POST {
        let body = request.form_body();
        head.push_str(&format!(
            "Content-Type: {FORM_CONTENT_TYPE}\r\nContent-Length: {}\r\n",
            body.len()
        ));
        body
    } else {
        String::new()
    };
    head.push_str("\r\n");

    let mut out = head.into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}

/// Insert the blank line some firmware omits between the last header
/// (`Connection: close`) and the HTML body.
///
/// Returns the input untouched when the head is already well-formed.
pub fn repair_head(raw: &[u8]) -> Cow<'_, [u8]> {
    let Some(pos) = find(raw, BROKEN_HEAD) else {
        return Cow::Borrowed(raw);
    };
    // Only patch inside the header block, never inside a body.
    if find(&raw[..pos], b"\r\n\r\n").is_some() {
        return Cow::Borrowed(raw);
    }

    let split = pos + BROKEN_HEAD_SPLIT;
    let mut fixed = Vec::with_capacity(raw.len() + 2);
    fixed.extend_from_slice(&raw[..split]);
    fixed.extend_from_slice(b"\r\n");
    fixed.extend_from_slice(&raw[split..]);
    debug!("repaired malformed response head");
    Cow::Owned(fixed)
}

/// Parse a complete HTTP/1.x response read to EOF.
pub fn parse_response(raw: &[u8]) -> Result<Response, Error> {
    let raw = repair_head(raw);

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut headers);
    let head_len = match parsed.parse(&raw) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => {
            return Err(Error::MalformedResponse {
                message: "connection closed before end of headers".into(),
            });
        }
        Err(e) => {
            return Err(Error::MalformedResponse {
                message: e.to_string(),
            });
        }
    };

    let status = parsed.code.unwrap_or_default();
    let mut set_cookies = Vec::new();
    let mut content_length = None;
    let mut chunked = false;
    for header in parsed.headers.iter() {
        let value = String::from_utf8_lossy(header.value);
        if header.name.eq_ignore_ascii_case("set-cookie") {
            set_cookies.push(value.into_owned());
        } else if header.name.eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse::<usize>().ok();
        } else if header.name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
        }
    }

    let rest = &raw[head_len..];
    let body = if chunked {
        Cow::Owned(decode_chunked(rest)?)
    } else if let Some(len) = content_length {
        Cow::Borrowed(&rest[..len.min(rest.len())])
    } else {
        Cow::Borrowed(rest)
    };

    Ok(Response {
        status,
        set_cookies,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>, Error> {
    let malformed = |message: &str| Error::MalformedResponse {
        message: message.to_owned(),
    };

    let mut out = Vec::new();
    loop {
        let (consumed, size) = match httparse::parse_chunk_size(data) {
            Ok(httparse::Status::Complete(parsed)) => parsed,
            Ok(httparse::Status::Partial) => return Err(malformed("unterminated chunk size")),
            Err(_) => return Err(malformed("invalid chunk size")),
        };
        data = &data[consumed..];

        if size == 0 {
            return Ok(out);
        }
        let size = usize::try_from(size).map_err(|_| malformed("chunk too large"))?;
        if data.len() < size {
            return Err(malformed("truncated chunk"));
        }
        out.extend_from_slice(&data[..size]);
        data = data.get(size + 2..).unwrap_or_default();
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ── Runtime-selected transport ───────────────────────────────────────

/// Either transport, chosen from configuration at runtime.
#[derive(Debug, Clone)]
pub enum DeviceTransport {
    Http(HttpTransport),
    Repairing(RepairingTransport),
}

impl Transport for DeviceTransport {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        match self {
            Self::Http(t) => t.send(request).await,
            Self::Repairing(t) => t.send(request).await,
        }
    }
}
