// Port power commands
//
// A command is a form POST of `cmd=775` carrying the port, the desired
// state, a fixed set of PoE settings, and an `XSSID` token. The device
// answers an accepted command with a script redirect; anything else means
// the session was no longer good.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{debug, error, info, warn};

use crate::auth::TokenSource;
use crate::client::SwitchClient;
use crate::error::Error;
use crate::status::selector;
use crate::transport::Transport;

const COMMAND_CMD: &str = "775";
const ACCEPTED_MARKER: &str = "window.location.replace";

static XSSID_INPUT: LazyLock<Selector> = LazyLock::new(|| selector(r#"input[name="XSSID"]"#));

/// Whether the device accepted a port command.
pub fn is_command_accepted(body: &str) -> bool {
    body.contains(ACCEPTED_MARKER)
}

/// Form fields for switching one port. Everything except the token, the
/// port, and the state is fixed at the values the web UI submits.
pub(crate) fn command_form(token: &str, port: &str, on: bool) -> Vec<(&'static str, String)> {
    vec![
        ("XSSID", token.to_owned()),
        ("portlist", port.to_owned()),
        ("state", if on { "1" } else { "0" }.to_owned()),
        ("portPriority", "2".to_owned()),
        ("portPowerMode", "3".to_owned()),
        ("portRangeDetection", "0".to_owned()),
        ("portLimitMode", "0".to_owned()),
        ("poeTimeRange", "20".to_owned()),
        ("cmd", COMMAND_CMD.to_owned()),
        ("sysSubmit", "Apply".to_owned()),
    ]
}

/// Value of the hidden `XSSID` input on a page.
pub(crate) fn parse_xssid_input(page: &str) -> Option<String> {
    let doc = Html::parse_document(page);
    doc.select(&XSSID_INPUT)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl<T: Transport> SwitchClient<T> {
    /// Turn PoE power on or off for `port`.
    ///
    /// Logs in first if needed. A rejected command clears the session, logs
    /// in again and resubmits exactly once. Returns `Ok(false)` when the
    /// retry is rejected too; transport and login failures are errors.
    pub async fn set_port_state(&mut self, port: &str, on: bool) -> Result<bool, Error> {
        self.login().await?;

        match self.submit_port_command(port, on).await {
            Ok(true) => {
                info!(port, on, "port command accepted");
                return Ok(true);
            }
            Ok(false) => warn!(port, on, "port command rejected, re-authenticating"),
            Err(Error::MissingToken { source_page }) => {
                warn!(port, source_page, "no command token, re-authenticating");
            }
            Err(e) => return Err(e),
        }

        self.clear_session();
        self.login().await?;

        if self.submit_port_command(port, on).await? {
            info!(port, on, "port command accepted after re-authentication");
            Ok(true)
        } else {
            error!(port, on, "port command rejected after re-authentication");
            Ok(false)
        }
    }

    async fn submit_port_command(&mut self, port: &str, on: bool) -> Result<bool, Error> {
        if !self.session.is_valid() {
            return Err(Error::SessionExpired);
        }

        let token = self.command_token().await?;
        let resp = self.post(&command_form(&token, port, on)).await?;
        debug!(status = resp.status, port, on, "port command submitted");
        Ok(is_command_accepted(&resp.body))
    }

    async fn command_token(&mut self) -> Result<String, Error> {
        match self.variant().token_source() {
            TokenSource::Session => self
                .session
                .token()
                .map(String::from)
                .ok_or(Error::MissingToken {
                    source_page: "session",
                }),
            TokenSource::StatusPageInput => {
                let page = self.status_page().await?;
                parse_xssid_input(&page).ok_or(Error::MissingToken {
                    source_page: "status page",
                })
            }
        }
    }
}
