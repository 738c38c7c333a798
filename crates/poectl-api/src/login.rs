// Login handshake
//
// Two-step login: submit obfuscated credentials, wait for the device to set
// up the session, then ask whether it worked. The only success signal is
// the literal "OK" in the check response. A failed check clears the session
// and the whole sequence is retried until the attempt budget runs out.

use chrono::Utc;
use secrecy::ExposeSecret;
use tracing::{debug, error, trace, warn};

use crate::auth::ProtocolVariant;
use crate::client::SwitchClient;
use crate::error::Error;
use crate::obfuscate;
use crate::transport::Transport;

const LOGIN_OK_MARKER: &str = "OK";
const XSSID_SCRIPT_MARKER: &str = r#"setCookie("XSSID""#;

impl<T: Transport> SwitchClient<T> {
    /// Authenticate unless the session is already valid.
    ///
    /// Transport failures propagate immediately and leave the session
    /// invalid. A login check that never says "OK" ends in
    /// [`Error::Authentication`] after `login_attempts` full handshakes.
    pub async fn login(&mut self) -> Result<(), Error> {
        if self.session.is_valid() {
            trace!("session still valid, skipping login");
            return Ok(());
        }

        let variant = self.variant();
        debug!(host = %self.endpoint().host(), %variant, "no valid session, logging in");

        for attempt in 1..=self.login_attempts {
            let accepted = match variant {
                ProtocolVariant::QueryLogin => self.query_login_attempt().await?,
                ProtocolVariant::FormLogin => self.form_login_attempt().await?,
            };

            if accepted {
                let token = self.extract_session_token().await?;
                self.session.establish(token);
                debug!(attempt, "login successful");
                return Ok(());
            }

            warn!(attempt, "login check did not report OK");
            self.session.clear();
        }

        error!(
            host = %self.endpoint().host(),
            attempts = self.login_attempts,
            "login failed"
        );
        Err(Error::Authentication {
            message: format!(
                "login check failed after {} attempt(s)",
                self.login_attempts
            ),
        })
    }

    fn encoded_password(&self) -> String {
        obfuscate::encode(
            self.credentials.password.expose_secret(),
            self.variant().encoding(),
        )
    }

    /// Older firmware: credentials and check both go in GET query strings.
    async fn query_login_attempt(&mut self) -> Result<bool, Error> {
        let login = [
            ("username", self.credentials.username.clone()),
            ("password", self.encoded_password()),
            ("login", "1".to_owned()),
            ("dummy", cache_buster()),
        ];
        let resp = self.get(&login).await?;
        trace!(status = resp.status, "login request sent");

        tokio::time::sleep(self.settle_delay).await;

        let check = [("login_chk", "1".to_owned()), ("dummy", cache_buster())];
        let resp = self.get(&check).await?;
        debug!(status = resp.status, "login check returned");
        Ok(login_accepted(&resp.body))
    }

    /// Newer firmware: POST credentials, receive an `authId`, POST it back.
    async fn form_login_attempt(&mut self) -> Result<bool, Error> {
        let login = [
            ("username", self.credentials.username.clone()),
            ("password", self.encoded_password()),
            ("login", "true;".to_owned()),
        ];
        let resp = self.post(&login).await?;
        let auth_id = resp.body.trim().to_owned();
        debug!(status = resp.status, "login request sent");

        tokio::time::sleep(self.settle_delay).await;

        let check = [("authId", auth_id), ("login_chk", "true".to_owned())];
        let resp = self.post(&check).await?;
        debug!(status = resp.status, "login check returned");
        Ok(login_accepted(&resp.body))
    }

    /// Pull the session id out of wherever this firmware puts it.
    async fn extract_session_token(&mut self) -> Result<Option<String>, Error> {
        let cookie_name = self.variant().session_cookie();
        match self.variant() {
            ProtocolVariant::QueryLogin => {
                let page = self.get_ok(&[("cmd", "1".to_owned())]).await?;
                let token = parse_xssid_script(&page).ok_or(Error::MissingToken {
                    source_page: "session cookie script",
                })?;
                self.session.set_cookie(cookie_name, token.clone());
                Ok(Some(token))
            }
            ProtocolVariant::FormLogin => {
                let token = self.session.cookie(cookie_name).map(String::from);
                if token.is_none() {
                    warn!(cookie = cookie_name, "device did not set a session cookie");
                }
                Ok(token)
            }
        }
    }
}

/// Whether a login-check response body signals success.
pub(crate) fn login_accepted(body: &str) -> bool {
    body.contains(LOGIN_OK_MARKER)
}

/// Millisecond timestamp the web UI appends to defeat caching.
fn cache_buster() -> String {
    Utc::now().timestamp_millis().to_string()
}

/// Extract `<value>` from `setCookie("XSSID", "<value>");` in a page.
pub(crate) fn parse_xssid_script(page: &str) -> Option<String> {
    let start = page.find(XSSID_SCRIPT_MARKER)?;
    let rest = &page[start + XSSID_SCRIPT_MARKER.len()..];
    let rest = rest.trim_start().strip_prefix(',')?.trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    let value = rest[..end].trim();
    (!value.is_empty()).then(|| value.to_owned())
}
