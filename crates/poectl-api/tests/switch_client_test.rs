#![allow(clippy::unwrap_used)]
// Integration tests for `SwitchClient` using wiremock.

use std::time::Duration;

use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use poectl_api::{
    Credentials, Endpoint, Error, PowerState, ProtocolVariant, SwitchClient, TransportConfig,
};

const DISPATCHER: &str = "/cgi-bin/dispatcher.cgi";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup(variant: ProtocolVariant) -> (MockServer, SwitchClient) {
    let server = MockServer::start().await;
    let endpoint = Endpoint::parse(&server.uri()).unwrap();
    let client = SwitchClient::new(
        endpoint,
        Credentials::new("admin", "1234"),
        variant,
        &TransportConfig::default(),
    )
    .unwrap()
    .with_settle_delay(Duration::ZERO);
    (server, client)
}

fn port_row(port: &str, state: &str, mw: &str) -> String {
    let cells = ["", "", port, state, "0", "Low", "802.3at", "Disable", mw, "30000", "none", "-", ""];
    let tds: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
    format!("<tr>{tds}</tr>")
}

/// Status page as served by form-login firmware: port table is the third
/// table, and the command token sits in a hidden input.
fn form_status_page(rows: &str) -> String {
    format!(
        "<html><body><form><input type=\"hidden\" name=\"XSSID\" value=\"tok42\"></form>\
         <table><tr><td>nav</td></tr></table>\
         <table><tr><td>summary</td></tr></table>\
         <table>{rows}</table></body></html>"
    )
}

async fn mount_form_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(DISPATCHER))
        .and(body_string_contains("login=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(" auth-77 \n"))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(DISPATCHER))
        .and(body_string_contains("authId=auth-77"))
        .and(body_string_contains("login_chk=true"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "HTTP_XSSID=abc; path=/")
                .set_body_string("OK"),
        )
        .mount(server)
        .await;
}

// ── Login tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_form_login_success() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;
    mount_form_login(&server).await;

    client.login().await.unwrap();

    assert!(client.session().is_valid());
    assert_eq!(client.session().cookie("HTTP_XSSID"), Some("abc"));
    assert_eq!(client.session().token(), Some("abc"));
}

#[tokio::test]
async fn test_login_is_skipped_with_valid_session() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;

    Mock::given(method("POST"))
        .and(path(DISPATCHER))
        .and(body_string_contains("login=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("auth-77"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("login_chk=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    client.login().await.unwrap();
    client.login().await.unwrap();
}

#[tokio::test]
async fn test_rejected_check_is_retried_once() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;

    Mock::given(method("POST"))
        .and(body_string_contains("login=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("auth-77"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("login_chk=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ERROR"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("login_chk=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    assert!(client.session().is_valid());
}

#[tokio::test]
async fn test_login_gives_up_after_budget() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;

    Mock::given(method("POST"))
        .and(body_string_contains("login=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("auth-77"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("login_chk=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ERROR"))
        .expect(2)
        .mount(&server)
        .await;

    let result = client.login().await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(!client.session().is_valid());
}

#[tokio::test]
async fn test_query_login_reads_cookie_script() {
    let (server, mut client) = setup(ProtocolVariant::QueryLogin).await;

    Mock::given(method("GET"))
        .and(path(DISPATCHER))
        .and(query_param("login", "1"))
        .and(query_param("username", "admin"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DISPATCHER))
        .and(query_param("login_chk", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DISPATCHER))
        .and(query_param("cmd", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<script>setCookie("XSSID", "deadbeef");</script>"#),
        )
        .mount(&server)
        .await;

    client.login().await.unwrap();

    assert_eq!(client.session().cookie("XSSID"), Some("deadbeef"));
    assert_eq!(client.session().token(), Some("deadbeef"));
}

#[tokio::test]
async fn test_query_login_retry_starts_from_empty_session() {
    let (server, mut client) = setup(ProtocolVariant::QueryLogin).await;

    // First handshake leaves a cookie behind and is then rejected.
    Mock::given(method("GET"))
        .and(query_param("login", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "stale=1; path=/")
                .set_body_string("<html></html>"),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("login", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("login_chk", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ERROR"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("login_chk", "1"))
        .and(|req: &wiremock::Request| {
            !req.headers
                .get("cookie")
                .is_some_and(|v| v.to_str().unwrap_or_default().contains("stale"))
        })
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cmd", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<script>setCookie("XSSID", "cafe01");</script>"#),
        )
        .mount(&server)
        .await;

    client.login().await.unwrap();

    assert!(client.session().is_valid());
    assert_eq!(client.session().cookie("stale"), None);
    assert_eq!(client.session().token(), Some("cafe01"));
}

#[tokio::test]
async fn test_query_login_without_cookie_script_fails() {
    let (server, mut client) = setup(ProtocolVariant::QueryLogin).await;

    Mock::given(method("GET"))
        .and(query_param("login_chk", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .with_priority(10)
        .mount(&server)
        .await;

    let result = client.login().await;
    assert!(
        matches!(result, Err(Error::MissingToken { .. })),
        "expected MissingToken error, got: {result:?}"
    );
}

// ── Status tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_ports_requires_session() {
    let (_server, mut client) = setup(ProtocolVariant::FormLogin).await;
    let result = client.fetch_ports().await;
    assert!(matches!(result, Err(Error::SessionExpired)));
}

#[tokio::test]
async fn test_fetch_ports_sends_cookie_and_parses_table() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;
    mount_form_login(&server).await;

    let rows = format!("{}{}", port_row("1", "Enable", "4200"), port_row("2", "Disable", "0"));
    Mock::given(method("GET"))
        .and(path(DISPATCHER))
        .and(query_param("cmd", "773"))
        .and(header("cookie", "HTTP_XSSID=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(form_status_page(&rows)))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    let ports = client.fetch_ports().await.unwrap();

    assert_eq!(ports.len(), 2);
    assert_eq!(ports[0].port_id, "1");
    assert_eq!(ports[0].power, PowerState::On);
    assert!((ports[0].current_power_watts - 4.2).abs() < f64::EPSILON);
    assert_eq!(ports[1].power, PowerState::Off);
}

#[tokio::test]
async fn test_login_page_instead_of_status_invalidates_session() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;
    mount_form_login(&server).await;

    Mock::given(method("GET"))
        .and(query_param("cmd", "773"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><form name=\"login\"></form></html>"),
        )
        .mount(&server)
        .await;

    client.login().await.unwrap();
    let result = client.fetch_ports().await;

    assert!(matches!(result, Err(Error::Scrape { .. })));
    assert!(!client.session().is_valid());
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;
    mount_form_login(&server).await;

    Mock::given(method("GET"))
        .and(query_param("cmd", "773"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    client.login().await.unwrap();
    let result = client.fetch_ports().await;
    assert!(
        matches!(result, Err(Error::Http { status: 500, .. })),
        "expected Http 500, got: {result:?}"
    );
}

// ── Command tests ───────────────────────────────────────────────────

async fn mount_status_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(query_param("cmd", "773"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(form_status_page(&port_row("3", "Disable", "0"))),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_port_command_accepted() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;
    mount_form_login(&server).await;
    mount_status_page(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("cmd=775"))
        .and(body_string_contains("XSSID=tok42"))
        .and(body_string_contains("portlist=3"))
        .and(body_string_contains("state=1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<script>window.location.replace('/')</script>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.set_port_state("3", true).await.unwrap());
}

#[tokio::test]
async fn test_rejected_command_reauthenticates_and_retries() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;
    mount_status_page(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("login=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("auth-77"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("login_chk=true"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("cmd=775"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("cmd=775"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<script>window.location.replace('/')</script>"),
        )
        .mount(&server)
        .await;

    assert!(client.set_port_state("3", false).await.unwrap());
}

#[tokio::test]
async fn test_command_rejected_twice_returns_false() {
    let (server, mut client) = setup(ProtocolVariant::FormLogin).await;
    mount_form_login(&server).await;
    mount_status_page(&server).await;

    Mock::given(method("POST"))
        .and(body_string_contains("cmd=775"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .expect(2)
        .mount(&server)
        .await;

    assert!(!client.set_port_state("3", true).await.unwrap());
}

#[tokio::test]
async fn test_query_login_command_uses_session_token() {
    let (server, mut client) = setup(ProtocolVariant::QueryLogin).await;

    Mock::given(method("GET"))
        .and(query_param("login_chk", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("cmd", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<script>setCookie("XSSID", "deadbeef");</script>"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .with_priority(10)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("XSSID=deadbeef"))
        .and(body_string_contains("cmd=775"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<script>window.location.replace('/')</script>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert!(client.set_port_state("5", true).await.unwrap());
}
