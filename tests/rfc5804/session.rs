//! RFC 5804 Section 1.8 / 2.2 / 2.3 - Session Lifecycle Tests
//!
//! Reference: https://datatracker.ietf.org/doc/html/rfc5804#section-1.8
//!
//! Greeting, CAPABILITY, STARTTLS negotiation and LOGOUT over a real TCP
//! socket against a scripted server.

use super::server::{CAPABILITIES, GREETING, ScriptedServer};
use managesieve_rs::{ConnectionState, SecurityMode, SieveClient, SieveError};
use std::time::Duration;

#[tokio::test]
async fn test_connect_reads_greeting_and_capabilities() {
    let server = ScriptedServer::start(format!("{GREETING}{CAPABILITIES}OK \"Bye.\"\r\n")).await;
    let mut client = SieveClient::new(server.config());

    client.connect().await.unwrap();
    assert_eq!(client.state(), ConnectionState::NonAuthenticated);
    assert_eq!(client.implementation().unwrap(), Some("Scripted Sieve 1.0"));
    assert!(client.has_extension("envelope").unwrap());
    assert_eq!(client.auth_mechanisms().unwrap(), ["PLAIN", "LOGIN"]);
    assert!(!client.is_tls());

    client.disconnect(true).await.unwrap();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    assert_eq!(server.received().await, "CAPABILITY\r\nLOGOUT\r\n");
}

#[tokio::test]
async fn test_disconnect_without_logout() {
    let server = ScriptedServer::start(format!("{GREETING}{CAPABILITIES}")).await;
    let mut client = SieveClient::new(server.config());
    client.connect().await.unwrap();
    client.disconnect(false).await.unwrap();

    assert_eq!(server.received().await, "CAPABILITY\r\n");
}

#[tokio::test]
async fn test_required_starttls_not_offered() {
    let server = ScriptedServer::start(format!("{GREETING}{CAPABILITIES}")).await;
    let config = server.config().with_security(SecurityMode::StartTls);
    let mut client = SieveClient::new(config);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, SieveError::ConnectionFailed(_)), "{:?}", err);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.received().await, "CAPABILITY\r\n");
}

#[tokio::test]
async fn test_opportunistic_without_starttls_stays_plain() {
    let server = ScriptedServer::start(format!("{GREETING}{CAPABILITIES}")).await;
    let config = server.config().with_security(SecurityMode::Opportunistic);
    let mut client = SieveClient::new(config);

    client.connect().await.unwrap();
    assert!(!client.is_tls());
    drop(client);
    assert_eq!(server.received().await, "CAPABILITY\r\n");
}

#[tokio::test]
async fn test_greeting_bye() {
    let server = ScriptedServer::start("BYE \"Too busy, try later\"\r\n").await;
    let mut client = SieveClient::new(server.config());

    let err = client.connect().await.unwrap_err();
    assert!(err.is_bye(), "{:?}", err);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.received().await, "");
}

#[tokio::test]
async fn test_connection_refused() {
    // Bind and drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = managesieve_rs::ServerConfig::plain("127.0.0.1", "user", "pass").with_port(port);
    let mut client = SieveClient::new(config);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, SieveError::ConnectionFailed(_)), "{:?}", err);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_silent_server_times_out() {
    let server = ScriptedServer::start("").await;
    let config = server.config().with_timeout(Duration::from_millis(200));
    let mut client = SieveClient::new(config);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, SieveError::Timeout), "{:?}", err);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.received().await, "");
}

#[tokio::test]
async fn test_bypass_auth_session() {
    let server = ScriptedServer::start(format!(
        "{CAPABILITIES}\"main\" ACTIVE\r\nOK\r\n"
    ))
    .await;
    let config = server.config().with_bypass_auth(true);
    let mut client = SieveClient::open(config).await.unwrap();

    assert!(client.is_authenticated());
    let list = client.list_scripts().await.unwrap();
    assert_eq!(list.active.as_deref(), Some("main"));
    drop(client);

    assert_eq!(server.received().await, "CAPABILITY\r\nLISTSCRIPTS\r\n");
}

#[tokio::test]
async fn test_debug_handler_receives_protocol_lines() {
    use std::sync::{Arc, Mutex};

    let server = ScriptedServer::start(format!("{GREETING}{CAPABILITIES}")).await;
    let mut client = SieveClient::new(server.config());
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = lines.clone();
    client.set_debug_handler(move |line| sink.lock().unwrap().push(line.to_string()));

    client.connect().await.unwrap();
    client.disconnect(false).await.unwrap();

    let lines = lines.lock().unwrap();
    assert!(lines.contains(&"C: CAPABILITY".to_string()));
    assert!(lines.contains(&"S: OK \"Capability completed.\"".to_string()));
    assert!(lines.iter().any(|l| l.starts_with("Connected to 127.0.0.1")));
}
