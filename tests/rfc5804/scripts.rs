//! RFC 5804 Sections 2.5 - 2.10 - Script Management Tests
//!
//! Reference: https://datatracker.ietf.org/doc/html/rfc5804#section-2.5

use super::server::{ScriptedServer, logged_in};
use managesieve_rs::{SieveClient, SieveError};

const SCRIPT: &str = "require [\"fileinto\"];\r\n\
if header :contains \"subject\" \"[spam]\" {\r\n\
  fileinto \"Junk\";\r\n\
}\r\n";

#[tokio::test]
async fn test_listscripts() {
    let server = ScriptedServer::start(logged_in(
        "\"summer_script\"\r\n\"vacation_script\"\r\n\"main_script\" ACTIVE\r\nOK \"Listscripts completed.\"\r\n",
    ))
    .await;
    let mut client = SieveClient::open(server.config()).await.unwrap();

    let list = client.list_scripts().await.unwrap();
    assert_eq!(
        list.names,
        vec!["summer_script", "vacation_script", "main_script"]
    );
    assert_eq!(list.active.as_deref(), Some("main_script"));
}

#[tokio::test]
async fn test_put_then_get_round_trip() {
    let server = ScriptedServer::start(logged_in(&format!(
        "OK \"Putscript completed.\"\r\n{{{}}}\r\n{}\r\nOK \"Getscript completed.\"\r\n",
        SCRIPT.len(),
        SCRIPT
    )))
    .await;
    let mut client = SieveClient::open(server.config()).await.unwrap();

    client.install_script("spam", SCRIPT, false).await.unwrap();
    assert_eq!(client.get_script("spam").await.unwrap(), SCRIPT);
    drop(client);

    let received = server.received().await;
    assert!(received.contains(&format!(
        "PUTSCRIPT \"spam\" {{{}+}}\r\n{}\r\n",
        SCRIPT.len(),
        SCRIPT
    )));
    assert!(received.ends_with("GETSCRIPT \"spam\"\r\n"));
}

#[tokio::test]
async fn test_install_active_then_query_active() {
    let server = ScriptedServer::start(logged_in(
        "OK\r\nOK\r\n\"spam\" ACTIVE\r\n\"old\"\r\nOK\r\n",
    ))
    .await;
    let mut client = SieveClient::open(server.config()).await.unwrap();

    client.install_script("spam", SCRIPT, true).await.unwrap();
    assert_eq!(client.active_script().await.unwrap().as_deref(), Some("spam"));
}

#[tokio::test]
async fn test_putscript_syntax_error() {
    let server = ScriptedServer::start(logged_in(
        "NO {32}\r\nline 2: unknown command 'fileto'\r\n",
    ))
    .await;
    let mut client = SieveClient::open(server.config()).await.unwrap();

    let err = client.install_script("bad", "fileto \"x\";", true).await.unwrap_err();
    match err {
        SieveError::Protocol { code, message } => {
            assert_eq!(code, managesieve_rs::codes::NO_RESPONSE);
            assert_eq!(message, "line 2: unknown command 'fileto'");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    drop(client);

    // Activation is not attempted after a failed upload
    assert!(!server.received().await.contains("SETACTIVE"));
}

#[tokio::test]
async fn test_deactivate_and_delete() {
    let server = ScriptedServer::start(logged_in("OK\r\nOK\r\n")).await;
    let mut client = SieveClient::open(server.config()).await.unwrap();

    client.set_active("").await.unwrap();
    client.remove_script("old").await.unwrap();
    drop(client);

    assert!(
        server
            .received()
            .await
            .ends_with("SETACTIVE \"\"\r\nDELETESCRIPT \"old\"\r\n")
    );
}

#[tokio::test]
async fn test_havespace() {
    let server = ScriptedServer::start(logged_in(
        "OK\r\nNO (QUOTA/MAXSIZE) \"Quota exceeded\"\r\n",
    ))
    .await;
    let mut client = SieveClient::open(server.config()).await.unwrap();

    assert!(client.has_space("small", 100).await.unwrap());
    assert!(!client.has_space("huge", 1 << 40).await.unwrap());
}

#[tokio::test]
async fn test_commands_before_login_are_rejected_locally() {
    let server = ScriptedServer::start(format!(
        "{}{}",
        super::server::GREETING,
        super::server::CAPABILITIES
    ))
    .await;
    let mut client = SieveClient::new(server.config());
    client.connect().await.unwrap();

    assert!(matches!(
        client.get_script("main").await,
        Err(SieveError::NotAuthenticated)
    ));
    client.disconnect(false).await.unwrap();
    assert_eq!(server.received().await, "CAPABILITY\r\n");
}
