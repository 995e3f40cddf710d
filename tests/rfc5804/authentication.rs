//! RFC 5804 Section 2.1 - AUTHENTICATE Command Tests
//!
//! Reference: https://datatracker.ietf.org/doc/html/rfc5804#section-2.1

use super::server::{CAPABILITIES, GREETING, ScriptedServer, logged_in};
use managesieve_rs::sasl::{self, AuthMechanism, AuthMethod, select_mechanism};
use managesieve_rs::{ConnectionState, SieveClient, SieveError};

#[test]
fn test_preference_order() {
    assert_eq!(
        AuthMechanism::PREFERENCE,
        [
            AuthMechanism::DigestMd5,
            AuthMechanism::CramMd5,
            AuthMechanism::External,
            AuthMechanism::Plain,
            AuthMechanism::Login,
        ]
    );
}

#[test]
fn test_select_strongest_common_mechanism() {
    let server = vec!["LOGIN".to_string(), "PLAIN".to_string(), "GSSAPI".to_string()];
    assert_eq!(
        select_mechanism(&server, &AuthMechanism::PREFERENCE, None).unwrap(),
        AuthMechanism::Plain
    );
}

#[test]
fn test_select_is_case_insensitive() {
    let server = vec!["cram-md5".to_string()];
    assert_eq!(
        select_mechanism(&server, &AuthMechanism::PREFERENCE, None).unwrap(),
        AuthMechanism::CramMd5
    );
}

#[test]
fn test_parse_auth_method() {
    assert_eq!("".parse::<AuthMethod>().unwrap(), AuthMethod::Automatic);
    assert_eq!(
        "digest-md5".parse::<AuthMethod>().unwrap(),
        AuthMethod::Mechanism(AuthMechanism::DigestMd5)
    );
    assert!(matches!(
        "GSSAPI".parse::<AuthMethod>(),
        Err(SieveError::UnsupportedMechanism(_))
    ));
}

#[test]
fn test_plain_message_layout() {
    assert_eq!(sasl::plain_message("", "user", "pass"), b"\0user\0pass");
    assert_eq!(
        sasl::encode_sasl_data(&sasl::plain_message("", "user", "pass")),
        "AHVzZXIAcGFzcw=="
    );
}

#[tokio::test]
async fn test_plain_login_end_to_end() {
    let server = ScriptedServer::start(logged_in("OK \"Logout completed.\"\r\n")).await;
    let mut client = SieveClient::new(server.config());

    client.connect().await.unwrap();
    client.login().await.unwrap();
    assert_eq!(client.state(), ConnectionState::Authenticated);
    client.disconnect(true).await.unwrap();

    assert_eq!(
        server.received().await,
        "CAPABILITY\r\n\
         AUTHENTICATE \"PLAIN\" \"AHVzZXIAcGFzcw==\"\r\n\
         CAPABILITY\r\n\
         LOGOUT\r\n"
    );
}

#[tokio::test]
async fn test_login_mechanism_end_to_end() {
    let server = ScriptedServer::start(format!(
        "{GREETING}{CAPABILITIES}\"VXNlcm5hbWU6\"\r\n\"UGFzc3dvcmQ6\"\r\nOK\r\n{CAPABILITIES}"
    ))
    .await;
    let config = server.config().with_auth_method(AuthMechanism::Login);
    let mut client = SieveClient::new(config);

    client.connect().await.unwrap();
    client.login().await.unwrap();
    drop(client);

    assert_eq!(
        server.received().await,
        "CAPABILITY\r\n\
         AUTHENTICATE \"LOGIN\"\r\n\
         {8+}\r\ndXNlcg==\r\n\
         {8+}\r\ncGFzcw==\r\n\
         CAPABILITY\r\n"
    );
}

#[tokio::test]
async fn test_login_with_replaces_credentials() {
    let server = ScriptedServer::start(logged_in("")).await;
    let mut client = SieveClient::new(server.config());

    client.connect().await.unwrap();
    client
        .login_with("admin", "secret", AuthMechanism::Plain, "alice")
        .await
        .unwrap();
    assert_eq!(client.config().username, "admin");
    drop(client);

    let expected = sasl::encode_sasl_data(b"alice\0admin\0secret");
    assert!(server.received().await.contains(&expected));
}

#[tokio::test]
async fn test_authentication_failure() {
    let server = ScriptedServer::start(format!(
        "{GREETING}{CAPABILITIES}NO \"Authentication failed.\"\r\n"
    ))
    .await;
    let mut client = SieveClient::new(server.config());

    client.connect().await.unwrap();
    let err = client.login().await.unwrap_err();
    match &err {
        SieveError::Protocol { message, .. } => {
            assert_eq!(message, "\"Authentication failed.\"")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.is_no_response());
    assert_eq!(client.state(), ConnectionState::NonAuthenticated);
}

#[tokio::test]
async fn test_open_connects_and_logs_in() {
    let server = ScriptedServer::start(logged_in("")).await;
    let client = SieveClient::open(server.config()).await.unwrap();
    assert!(client.is_authenticated());
}
