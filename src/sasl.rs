//! SASL authentication support for ManageSieve (RFC 5804 §2.1)
//!
//! Five mechanisms are supported, in order of preference: DIGEST-MD5,
//! CRAM-MD5, EXTERNAL, PLAIN and LOGIN. The two challenge-response
//! mechanisms compute their answers through a [`CredentialResponder`];
//! when the client has no responder they are dropped from the locally
//! supported set before negotiation.
//!
//! # Example
//!
//! ```
//! use managesieve_rs::sasl::{select_mechanism, AuthMechanism};
//!
//! let server = vec!["PLAIN".to_string(), "LOGIN".to_string()];
//! let picked = select_mechanism(&server, &AuthMechanism::PREFERENCE, None).unwrap();
//! assert_eq!(picked, AuthMechanism::Plain);
//! ```

use crate::{Result, SieveError};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// Authentication mechanisms understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthMechanism {
    /// DIGEST-MD5 (RFC 2831)
    DigestMd5,
    /// CRAM-MD5 (RFC 2195)
    CramMd5,
    /// EXTERNAL (RFC 4422 Appendix A)
    External,
    /// PLAIN (RFC 4616)
    Plain,
    /// LOGIN
    Login,
}

impl AuthMechanism {
    /// All mechanisms, strongest first
    pub const PREFERENCE: [AuthMechanism; 5] = [
        AuthMechanism::DigestMd5,
        AuthMechanism::CramMd5,
        AuthMechanism::External,
        AuthMechanism::Plain,
        AuthMechanism::Login,
    ];

    /// Wire name of the mechanism
    pub fn name(&self) -> &'static str {
        match self {
            AuthMechanism::DigestMd5 => "DIGEST-MD5",
            AuthMechanism::CramMd5 => "CRAM-MD5",
            AuthMechanism::External => "EXTERNAL",
            AuthMechanism::Plain => "PLAIN",
            AuthMechanism::Login => "LOGIN",
        }
    }

    /// Whether the mechanism needs a [`CredentialResponder`]
    pub fn needs_responder(&self) -> bool {
        matches!(self, AuthMechanism::DigestMd5 | AuthMechanism::CramMd5)
    }
}

impl fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AuthMechanism {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        AuthMechanism::PREFERENCE
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                SieveError::UnsupportedMechanism(format!(
                    "{} is not a supported authentication method",
                    s
                ))
            })
    }
}

/// Which mechanism `login()` uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuthMethod {
    /// Pick the strongest mechanism both sides support
    #[default]
    Automatic,
    /// Use exactly this mechanism
    Mechanism(AuthMechanism),
}

impl FromStr for AuthMethod {
    type Err = SieveError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("automatic") || s.eq_ignore_ascii_case("auto") {
            Ok(AuthMethod::Automatic)
        } else {
            s.parse().map(AuthMethod::Mechanism)
        }
    }
}

impl From<AuthMechanism> for AuthMethod {
    fn from(mechanism: AuthMechanism) -> Self {
        AuthMethod::Mechanism(mechanism)
    }
}

/// Choose the mechanism to authenticate with
///
/// # Arguments
///
/// * `server` - Mechanisms advertised in the SASL capability
/// * `local` - Mechanisms this client supports, strongest first
/// * `pinned` - Mechanism requested by the caller, if any
///
/// # Errors
///
/// Returns [`SieveError::UnsupportedMechanism`] if the server advertises
/// nothing, if a pinned mechanism isn't advertised, or if no local
/// mechanism is advertised. A pinned mechanism that is advertised but not
/// supported locally yields [`SieveError::ResponderUnavailable`].
pub fn select_mechanism(
    server: &[String],
    local: &[AuthMechanism],
    pinned: Option<AuthMechanism>,
) -> Result<AuthMechanism> {
    if server.is_empty() {
        return Err(SieveError::UnsupportedMechanism(
            "This server doesn't support any authentication methods".to_string(),
        ));
    }

    let advertised = |m: &AuthMechanism| server.iter().any(|s| s.eq_ignore_ascii_case(m.name()));

    if let Some(mechanism) = pinned {
        if !advertised(&mechanism) {
            return Err(SieveError::UnsupportedMechanism(format!(
                "No supported authentication method found. The server supports these methods: {}, but we want to use: {}",
                server.join(", "),
                mechanism
            )));
        }
        if !local.contains(&mechanism) {
            return Err(SieveError::ResponderUnavailable(mechanism.to_string()));
        }
        return Ok(mechanism);
    }

    local.iter().copied().find(advertised).ok_or_else(|| {
        SieveError::UnsupportedMechanism(format!(
            "No supported authentication method found. The server supports these methods: {}, but we only support: {}",
            server.join(", "),
            local
                .iter()
                .map(AuthMechanism::name)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })
}

/// Base64-encode data for a SASL exchange
pub fn encode_sasl_data(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Base64-decode data from a SASL exchange
pub fn decode_sasl_data(encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| SieveError::InvalidResponse(format!("Invalid base64 in SASL challenge: {}", e)))
}

/// Decode a server challenge
///
/// Challenges arrive either as a literal (already unwrapped by the reader)
/// or as a quoted string; surrounding quotes are removed before decoding.
pub fn decode_challenge(challenge: &str) -> Result<Vec<u8>> {
    let challenge = challenge.trim();
    let challenge = challenge
        .strip_prefix('"')
        .and_then(|c| c.strip_suffix('"'))
        .unwrap_or(challenge);
    decode_sasl_data(challenge)
}

/// PLAIN message: `authzid NUL authcid NUL password`
pub fn plain_message(authzid: &str, user: &str, password: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(authzid.len() + user.len() + password.len() + 2);
    message.extend_from_slice(authzid.as_bytes());
    message.push(0);
    message.extend_from_slice(user.as_bytes());
    message.push(0);
    message.extend_from_slice(password.as_bytes());
    message
}

/// EXTERNAL message: the effective user if set, the login user otherwise
pub fn external_message<'a>(euser: &'a str, user: &'a str) -> &'a [u8] {
    if euser.is_empty() {
        user.as_bytes()
    } else {
        euser.as_bytes()
    }
}

/// Computes responses for the challenge-response mechanisms
///
/// Implementations receive decoded challenges and return raw responses;
/// the client takes care of base64 and literal framing.
pub trait CredentialResponder: Send + Sync {
    /// CRAM-MD5 response to `challenge`
    fn cram_md5(&self, user: &str, password: &str, challenge: &[u8]) -> Result<Vec<u8>>;

    /// DIGEST-MD5 response to `challenge`
    ///
    /// `host` and `service` form the digest-uri; `authzid` is the effective
    /// user (empty for none).
    fn digest_md5(
        &self,
        user: &str,
        password: &str,
        challenge: &[u8],
        host: &str,
        service: &str,
        authzid: &str,
    ) -> Result<Vec<u8>>;
}

/// Default [`CredentialResponder`] built on HMAC-MD5 and MD5
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Responder;

type HmacMd5 = Hmac<Md5>;

impl CredentialResponder for Md5Responder {
    fn cram_md5(&self, user: &str, password: &str, challenge: &[u8]) -> Result<Vec<u8>> {
        let mut mac = HmacMd5::new_from_slice(password.as_bytes())
            .map_err(|e| SieveError::InvalidResponse(format!("CRAM-MD5 key: {}", e)))?;
        mac.update(challenge);
        let digest = mac.finalize().into_bytes();
        Ok(format!("{} {}", user, hex(&digest)).into_bytes())
    }

    fn digest_md5(
        &self,
        user: &str,
        password: &str,
        challenge: &[u8],
        host: &str,
        service: &str,
        authzid: &str,
    ) -> Result<Vec<u8>> {
        let mut cnonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cnonce);
        let cnonce = encode_sasl_data(&cnonce);
        digest_md5_response(user, password, challenge, host, service, authzid, &cnonce)
    }
}

/// Parse a DIGEST-MD5 challenge into key/value pairs
fn parse_digest_challenge(challenge: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = challenge.trim();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else {
            break;
        };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_ascii_lowercase();
        rest = &rest[eq + 1..];

        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut escaped = false;
            let mut end = quoted.len();
            for (i, c) in quoted.char_indices() {
                if escaped {
                    out.push(c);
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    end = i + 1;
                    break;
                } else {
                    out.push(c);
                }
            }
            value = out;
            rest = &quoted[end.min(quoted.len())..];
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = &rest[end..];
        }

        pairs.push((key, value));
        rest = rest.trim_start().trim_start_matches(',').trim_start();
    }

    pairs
}

fn digest_md5_response(
    user: &str,
    password: &str,
    challenge: &[u8],
    host: &str,
    service: &str,
    authzid: &str,
    cnonce: &str,
) -> Result<Vec<u8>> {
    let challenge = String::from_utf8_lossy(challenge);
    let pairs = parse_digest_challenge(&challenge);
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let nonce = get("nonce").ok_or_else(|| {
        SieveError::InvalidResponse("DIGEST-MD5 challenge without nonce".to_string())
    })?;
    if let Some(qop) = get("qop") {
        if !qop.split(',').any(|q| q.trim().eq_ignore_ascii_case("auth")) {
            return Err(SieveError::InvalidResponse(format!(
                "DIGEST-MD5 server doesn't offer qop=auth: {}",
                qop
            )));
        }
    }
    let realm = get("realm").unwrap_or("");
    let utf8 = get("charset").is_some_and(|c| c.eq_ignore_ascii_case("utf-8"));

    let nc = "00000001";
    let qop = "auth";
    let digest_uri = format!("{}/{}", service, host);

    let mut a1 = Md5::digest(format!("{}:{}:{}", user, realm, password).as_bytes()).to_vec();
    a1.extend_from_slice(format!(":{}:{}", nonce, cnonce).as_bytes());
    if !authzid.is_empty() {
        a1.extend_from_slice(format!(":{}", authzid).as_bytes());
    }
    let a2 = format!("AUTHENTICATE:{}", digest_uri);

    let ha1 = hex(&Md5::digest(&a1));
    let ha2 = hex(&Md5::digest(a2.as_bytes()));
    let response = hex(&Md5::digest(
        format!("{}:{}:{}:{}:{}:{}", ha1, nonce, nc, cnonce, qop, ha2).as_bytes(),
    ));

    let mut out = String::new();
    if utf8 {
        out.push_str("charset=utf-8,");
    }
    out.push_str(&format!("username=\"{}\"", quote_digest_value(user)));
    if !realm.is_empty() {
        out.push_str(&format!(",realm=\"{}\"", quote_digest_value(realm)));
    }
    out.push_str(&format!(
        ",nonce=\"{}\",cnonce=\"{}\",nc={},qop={},digest-uri=\"{}\",response={}",
        quote_digest_value(nonce),
        cnonce,
        nc,
        qop,
        digest_uri,
        response
    ));
    if !authzid.is_empty() {
        out.push_str(&format!(",authzid=\"{}\"", quote_digest_value(authzid)));
    }

    Ok(out.into_bytes())
}

fn quote_digest_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
