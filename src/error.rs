//! ManageSieve error types

use crate::response::codes;
use thiserror::Error;

/// ManageSieve protocol and connection errors
#[derive(Error, Debug)]
pub enum SieveError {
    /// IO error during network operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS error during secure connection
    #[error("TLS error: {0}")]
    Tls(String),

    /// Connection, read or handshake timeout
    #[error("Connection timeout")]
    Timeout,

    /// The transport could not be opened, or the session could not be set up
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly
    #[error("Connection closed")]
    ConnectionClosed,

    /// Command issued while disconnected
    #[error("Not currently connected")]
    NotConnected,

    /// `connect()` issued while a connection is already open
    #[error("Not currently in DISCONNECTED state")]
    NotDisconnected,

    /// Command requires an authenticated session
    #[error("Not currently in AUTHENTICATED state")]
    NotAuthenticated,

    /// `login()` issued on an authenticated session
    #[error("Already authenticated")]
    AlreadyAuthenticated,

    /// Referral could not be followed, or the referral limit was reached
    #[error("Referral error: {0}")]
    Referral(String),

    /// ManageSieve protocol error
    ///
    /// `code` is one of the constants in [`crate::codes`] and tells a NO
    /// response apart from a BYE, a failed TLS negotiation or a failed read.
    #[error("ManageSieve error {code}: {message}")]
    Protocol {
        /// Error sub-code (see [`crate::codes`])
        code: u16,
        /// Text supplied by the server
        message: String,
    },

    /// Response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// No usable authentication mechanism
    #[error("Unsupported authentication method: {0}")]
    UnsupportedMechanism(String),

    /// DIGEST-MD5 or CRAM-MD5 requested without a credential responder
    #[error("{0} requires a credential responder, none is configured")]
    ResponderUnavailable(String),

    /// UTF-8 decoding error
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl SieveError {
    /// Whether this error is a tagged `NO` response from the server
    pub fn is_no_response(&self) -> bool {
        matches!(self, SieveError::Protocol { code, .. } if *code == codes::NO_RESPONSE)
    }

    /// Whether this error was caused by a `BYE` without a referral
    pub fn is_bye(&self) -> bool {
        matches!(self, SieveError::Protocol { code, .. } if *code == codes::BYE)
    }
}

/// Result type alias using SieveError
pub type Result<T> = std::result::Result<T, SieveError>;
