//! ManageSieve server configuration

use crate::sasl::AuthMethod;
use crate::SieveError;
use std::str::FromStr;
use std::time::Duration;

/// Default ManageSieve port (RFC 5804)
pub const DEFAULT_PORT: u16 = 4190;

/// Default timeout for connecting, TLS handshakes and reads
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on consecutive referrals followed for one operation
pub const DEFAULT_MAX_REFERRALS: u32 = 15;

/// How the connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SecurityMode {
    /// Never encrypt
    Plain,
    /// Upgrade with STARTTLS when the server offers it
    #[default]
    Opportunistic,
    /// Require STARTTLS; fail if the server doesn't offer it
    StartTls,
    /// TLS from the first byte (no STARTTLS)
    ImplicitTls,
}

impl SecurityMode {
    /// Whether STARTTLS may be attempted in this mode
    pub fn allows_starttls(&self) -> bool {
        matches!(self, SecurityMode::Opportunistic | SecurityMode::StartTls)
    }
}

impl From<bool> for SecurityMode {
    /// `true` means "TLS if available", `false` means no encryption
    fn from(use_tls: bool) -> Self {
        if use_tls {
            SecurityMode::Opportunistic
        } else {
            SecurityMode::Plain
        }
    }
}

impl FromStr for SecurityMode {
    type Err = SieveError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "true" | "auto" => Ok(SecurityMode::Opportunistic),
            "false" | "none" | "plain" => Ok(SecurityMode::Plain),
            "tls" | "tlsv1" | "starttls" => Ok(SecurityMode::StartTls),
            "ssl" | "sslv2" | "sslv23" | "sslv3" => Ok(SecurityMode::ImplicitTls),
            other => Err(SieveError::ConnectionFailed(format!(
                "Unknown security mode: {}",
                other
            ))),
        }
    }
}

/// ManageSieve server configuration
///
/// Contains everything needed to connect to a server and log in.
///
/// # Example
///
/// ```
/// use managesieve_rs::{SecurityMode, ServerConfig};
///
/// // Recommended: use the constructor methods
/// let config = ServerConfig::starttls("sieve.example.com", "user", "pass");
///
/// // Optional settings use the builder-style helpers
/// let config = ServerConfig::new("sieve.example.com", "admin", "pass")
///     .with_effective_user("alice")
///     .with_security(SecurityMode::ImplicitTls);
/// assert_eq!(config.euser, "alice");
/// ```
#[must_use]
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerConfig {
    /// Server hostname (e.g., "sieve.example.com")
    ///
    /// A `scheme://` prefix is kept as-is when a referral replaces the host,
    /// and ignored for address resolution.
    pub host: String,

    /// Server port (4190 by default)
    #[cfg_attr(feature = "serde", serde(default = "default_port"))]
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Password for authentication
    pub password: String,

    /// Mechanism selection for `login()`
    #[cfg_attr(feature = "serde", serde(default))]
    pub auth_method: AuthMethod,

    /// Effective user to act on behalf of (proxy authorization)
    ///
    /// Empty for none.
    #[cfg_attr(feature = "serde", serde(default))]
    pub euser: String,

    /// Skip authentication and treat the session as already authenticated
    ///
    /// Used when picking up a channel that was authenticated elsewhere.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bypass_auth: bool,

    /// Transport security
    #[cfg_attr(feature = "serde", serde(default))]
    pub security: SecurityMode,

    /// Allow insecure TLS connections (self-signed certificates, expired certificates)
    ///
    /// **Security Warning:** Setting this to `true` disables certificate validation,
    /// making your connection vulnerable to man-in-the-middle attacks. Only use this
    /// for testing or with servers you trust on a secure network.
    ///
    /// Default: `false` (secure certificate validation enabled)
    #[cfg_attr(feature = "serde", serde(default))]
    pub allow_insecure_tls: bool,

    /// Timeout applied to connecting, the TLS handshake and every read
    #[cfg_attr(feature = "serde", serde(default = "default_timeout"))]
    pub timeout: Duration,

    /// Maximum number of consecutive referrals followed for one operation
    #[cfg_attr(feature = "serde", serde(default = "default_max_referrals"))]
    pub max_referrals: u32,
}

#[cfg(feature = "serde")]
fn default_port() -> u16 {
    DEFAULT_PORT
}

#[cfg(feature = "serde")]
fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

#[cfg(feature = "serde")]
fn default_max_referrals() -> u32 {
    DEFAULT_MAX_REFERRALS
}

impl ServerConfig {
    /// Create a configuration on the default port with opportunistic STARTTLS
    ///
    /// # Arguments
    ///
    /// * `host` - Server hostname
    /// * `username` - Authentication username
    /// * `password` - Authentication password
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            auth_method: AuthMethod::Automatic,
            euser: String::new(),
            bypass_auth: false,
            security: SecurityMode::Opportunistic,
            allow_insecure_tls: false,
            timeout: DEFAULT_TIMEOUT,
            max_referrals: DEFAULT_MAX_REFERRALS,
        }
    }

    /// Create a configuration that requires STARTTLS
    pub fn starttls(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, username, password).with_security(SecurityMode::StartTls)
    }

    /// Create a configuration for a TLS connection from the first byte
    pub fn tls(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, username, password).with_security(SecurityMode::ImplicitTls)
    }

    /// Create a configuration for an unencrypted connection
    ///
    /// **Warning:** Plain connections transmit credentials in clear text.
    /// Use STARTTLS whenever possible.
    pub fn plain(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(host, username, password).with_security(SecurityMode::Plain)
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the mechanism selection
    pub fn with_auth_method(mut self, method: impl Into<AuthMethod>) -> Self {
        self.auth_method = method.into();
        self
    }

    /// Set the effective user
    pub fn with_effective_user(mut self, euser: impl Into<String>) -> Self {
        self.euser = euser.into();
        self
    }

    /// Treat the session as authenticated without logging in
    pub fn with_bypass_auth(mut self, bypass: bool) -> Self {
        self.bypass_auth = bypass;
        self
    }

    /// Set the transport security mode
    pub fn with_security(mut self, security: impl Into<SecurityMode>) -> Self {
        self.security = security.into();
        self
    }

    /// Accept any TLS certificate
    ///
    /// **Security Warning:** see [`ServerConfig::allow_insecure_tls`].
    pub fn with_insecure_tls(mut self) -> Self {
        self.allow_insecure_tls = true;
        self
    }

    /// Set the connect/read timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the referral limit
    pub fn with_max_referrals(mut self, max_referrals: u32) -> Self {
        self.max_referrals = max_referrals;
        self
    }

    /// Hostname used for address resolution and TLS server name
    ///
    /// Strips any `scheme://` prefix from [`ServerConfig::host`].
    pub fn address_host(&self) -> &str {
        match self.host.find("://") {
            Some(pos) => &self.host[pos + 3..],
            None => &self.host,
        }
    }

    /// Whether credentials were supplied
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}
