//! ManageSieve client implementation with STARTTLS, SASL and referral support

mod auth;
mod connection;
mod io;
mod metadata;
#[cfg(test)]
pub(crate) mod mock;
mod scripts;
mod state;

use crate::capabilities::Capabilities;
use crate::config::ServerConfig;
use crate::error::Result;
use crate::sasl::{AuthMechanism, CredentialResponder, Md5Responder};
use crate::transport::{Connector, TcpConnector, Transport};
pub use state::ConnectionState;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Callback receiving protocol and lifecycle debug lines
pub type DebugHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Async ManageSieve client
///
/// The client owns its transport exclusively and walks the RFC 5804 state
/// machine: `Disconnected` → `NonAuthenticated` → `Authenticated`.
/// Referrals (`BYE (REFERRAL "sieve://host")`) are followed transparently,
/// up to [`ServerConfig::max_referrals`] hops per operation.
///
/// # Example
///
/// ```no_run
/// use managesieve_rs::{SieveClient, ServerConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ServerConfig::new("sieve.example.com", "user", "pass");
/// let mut client = SieveClient::open(config).await?;
///
/// let scripts = client.list_scripts().await?;
/// println!("{} scripts, active: {:?}", scripts.names.len(), scripts.active);
///
/// client.disconnect(true).await?;
/// # Ok(())
/// # }
/// ```
#[must_use]
pub struct SieveClient<C: Connector = TcpConnector> {
    /// Opens transports, also for referrals
    connector: C,
    /// Open transport, `None` while disconnected
    stream: Option<C::Stream>,
    /// Session state
    state: ConnectionState,
    /// Server configuration; host and port change when a referral is followed
    config: ServerConfig,
    /// Last CAPABILITY snapshot
    capabilities: Capabilities,
    /// Mechanisms this client may use, strongest first
    mechanisms: Vec<AuthMechanism>,
    /// Computes CRAM-MD5 and DIGEST-MD5 responses
    responder: Option<Arc<dyn CredentialResponder>>,
    /// Receives `C:`/`S:` lines and lifecycle messages
    debug_handler: Option<DebugHandler>,
}

impl SieveClient<TcpConnector> {
    /// Create a disconnected client that talks TCP/TLS
    ///
    /// No I/O happens until [`connect`](Self::connect) is called.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }

    /// Connect and, unless [`ServerConfig::bypass_auth`] is set, log in
    ///
    /// # Errors
    ///
    /// Returns the first error from [`connect`](Self::connect) or
    /// [`login`](Self::login).
    pub async fn open(config: ServerConfig) -> Result<Self> {
        let mut client = Self::new(config);
        client.connect().await?;
        if !client.config.bypass_auth {
            client.login().await?;
        }
        Ok(client)
    }
}

impl<C: Connector> SieveClient<C> {
    /// Create a disconnected client using a custom [`Connector`]
    pub fn with_connector(config: ServerConfig, connector: C) -> Self {
        Self {
            connector,
            stream: None,
            state: ConnectionState::Disconnected,
            config,
            capabilities: Capabilities::default(),
            mechanisms: AuthMechanism::PREFERENCE.to_vec(),
            responder: Some(Arc::new(Md5Responder)),
            debug_handler: None,
        }
    }

    /// Replace the credential responder used for CRAM-MD5 and DIGEST-MD5
    pub fn with_responder(mut self, responder: impl CredentialResponder + 'static) -> Self {
        self.responder = Some(Arc::new(responder));
        self.mechanisms = AuthMechanism::PREFERENCE.to_vec();
        self
    }

    /// Drop the credential responder
    ///
    /// CRAM-MD5 and DIGEST-MD5 are removed from the supported mechanisms.
    pub fn without_responder(mut self) -> Self {
        self.responder = None;
        self.mechanisms.retain(|m| !m.needs_responder());
        self
    }

    /// Install a callback that receives every line sent and received
    ///
    /// Lines are prefixed `C: ` (client) or `S: ` (server); connection
    /// lifecycle events are reported as plain text.
    pub fn set_debug_handler(&mut self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.debug_handler = Some(Arc::new(handler));
    }

    /// Remove the debug callback
    pub fn clear_debug_handler(&mut self) {
        self.debug_handler = None;
    }

    /// Current session state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the client is currently authenticated
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, ConnectionState::Authenticated)
    }

    /// Whether the transport is currently encrypted
    pub fn is_tls(&self) -> bool {
        self.stream.as_ref().is_some_and(Transport::is_tls)
    }

    /// Active configuration
    ///
    /// After a referral, `host` and `port` reflect the server the client
    /// was redirected to.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Mechanisms this client may use, strongest first
    pub fn supported_mechanisms(&self) -> &[AuthMechanism] {
        &self.mechanisms
    }

    /// Report a lifecycle event to the debug handler
    fn event(&self, message: &str) {
        debug!("{}", message);
        if let Some(handler) = &self.debug_handler {
            handler(message);
        }
    }
}

impl<C: Connector> fmt::Debug for SieveClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SieveClient")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .field("tls", &self.is_tls())
            .finish_non_exhaustive()
    }
}

impl<C: Connector> Drop for SieveClient<C> {
    fn drop(&mut self) {
        debug!("SieveClient dropped in state {}", self.state);
    }
}
