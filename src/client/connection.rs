//! Connection management for the ManageSieve client
//!
//! This module handles session establishment (greeting, CAPABILITY,
//! STARTTLS), orderly disconnects and referral following.

use super::SieveClient;
use super::io::complete;
use super::state::{ConnectionState, Step, follow};
use crate::capabilities::Capabilities;
use crate::commands;
use crate::config::SecurityMode;
use crate::error::{Result, SieveError};
use crate::response::{codes, replace_host, split_authority};
use crate::transport::{Connector, Transport};
use tracing::{debug, warn};

impl<C: Connector> SieveClient<C> {
    /// Connect to the configured server
    ///
    /// Opens the transport, reads the greeting, queries capabilities and
    /// negotiates STARTTLS according to [`ServerConfig::security`]. Does not
    /// log in; call [`login`](Self::login) afterwards.
    ///
    /// With [`ServerConfig::bypass_auth`] the greeting is not read and the
    /// session starts out authenticated.
    ///
    /// [`ServerConfig::security`]: crate::ServerConfig::security
    /// [`ServerConfig::bypass_auth`]: crate::ServerConfig::bypass_auth
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`SieveError::NotDisconnected`] - A session is already open
    /// - [`SieveError::ConnectionFailed`] - The transport could not be opened,
    ///   the capability query failed, or STARTTLS was required but not offered
    /// - [`SieveError::Protocol`] - The server rejected the session (`NO`,
    ///   `BYE`) or the TLS upgrade failed ([`codes::TLS_FAILED`])
    /// - [`SieveError::Referral`] - A referral could not be followed
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::Disconnected {
            return Err(SieveError::NotDisconnected);
        }

        match self.open_session().await {
            Ok(Step::Done(())) => Ok(()),
            Ok(Step::Referred(target)) => {
                let mut referrals = 0;
                self.follow_referral(target, false, &mut referrals).await
            }
            Err(e) => {
                self.shutdown_quietly().await;
                Err(e)
            }
        }
    }

    /// Disconnect from the server
    ///
    /// With `send_logout` a LOGOUT is sent first; the transport is closed
    /// whether or not that succeeds, and a LOGOUT failure is reported
    /// afterwards. A `BYE` in answer to LOGOUT is not an error.
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotConnected`] - No session is open
    /// - Any error returned for the LOGOUT command
    pub async fn disconnect(&mut self, send_logout: bool) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Err(SieveError::NotConnected);
        }

        let result = if send_logout {
            match self.exchange(Some(commands::logout()), false).await {
                Ok(_) => Ok(()),
                Err(e) if e.is_bye() => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            Ok(())
        };

        self.shutdown_quietly().await;
        self.event("Disconnected");
        result
    }

    /// Open the transport and bring the session up to `NonAuthenticated`
    /// (or `Authenticated` when bypassing authentication)
    pub(super) async fn open_session(&mut self) -> Result<Step<()>> {
        debug!(
            "Connecting to ManageSieve server {}:{}",
            self.config.host, self.config.port
        );

        let stream = self
            .connector
            .open(&self.config)
            .await
            .map_err(|e| match e {
                SieveError::ConnectionFailed(_) => e,
                other => SieveError::ConnectionFailed(other.to_string()),
            })?;
        self.stream = Some(stream);
        self.event(&format!(
            "Connected to {}:{}",
            self.config.host, self.config.port
        ));

        if self.config.bypass_auth {
            self.state = ConnectionState::Authenticated;
        } else {
            self.state = ConnectionState::NonAuthenticated;
            follow!(self.exchange(None, false).await?);
        }

        follow!(self.query_capabilities().await?);

        if self.config.security.allows_starttls() && !self.is_tls() {
            if self.capabilities.starttls {
                follow!(self.start_tls().await?);
            } else if self.config.security == SecurityMode::StartTls {
                return Err(SieveError::ConnectionFailed(
                    "STARTTLS required but not offered by the server".to_string(),
                ));
            }
        }

        Ok(Step::Done(()))
    }

    /// Upgrade the session to TLS
    async fn start_tls(&mut self) -> Result<Step<()>> {
        follow!(self.exchange(Some(commands::starttls()), false).await?);

        let stream = self.stream.as_mut().ok_or(SieveError::NotConnected)?;
        if let Err(e) = stream.start_tls().await {
            return Err(SieveError::Protocol {
                code: codes::TLS_FAILED,
                message: format!("Failed to establish TLS connection: {}", e),
            });
        }
        self.event("STARTTLS negotiation successful");

        // RFC 5804 §2.2: the server re-announces its capabilities after the
        // handshake. Older Cyrus timsieved doesn't, so skip the read there.
        if self.capabilities.sends_capability_after_starttls() {
            follow!(self.exchange(None, false).await?);
        }

        self.query_capabilities().await
    }

    /// Issue CAPABILITY and replace the cached snapshot
    ///
    /// A failure is reported as [`SieveError::ConnectionFailed`].
    pub(super) async fn query_capabilities(&mut self) -> Result<Step<()>> {
        let reply = match self.exchange(Some(commands::capability()), false).await {
            Ok(Step::Done(reply)) => reply,
            Ok(Step::Referred(target)) => return Ok(Step::Referred(target)),
            Err(e) => {
                return Err(SieveError::ConnectionFailed(format!(
                    "Failed to parse capabilities: {}",
                    e
                )));
            }
        };
        let response = complete(reply)?;
        self.capabilities = Capabilities::parse(&response.text());
        debug!("Server capabilities: {:?}", self.capabilities);
        Ok(Step::Done(()))
    }

    /// Follow a referral to `target` (`host` or `host:port`)
    ///
    /// Reconnects to the new host, re-authenticating when `relogin` is set,
    /// and keeps following further referrals until the session is up or
    /// `referrals` exceeds [`ServerConfig::max_referrals`].
    ///
    /// [`ServerConfig::max_referrals`]: crate::ServerConfig::max_referrals
    pub(super) async fn follow_referral(
        &mut self,
        target: String,
        relogin: bool,
        referrals: &mut u32,
    ) -> Result<()> {
        let mut target = target;
        loop {
            *referrals += 1;
            if *referrals > self.config.max_referrals {
                warn!("Referral limit of {} reached", self.config.max_referrals);
                return Err(SieveError::Referral(format!(
                    "Max referral count ({}) reached. Cyrus murder loop error?",
                    self.config.max_referrals
                )));
            }

            let (host, port) = split_authority(&target);
            let host = host.to_string();
            self.shutdown_quietly().await;
            self.config.host = replace_host(&self.config.host, &host);
            if let Some(port) = port {
                self.config.port = port;
            }
            self.event(&format!(
                "Following referral to {}:{}",
                self.config.host, self.config.port
            ));

            let result = match self.open_session().await {
                Ok(Step::Done(())) if relogin && !self.config.bypass_auth => {
                    self.authenticate().await
                }
                other => other,
            };

            match result {
                Ok(Step::Done(())) => return Ok(()),
                Ok(Step::Referred(next)) => target = next,
                Err(e) => {
                    self.shutdown_quietly().await;
                    return Err(SieveError::Referral(format!(
                        "Cannot follow referral to {}, the error was: {}",
                        host, e
                    )));
                }
            }
        }
    }
}
