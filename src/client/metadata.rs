//! Capability accessors
//!
//! These read the cached CAPABILITY snapshot and perform no I/O, except
//! [`SieveClient::reload_capabilities`].

use super::SieveClient;
use super::state::{ConnectionState, Step};
use crate::capabilities::Capabilities;
use crate::error::{Result, SieveError};
use crate::transport::Connector;

impl<C: Connector> SieveClient<C> {
    fn require_connected(&self) -> Result<()> {
        if self.state == ConnectionState::Disconnected {
            return Err(SieveError::NotConnected);
        }
        Ok(())
    }

    /// Full capability snapshot
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::NotConnected`] while disconnected.
    pub fn capabilities(&self) -> Result<&Capabilities> {
        self.require_connected()?;
        Ok(&self.capabilities)
    }

    /// Sieve extensions supported by the server
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::NotConnected`] while disconnected.
    pub fn extensions(&self) -> Result<&[String]> {
        Ok(&self.capabilities()?.extensions)
    }

    /// Check if the server supports a Sieve extension (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::NotConnected`] while disconnected.
    pub fn has_extension(&self, extension: &str) -> Result<bool> {
        Ok(self.capabilities()?.has_extension(extension))
    }

    /// SASL mechanisms advertised by the server
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::NotConnected`] while disconnected.
    pub fn auth_mechanisms(&self) -> Result<&[String]> {
        Ok(&self.capabilities()?.sasl)
    }

    /// Check if the server advertises a SASL mechanism (case-insensitive)
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::NotConnected`] while disconnected.
    pub fn has_auth_mechanism(&self, mechanism: &str) -> Result<bool> {
        Ok(self.capabilities()?.has_auth_mechanism(mechanism))
    }

    /// Server implementation string
    ///
    /// # Errors
    ///
    /// Returns [`SieveError::NotConnected`] while disconnected.
    pub fn implementation(&self) -> Result<Option<&str>> {
        Ok(self.capabilities()?.implementation.as_deref())
    }

    /// Query CAPABILITY again and return the new snapshot
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotConnected`] - No session is open
    /// - [`SieveError::ConnectionFailed`] - The query failed
    /// - [`SieveError::Referral`] - A referral could not be followed
    pub async fn reload_capabilities(&mut self) -> Result<&Capabilities> {
        self.require_connected()?;
        let mut referrals = 0;
        loop {
            let relogin = self.state == ConnectionState::Authenticated;
            match self.query_capabilities().await? {
                Step::Done(()) => break,
                Step::Referred(target) => {
                    self.follow_referral(target, relogin, &mut referrals).await?;
                }
            }
        }
        Ok(&self.capabilities)
    }
}
