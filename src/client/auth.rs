//! ManageSieve authentication (RFC 5804 §2.1 AUTHENTICATE)

use super::SieveClient;
use super::io::{challenge, complete};
use super::state::{ConnectionState, Reply, Step, follow};
use crate::commands;
use crate::error::{Result, SieveError};
use crate::sasl::{self, AuthMechanism, AuthMethod, CredentialResponder};
use crate::transport::Connector;
use std::sync::Arc;
use tracing::debug;

/// Service name used in the DIGEST-MD5 digest-uri
const SERVICE: &str = "sieve";

impl<C: Connector> SieveClient<C> {
    /// Log in with the credentials from the configuration
    ///
    /// The mechanism is picked according to [`ServerConfig::auth_method`]:
    /// either the strongest mechanism both sides support, or exactly the
    /// pinned one. After a successful exchange the capabilities are queried
    /// again, since servers may announce different ones once authenticated.
    ///
    /// [`ServerConfig::auth_method`]: crate::ServerConfig::auth_method
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use managesieve_rs::{AuthMechanism, SieveClient, ServerConfig};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ServerConfig::new("sieve.example.com", "user", "pass")
    ///     .with_auth_method(AuthMechanism::Plain);
    /// let mut client = SieveClient::new(config);
    /// client.connect().await?;
    /// client.login().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - [`SieveError::NotConnected`] - No session is open
    /// - [`SieveError::AlreadyAuthenticated`] - Already logged in
    /// - [`SieveError::UnsupportedMechanism`] - No common mechanism, or the
    ///   pinned one isn't advertised
    /// - [`SieveError::ResponderUnavailable`] - CRAM-MD5 or DIGEST-MD5 pinned
    ///   without a credential responder
    /// - [`SieveError::Protocol`] - The server rejected the credentials
    /// - [`SieveError::Referral`] - A referral could not be followed
    pub async fn login(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Disconnected => return Err(SieveError::NotConnected),
            ConnectionState::Authenticated => return Err(SieveError::AlreadyAuthenticated),
            ConnectionState::NonAuthenticated => {}
        }

        if self.config.bypass_auth {
            self.state = ConnectionState::Authenticated;
            return Ok(());
        }

        match self.authenticate().await? {
            Step::Done(()) => Ok(()),
            Step::Referred(target) => {
                let mut referrals = 0;
                self.follow_referral(target, true, &mut referrals).await
            }
        }
    }

    /// Log in with explicit credentials
    ///
    /// The credentials replace those in the configuration, so they are
    /// reused when a referral forces a new login.
    ///
    /// # Errors
    ///
    /// Same as [`login`](Self::login).
    pub async fn login_with(
        &mut self,
        username: &str,
        password: &str,
        method: impl Into<AuthMethod>,
        euser: &str,
    ) -> Result<()> {
        self.config.username = username.to_string();
        self.config.password = password.to_string();
        self.config.auth_method = method.into();
        self.config.euser = euser.to_string();
        self.login().await
    }

    /// Run the SASL exchange for the selected mechanism
    ///
    /// On success the session is `Authenticated` and capabilities are
    /// refreshed. On failure the state is unchanged.
    pub(super) async fn authenticate(&mut self) -> Result<Step<()>> {
        let pinned = match self.config.auth_method {
            AuthMethod::Automatic => None,
            AuthMethod::Mechanism(mechanism) => Some(mechanism),
        };
        let mechanism = sasl::select_mechanism(&self.capabilities.sasl, &self.mechanisms, pinned)?;

        debug!(
            "Authenticating as {} using {}",
            self.config.username, mechanism
        );

        let user = self.config.username.clone();
        let password = self.config.password.clone();
        let euser = self.config.euser.clone();

        match mechanism {
            AuthMechanism::Plain => {
                let message = sasl::plain_message(&euser, &user, &password);
                let command =
                    commands::authenticate("PLAIN", Some(&sasl::encode_sasl_data(&message)));
                complete(follow!(self.exchange(Some(&command), false).await?))?;
            }
            AuthMechanism::External => {
                let message = sasl::external_message(&euser, &user);
                let command =
                    commands::authenticate("EXTERNAL", Some(&sasl::encode_sasl_data(message)));
                complete(follow!(self.exchange(Some(&command), false).await?))?;
            }
            AuthMechanism::Login => {
                let command = commands::authenticate("LOGIN", None);
                challenge(follow!(self.exchange(Some(&command), true).await?))?;

                let command = commands::sasl_response(&sasl::encode_sasl_data(user.as_bytes()));
                challenge(follow!(self.exchange(Some(&command), true).await?))?;

                let command =
                    commands::sasl_response(&sasl::encode_sasl_data(password.as_bytes()));
                complete(follow!(self.exchange(Some(&command), false).await?))?;
            }
            AuthMechanism::CramMd5 => {
                let responder = self.credential_responder(mechanism)?;
                let command = commands::authenticate("CRAM-MD5", None);
                let server_challenge =
                    challenge(follow!(self.exchange(Some(&command), true).await?))?;

                let decoded = sasl::decode_challenge(&server_challenge)?;
                let response = responder.cram_md5(&user, &password, &decoded)?;
                let command = commands::sasl_response(&sasl::encode_sasl_data(&response));
                complete(follow!(self.exchange(Some(&command), false).await?))?;
            }
            AuthMechanism::DigestMd5 => {
                let responder = self.credential_responder(mechanism)?;
                let command = commands::authenticate("DIGEST-MD5", None);
                let server_challenge =
                    challenge(follow!(self.exchange(Some(&command), true).await?))?;

                let decoded = sasl::decode_challenge(&server_challenge)?;
                let response = responder.digest_md5(
                    &user,
                    &password,
                    &decoded,
                    self.config.address_host(),
                    SERVICE,
                    &euser,
                )?;
                let command = commands::sasl_response(&sasl::encode_sasl_data(&response));

                // RFC 2831 §2.1.3: the server sends rspauth as a second
                // challenge, which is acknowledged with an empty response.
                match follow!(self.exchange(Some(&command), true).await?) {
                    Reply::Complete(_) => {}
                    Reply::Challenge(_) => {
                        let command = commands::sasl_response("");
                        complete(follow!(self.exchange(Some(&command), false).await?))?;
                    }
                }
            }
        }

        self.state = ConnectionState::Authenticated;
        self.event(&format!("Authenticated as {} using {}", user, mechanism));

        follow!(self.query_capabilities().await?);
        Ok(Step::Done(()))
    }

    fn credential_responder(&self, mechanism: AuthMechanism) -> Result<Arc<dyn CredentialResponder>> {
        self.responder
            .clone()
            .ok_or_else(|| SieveError::ResponderUnavailable(mechanism.to_string()))
    }
}
