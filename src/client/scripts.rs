//! Script management commands (LISTSCRIPTS, GETSCRIPT, PUTSCRIPT, ...)
//!
//! All of these require an authenticated session and fail without any I/O
//! otherwise.

use super::SieveClient;
use super::state::ConnectionState;
use crate::commands;
use crate::error::{Result, SieveError};
use crate::response::{ScriptList, SieveResponse, unescape};
use crate::transport::Connector;
use tracing::trace;

impl<C: Connector> SieveClient<C> {
    fn require_authenticated(&self) -> Result<()> {
        match self.state {
            ConnectionState::Authenticated => Ok(()),
            ConnectionState::NonAuthenticated => Err(SieveError::NotAuthenticated),
            ConnectionState::Disconnected => Err(SieveError::NotConnected),
        }
    }

    /// List the scripts stored on the server
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use managesieve_rs::{SieveClient, ServerConfig};
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut client = SieveClient::open(ServerConfig::new("sieve.example.com", "u", "p")).await?;
    /// let scripts = client.list_scripts().await?;
    /// for name in &scripts.names {
    ///     let marker = if scripts.active.as_deref() == Some(name) { "*" } else { " " };
    ///     println!("{} {}", marker, name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotAuthenticated`] / [`SieveError::NotConnected`]
    /// - [`SieveError::Protocol`] - The server answered `NO` or `BYE`
    pub async fn list_scripts(&mut self) -> Result<ScriptList> {
        self.require_authenticated()?;
        let response = self.run(commands::listscripts()).await?;
        let list = ScriptList::parse(&response.body);
        trace!("Found {} scripts", list.names.len());
        Ok(list)
    }

    /// Name of the active script, if any
    ///
    /// # Errors
    ///
    /// Same as [`list_scripts`](Self::list_scripts).
    pub async fn active_script(&mut self) -> Result<Option<String>> {
        Ok(self.list_scripts().await?.active)
    }

    /// Make `name` the active script
    ///
    /// An empty name deactivates all scripts.
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotAuthenticated`] / [`SieveError::NotConnected`]
    /// - [`SieveError::Protocol`] - The script doesn't exist or the server
    ///   refused
    pub async fn set_active(&mut self, name: &str) -> Result<()> {
        self.require_authenticated()?;
        self.run(&commands::setactive(name)).await?;
        Ok(())
    }

    /// Fetch the source of a script
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotAuthenticated`] / [`SieveError::NotConnected`]
    /// - [`SieveError::Protocol`] - The script doesn't exist
    pub async fn get_script(&mut self, name: &str) -> Result<String> {
        self.require_authenticated()?;
        let response = self.run(&commands::getscript(name)).await?;
        Ok(script_body(response))
    }

    /// Upload a script, optionally making it active
    ///
    /// The script is stored first; activation is a separate SETACTIVE, so a
    /// failed activation leaves the uploaded script in place.
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotAuthenticated`] / [`SieveError::NotConnected`]
    /// - [`SieveError::Protocol`] - The server rejected the script (syntax
    ///   error, quota) or the activation
    pub async fn install_script(&mut self, name: &str, content: &str, make_active: bool) -> Result<()> {
        self.require_authenticated()?;
        self.run(&commands::putscript(name, content)).await?;
        if make_active {
            self.set_active(name).await?;
        }
        Ok(())
    }

    /// Delete a script
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotAuthenticated`] / [`SieveError::NotConnected`]
    /// - [`SieveError::Protocol`] - The script doesn't exist or is active
    pub async fn remove_script(&mut self, name: &str) -> Result<()> {
        self.require_authenticated()?;
        self.run(&commands::deletescript(name)).await?;
        Ok(())
    }

    /// Whether the server has room for a script of `size` bytes
    ///
    /// A `NO` answer means "no room" and yields `Ok(false)`.
    ///
    /// # Errors
    ///
    /// - [`SieveError::NotAuthenticated`] / [`SieveError::NotConnected`]
    /// - Transport failures, `BYE` and referral errors
    pub async fn has_space(&mut self, name: &str, size: u64) -> Result<bool> {
        self.require_authenticated()?;
        match self.run(&commands::havespace(name, size)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_no_response() => {
                trace!("HAVESPACE refused: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Script source from a GETSCRIPT response
///
/// A literal payload is the script itself. Servers that answer with a
/// single quoted string instead get it unquoted.
fn script_body(response: SieveResponse) -> String {
    if response.literal {
        return response.body;
    }
    let trimmed = response.body.trim_end_matches("\r\n");
    if !trimmed.contains("\r\n") {
        if let Some(quoted) = trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return unescape(quoted);
        }
    }
    response.body
}
