//! Low-level I/O for ManageSieve protocol communication
//!
//! This module provides the primitives every client operation builds on:
//! - Command transmission with `C:` tracing
//! - Line and literal reads with `S:` tracing
//! - The reply reader, which classifies completions, folds literals,
//!   surfaces SASL challenges and turns `BYE` into errors or referrals
//! - The command runner that follows referrals and resends the command

use super::SieveClient;
use super::state::{ConnectionState, Reply, Step};
use crate::error::{Result, SieveError};
use crate::response::{Line, SieveResponse, codes, parse_referral};
use crate::transport::{Connector, Transport};
use tracing::{trace, warn};

/// Largest literal accepted from the server (16 MB)
pub(crate) const MAX_LITERAL_SIZE: usize = 16 * 1024 * 1024;

impl<C: Connector> SieveClient<C> {
    /// Log a protocol line to tracing and the debug handler
    fn wire(&self, prefix: &str, line: &str) {
        trace!("{}{}", prefix, line);
        if let Some(handler) = &self.debug_handler {
            handler(&format!("{}{}", prefix, line));
        }
    }

    /// Send raw command bytes
    pub(super) async fn send(&mut self, command: &str) -> Result<()> {
        if self.stream.is_none() {
            return Err(SieveError::NotConnected);
        }
        for line in command.trim_end_matches("\r\n").split("\r\n") {
            self.wire("C: ", line);
        }
        let stream = self.stream.as_mut().ok_or(SieveError::NotConnected)?;
        stream.write_all(command.as_bytes()).await
    }

    /// Read one line with its terminator removed
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    pub(super) async fn read_line(&mut self) -> Result<String> {
        let stream = self.stream.as_mut().ok_or(SieveError::NotConnected)?;
        let Some(bytes) = stream.read_line().await? else {
            return Err(SieveError::Protocol {
                code: codes::READ_FAILED,
                message: "Failed to read from socket: connection closed by server".to_string(),
            });
        };
        let line = String::from_utf8_lossy(&bytes);
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        self.wire("S: ", &line);
        Ok(line)
    }

    /// Read a literal payload of `len` bytes plus its trailing CRLF
    ///
    /// A length above [`MAX_LITERAL_SIZE`] closes the session, since the
    /// announced bytes are left unread.
    async fn read_literal(&mut self, len: usize) -> Result<Vec<u8>> {
        let total = match len.checked_add(2) {
            Some(total) if len <= MAX_LITERAL_SIZE => total,
            _ => {
                self.shutdown_quietly().await;
                return Err(SieveError::InvalidResponse(format!(
                    "Literal of {} bytes exceeds maximum size of {} bytes",
                    len, MAX_LITERAL_SIZE
                )));
            }
        };
        let stream = self.stream.as_mut().ok_or(SieveError::NotConnected)?;
        let mut data = stream.read_exact(total).await?;
        data.truncate(len);
        self.wire("S: ", String::from_utf8_lossy(&data).trim_end());
        Ok(data)
    }

    /// Append the literal announced by a completion line to its text
    ///
    /// CRLF inside the literal becomes a space so the completion stays on
    /// one line.
    async fn fold_literal(&mut self, text: String, literal: Option<usize>) -> Result<String> {
        let mut text = text;
        if let Some(len) = literal {
            let data = self.read_literal(len).await?;
            text.push_str(&String::from_utf8_lossy(&data).replace("\r\n", " "));
        }
        Ok(text.trim_end().to_string())
    }

    /// Read the server's reply to the last command
    ///
    /// With `auth_step` set, the first untagged line or literal is returned
    /// as a SASL challenge instead of being accumulated.
    ///
    /// # Errors
    ///
    /// - [`SieveError::Protocol`] with [`codes::NO_RESPONSE`] - tagged `NO`
    /// - [`SieveError::Protocol`] with [`codes::BYE`] - `BYE` without referral
    /// - [`SieveError::Protocol`] with [`codes::READ_FAILED`] - stream ended
    pub(super) async fn read_reply(&mut self, auth_step: bool) -> Result<Step<Reply>> {
        let mut body = String::new();

        loop {
            let line = self.read_line().await?;
            match Line::parse(&line) {
                Line::Ok { text, literal } => {
                    let status = self.fold_literal(text, literal).await?;
                    return Ok(Step::Done(Reply::Complete(SieveResponse {
                        body,
                        status,
                        literal: false,
                    })));
                }
                Line::No { text, literal } => {
                    let status = self.fold_literal(text, literal).await?;
                    return Err(no_response(&body, &status));
                }
                Line::Bye(text) => return self.bye(&body, &text).await,
                Line::Literal(len) => {
                    let data = self.read_literal(len).await?;
                    if auth_step {
                        return Ok(Step::Done(Reply::Challenge(String::from_utf8(data)?)));
                    }
                    // Completion is read before decoding the payload
                    let completion = self.read_line().await?;
                    let status = match Line::parse(&completion) {
                        Line::No { text, literal } => {
                            let status = self.fold_literal(text, literal).await?;
                            return Err(no_response(&String::from_utf8_lossy(&data), &status));
                        }
                        Line::Ok { text, literal } => self.fold_literal(text, literal).await?,
                        Line::Bye(text) => return self.bye("", &text).await,
                        _ => completion,
                    };
                    return Ok(Step::Done(Reply::Complete(SieveResponse {
                        body: String::from_utf8(data)?,
                        status,
                        literal: true,
                    })));
                }
                Line::Data(text) if auth_step => {
                    return Ok(Step::Done(Reply::Challenge(text)));
                }
                Line::Data(text) => {
                    body.push_str(&text);
                    body.push_str("\r\n");
                }
            }
        }
    }

    /// Handle a `BYE`: close the session, then report the referral target
    /// or fail with [`codes::BYE`]
    async fn bye(&mut self, body: &str, text: &str) -> Result<Step<Reply>> {
        let referral = parse_referral(text);
        self.shutdown_quietly().await;
        if let Some(target) = referral {
            self.event(&format!("Referral received: {}", target));
            return Ok(Step::Referred(target));
        }
        Err(SieveError::Protocol {
            code: codes::BYE,
            message: format!("{}{}", body, text).trim().to_string(),
        })
    }

    /// Optionally send `command`, then read the reply
    pub(super) async fn exchange(
        &mut self,
        command: Option<&str>,
        auth_step: bool,
    ) -> Result<Step<Reply>> {
        if let Some(command) = command {
            self.send(command).await?;
        }
        self.read_reply(auth_step).await
    }

    /// Run a command to completion, following referrals
    ///
    /// After a referral the session is re-established on the new host,
    /// re-authenticated if it was authenticated before, and the command is
    /// sent again.
    pub(super) async fn run(&mut self, command: &str) -> Result<SieveResponse> {
        let mut referrals = 0;
        loop {
            let relogin = self.state == ConnectionState::Authenticated;
            match self.exchange(Some(command), false).await? {
                Step::Done(reply) => return complete(reply),
                Step::Referred(target) => {
                    self.follow_referral(target, relogin, &mut referrals).await?;
                }
            }
        }
    }

    /// Close the transport, ignoring errors, and mark the session disconnected
    pub(super) async fn shutdown_quietly(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close().await {
                warn!("Error while closing connection: {}", e);
            }
        }
        self.state = ConnectionState::Disconnected;
    }
}

/// Build the error for a tagged `NO`
///
/// The message carries any data the server sent before the completion plus
/// the completion text without the `NO` keyword.
fn no_response(body: &str, status: &str) -> SieveError {
    let text = status.get(2..).unwrap_or_default().trim();
    let message = if body.trim().is_empty() {
        text.to_string()
    } else {
        format!("{} {}", body.trim(), text).trim().to_string()
    };
    SieveError::Protocol {
        code: codes::NO_RESPONSE,
        message,
    }
}

/// Expect a completed reply
pub(super) fn complete(reply: Reply) -> Result<SieveResponse> {
    match reply {
        Reply::Complete(response) => Ok(response),
        Reply::Challenge(challenge) => Err(SieveError::InvalidResponse(format!(
            "Unexpected continuation: {}",
            challenge
        ))),
    }
}

/// Expect a SASL challenge
pub(super) fn challenge(reply: Reply) -> Result<String> {
    match reply {
        Reply::Challenge(challenge) => Ok(challenge),
        Reply::Complete(response) => Err(SieveError::InvalidResponse(format!(
            "Expected a SASL challenge, got: {}",
            response.text()
        ))),
    }
}
