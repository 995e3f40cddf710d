//! Connection state types for the ManageSieve client

use std::fmt;

/// ManageSieve session state
///
/// Tracks the progress of a session according to RFC 5804. Script
/// commands are only accepted in [`ConnectionState::Authenticated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport open
    #[default]
    Disconnected,
    /// Connected, greeting and capabilities read, not logged in
    NonAuthenticated,
    /// Logged in (or authentication bypassed)
    Authenticated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::NonAuthenticated => "NON-AUTHENTICATED",
            ConnectionState::Authenticated => "AUTHENTICATED",
        })
    }
}

/// Outcome of one protocol step
///
/// A step either completes or is redirected to another host by a
/// `BYE (REFERRAL ...)`, in which case the transport has already been
/// dropped and the caller decides whether to follow.
#[derive(Debug)]
pub(super) enum Step<T> {
    Done(T),
    Referred(String),
}

/// Reply to a command, as seen by the reader
#[derive(Debug)]
pub(super) enum Reply {
    /// Tagged OK completion
    Complete(crate::response::SieveResponse),
    /// SASL continuation from the server (base64, possibly quoted)
    Challenge(String),
}

/// Unwrap a [`Step`], handing a referral back to the caller
macro_rules! follow {
    ($step:expr) => {
        match $step {
            $crate::client::state::Step::Done(value) => value,
            $crate::client::state::Step::Referred(target) => {
                return Ok($crate::client::state::Step::Referred(target));
            }
        }
    };
}

pub(super) use follow;
