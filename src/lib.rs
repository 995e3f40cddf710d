#![doc = include_str!("../README.md")]

mod capabilities;
mod client;
/// ManageSieve command builders
pub mod commands;
mod config;
mod error;
mod response;
/// SASL mechanisms and credential responders (RFC 5804 §2.1)
pub mod sasl;
/// Transports: TCP, STARTTLS and implicit TLS
pub mod transport;

pub use capabilities::Capabilities;
pub use client::{ConnectionState, DebugHandler, SieveClient};
pub use config::{DEFAULT_MAX_REFERRALS, DEFAULT_PORT, DEFAULT_TIMEOUT, SecurityMode, ServerConfig};
pub use error::{Result, SieveError};
pub use response::{ScriptList, SieveResponse, codes};
pub use sasl::{AuthMechanism, AuthMethod, CredentialResponder, Md5Responder};
pub use transport::{Connector, TcpConnector, TcpTransport, Transport};
