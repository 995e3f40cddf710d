//! Scripted in-memory transport for client tests
//!
//! Each call to [`Connector::open`] consumes the next scripted session: the
//! bytes the server will send on that connection. ManageSieve is strictly
//! request/response, so server output can be laid out up front. Every write
//! and every opened host is recorded for assertions.

use super::SieveClient;
use crate::config::ServerConfig;
use crate::error::{Result, SieveError};
use crate::transport::{Connector, Transport};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    sessions: VecDeque<Vec<u8>>,
    opened: Vec<(String, u16)>,
    writes: Vec<String>,
    tls_upgrades: usize,
    closed: usize,
    remaining: usize,
    fail_tls: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    recorder: Arc<Mutex<Recorder>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue the server output for the next connection
    pub(crate) fn session(self, server_output: &str) -> Self {
        self.session_bytes(server_output.as_bytes())
    }

    /// Queue raw server output, which need not be valid UTF-8
    pub(crate) fn session_bytes(self, server_output: &[u8]) -> Self {
        self.recorder
            .lock()
            .unwrap()
            .sessions
            .push_back(server_output.to_vec());
        self
    }

    /// Make every STARTTLS handshake fail
    pub(crate) fn fail_tls(self) -> Self {
        self.recorder.lock().unwrap().fail_tls = true;
        self
    }

    pub(crate) fn opened(&self) -> Vec<(String, u16)> {
        self.recorder.lock().unwrap().opened.clone()
    }

    pub(crate) fn writes(&self) -> Vec<String> {
        self.recorder.lock().unwrap().writes.clone()
    }

    pub(crate) fn tls_upgrades(&self) -> usize {
        self.recorder.lock().unwrap().tls_upgrades
    }

    pub(crate) fn closed(&self) -> usize {
        self.recorder.lock().unwrap().closed
    }

    /// Unread bytes on the most recent connection
    pub(crate) fn remaining(&self) -> usize {
        self.recorder.lock().unwrap().remaining
    }
}

impl Connector for MockConnector {
    type Stream = MockTransport;

    async fn open(&self, config: &ServerConfig) -> Result<MockTransport> {
        let mut recorder = self.recorder.lock().unwrap();
        recorder
            .opened
            .push((config.address_host().to_string(), config.port));
        let input = recorder.sessions.pop_front().ok_or_else(|| {
            SieveError::ConnectionFailed(format!("{}: connection refused", config.host))
        })?;
        recorder.remaining = input.len();
        Ok(MockTransport {
            input: input.into(),
            recorder: self.recorder.clone(),
            tls: false,
        })
    }
}

pub(crate) struct MockTransport {
    input: VecDeque<u8>,
    recorder: Arc<Mutex<Recorder>>,
    tls: bool,
}

impl MockTransport {
    fn take(&mut self, len: usize) -> Vec<u8> {
        let data: Vec<u8> = self.input.drain(..len).collect();
        self.recorder.lock().unwrap().remaining = self.input.len();
        data
    }
}

impl Transport for MockTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.recorder
            .lock()
            .unwrap()
            .writes
            .push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        if self.input.is_empty() {
            return Ok(None);
        }
        let len = self
            .input
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.input.len(), |pos| pos + 1);
        Ok(Some(self.take(len)))
    }

    async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        if self.input.len() < len {
            return Err(SieveError::ConnectionClosed);
        }
        Ok(self.take(len))
    }

    async fn start_tls(&mut self) -> Result<()> {
        let mut recorder = self.recorder.lock().unwrap();
        if recorder.fail_tls {
            return Err(SieveError::Tls("handshake failed".to_string()));
        }
        recorder.tls_upgrades += 1;
        self.tls = true;
        Ok(())
    }

    fn is_tls(&self) -> bool {
        self.tls
    }

    async fn close(&mut self) -> Result<()> {
        self.recorder.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Client for `sieve.example.com` as `user`/`pass` with opportunistic STARTTLS
pub(crate) fn client(connector: MockConnector) -> SieveClient<MockConnector> {
    client_with(
        ServerConfig::new("sieve.example.com", "user", "pass"),
        connector,
    )
}

pub(crate) fn client_with(
    config: ServerConfig,
    connector: MockConnector,
) -> SieveClient<MockConnector> {
    SieveClient::with_connector(config, connector)
}

/// Server output for greeting, CAPABILITY and a successful PLAIN login,
/// followed by `rest`
pub(crate) fn authenticated_session(rest: &str) -> String {
    const CAPS: &str = "\"IMPLEMENTATION\" \"Mock Sieve\"\r\n\"SASL\" \"PLAIN\"\r\n\"SIEVE\" \"fileinto vacation\"\r\nOK\r\n";
    format!("{CAPS}{CAPS}OK\r\n{CAPS}{rest}")
}
