//! Byte-stream transport for ManageSieve connections
//!
//! The client talks to the network only through the [`Connector`] and
//! [`Transport`] traits. [`TcpConnector`] is the default implementation:
//! a TCP socket, optionally wrapped in TLS from the start or upgraded
//! later with STARTTLS.

use crate::config::{SecurityMode, ServerConfig};
use crate::error::{Result, SieveError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tracing::{debug, warn};

/// Opens transports to a server
pub trait Connector: Send + Sync {
    /// Stream type produced by this connector
    type Stream: Transport;

    /// Open a connection to `config.host`/`config.port`
    ///
    /// With [`SecurityMode::ImplicitTls`] the returned stream is already
    /// encrypted.
    fn open(&self, config: &ServerConfig) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Duplex byte stream used by the client
pub trait Transport: Send {
    /// Write `data` and flush
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Read one line including its terminator; `None` at end of stream
    fn read_line(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Read exactly `len` bytes
    fn read_exact(&mut self, len: usize) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Renegotiate the stream under TLS
    fn start_tls(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Whether the stream is encrypted
    fn is_tls(&self) -> bool;

    /// Shut the stream down
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Dangerous certificate verifier that accepts all certificates
///
/// **Security Warning:** This verifier disables all certificate validation,
/// making connections vulnerable to man-in-the-middle attacks. Only use this
/// for testing or with servers you trust on a secure network.
#[derive(Debug)]
pub(crate) struct DangerousAcceptAnyCertificate;

impl ServerCertVerifier for DangerousAcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

fn tls_connector(allow_insecure_tls: bool) -> TlsConnector {
    use tokio_rustls::rustls::crypto::{CryptoProvider, ring};
    let _ = CryptoProvider::install_default(ring::default_provider());

    let tls_config = if allow_insecure_tls {
        warn!("TLS certificate validation disabled - connection vulnerable to MITM attacks");
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousAcceptAnyCertificate))
            .with_no_client_auth()
    } else {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    };

    TlsConnector::from(Arc::new(tls_config))
}

async fn handshake(
    tcp: TcpStream,
    host: &str,
    allow_insecure_tls: bool,
    timeout_duration: Duration,
) -> Result<TlsStream<TcpStream>> {
    let connector = tls_connector(allow_insecure_tls);
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| SieveError::Tls(format!("Invalid domain: {}", e)))?;

    timeout(timeout_duration, connector.connect(server_name, tcp))
        .await
        .map_err(|_| SieveError::Timeout)?
        .map_err(|e| SieveError::Tls(format!("TLS handshake failed: {}", e)))
}

/// Default connector: TCP with optional TLS via rustls
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpTransport;

    async fn open(&self, config: &ServerConfig) -> Result<TcpTransport> {
        let host = config.address_host().to_string();
        debug!("Connecting to ManageSieve server {}:{}", host, config.port);

        let addr = format!("{}:{}", host, config.port);
        let socket_addr = tokio::net::lookup_host(addr.as_str())
            .await
            .map_err(|e| SieveError::ConnectionFailed(format!("Failed to resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| SieveError::ConnectionFailed(format!("No address resolved for {}", addr)))?;

        use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
        let domain = if socket_addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

        // Request/response protocol: small writes must go out immediately
        socket.set_nodelay(true)?;
        if let Err(e) = socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(Duration::from_secs(60))) {
            warn!("Failed to enable TCP keepalive: {}", e);
        }

        // socket2::Socket::connect() is blocking; connect before switching to non-blocking
        let tcp_stream = timeout(
            config.timeout,
            tokio::task::spawn_blocking(move || -> std::io::Result<std::net::TcpStream> {
                socket.connect(&socket_addr.into())?;
                socket.set_nonblocking(true)?;
                Ok(socket.into())
            }),
        )
        .await
        .map_err(|_| SieveError::Timeout)?
        .map_err(|e| SieveError::Io(std::io::Error::other(format!("Task join error: {}", e))))?
        .map_err(|e| SieveError::ConnectionFailed(format!("Failed to connect to {}: {}", addr, e)))?;

        let tcp_stream = TcpStream::from_std(tcp_stream)?;

        let stream = if config.security == SecurityMode::ImplicitTls {
            let tls = handshake(tcp_stream, &host, config.allow_insecure_tls, config.timeout).await?;
            debug!("TLS established with {}", host);
            SieveStream::Tls(Box::new(BufReader::new(tls)))
        } else {
            SieveStream::Plain(BufReader::new(tcp_stream))
        };

        Ok(TcpTransport {
            stream,
            host,
            allow_insecure_tls: config.allow_insecure_tls,
            timeout: config.timeout,
        })
    }
}

/// A stream that is either plaintext or TLS
enum SieveStream {
    /// Plaintext TCP stream
    Plain(BufReader<TcpStream>),
    /// TLS-encrypted stream (boxed to reduce enum size)
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
    /// Stream taken out during a TLS upgrade that failed, or after close
    Detached,
}

/// TCP transport produced by [`TcpConnector`]
pub struct TcpTransport {
    stream: SieveStream,
    host: String,
    allow_insecure_tls: bool,
    timeout: Duration,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("host", &self.host)
            .field("tls", &self.is_tls())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TcpTransport {
    fn detached() -> SieveError {
        SieveError::ConnectionClosed
    }
}

impl Transport for TcpTransport {
    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match &mut self.stream {
            SieveStream::Plain(s) => {
                s.get_mut().write_all(data).await?;
                s.get_mut().flush().await?;
            }
            SieveStream::Tls(s) => {
                s.get_mut().write_all(data).await?;
                s.get_mut().flush().await?;
            }
            SieveStream::Detached => return Err(Self::detached()),
        }
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::with_capacity(256);
        let read = match &mut self.stream {
            SieveStream::Plain(s) => timeout(self.timeout, s.read_until(b'\n', &mut line)).await,
            SieveStream::Tls(s) => timeout(self.timeout, s.read_until(b'\n', &mut line)).await,
            SieveStream::Detached => return Err(Self::detached()),
        };
        let n = read.map_err(|_| SieveError::Timeout)??;
        if n == 0 { Ok(None) } else { Ok(Some(line)) }
    }

    async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        let read = match &mut self.stream {
            SieveStream::Plain(s) => timeout(self.timeout, s.read_exact(&mut data)).await,
            SieveStream::Tls(s) => timeout(self.timeout, s.read_exact(&mut data)).await,
            SieveStream::Detached => return Err(Self::detached()),
        };
        match read.map_err(|_| SieveError::Timeout)? {
            Ok(_) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(SieveError::ConnectionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn start_tls(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.stream, SieveStream::Detached) {
            SieveStream::Plain(reader) => {
                let tcp = reader.into_inner();
                let tls = handshake(tcp, &self.host, self.allow_insecure_tls, self.timeout).await?;
                self.stream = SieveStream::Tls(Box::new(BufReader::new(tls)));
                Ok(())
            }
            tls @ SieveStream::Tls(_) => {
                self.stream = tls;
                Err(SieveError::Tls("Stream is already TLS".to_string()))
            }
            SieveStream::Detached => Err(Self::detached()),
        }
    }

    fn is_tls(&self) -> bool {
        matches!(self.stream, SieveStream::Tls(_))
    }

    async fn close(&mut self) -> Result<()> {
        let result = match &mut self.stream {
            SieveStream::Plain(s) => s.get_mut().shutdown().await,
            SieveStream::Tls(s) => s.get_mut().shutdown().await,
            SieveStream::Detached => Ok(()),
        };
        self.stream = SieveStream::Detached;
        result.map_err(SieveError::from)
    }
}
