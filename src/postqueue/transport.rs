//! Transport Abstraction
//!
//! The producer only needs "open a fresh byte stream to showq". Keeping
//! that behind a trait lets tests serve a listing from memory while
//! production dials the Postfix socket.

use std::future::Future;
use std::io::Result as IoResult;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio::net::{TcpStream, UnixStream};

/// Default location of the showq socket in a stock Postfix install
pub const DEFAULT_SHOWQ_PATH: &str = "/var/spool/postfix/public/showq";

/// Opens one connection per snapshot pass
pub trait Transport: Send + Sync + 'static {
    type Stream: AsyncRead + Unpin + Send + 'static;

    fn connect(&self) -> Pin<Box<dyn Future<Output = IoResult<Self::Stream>> + Send + '_>>;

    /// Human-readable endpoint for log lines
    fn endpoint(&self) -> String;
}

/// showq on a local Unix domain socket
#[derive(Debug, Clone)]
pub struct UnixSocketTransport {
    path: PathBuf,
}

impl UnixSocketTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        UnixSocketTransport { path: path.into() }
    }
}

impl Default for UnixSocketTransport {
    fn default() -> Self {
        Self::new(DEFAULT_SHOWQ_PATH)
    }
}

impl Transport for UnixSocketTransport {
    type Stream = UnixStream;

    fn connect(&self) -> Pin<Box<dyn Future<Output = IoResult<UnixStream>> + Send + '_>> {
        Box::pin(UnixStream::connect(&self.path))
    }

    fn endpoint(&self) -> String {
        format!("unix:{}", self.path.display())
    }
}

/// showq relayed over TCP (e.g. through socat from a container)
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        TcpTransport { addr: addr.into() }
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    fn connect(&self) -> Pin<Box<dyn Future<Output = IoResult<TcpStream>> + Send + '_>> {
        Box::pin(TcpStream::connect(self.addr.as_str()))
    }

    fn endpoint(&self) -> String {
        format!("tcp:{}", self.addr)
    }
}

/// Configured showq endpoint.
///
/// Accepts `unix:/path`, `tcp:host:port`, or a bare filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowqAddress {
    Unix(PathBuf),
    Tcp(String),
}

impl std::str::FromStr for ShowqAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(addr) = s.strip_prefix("tcp:") {
            let addr = addr.trim_start_matches("//");
            match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(ShowqAddress::Tcp(addr.to_string()))
                }
                _ => Err(format!("expected tcp:HOST:PORT, got `{}`", s)),
            }
        } else {
            let path = s.strip_prefix("unix:").unwrap_or(s);
            if path.is_empty() {
                return Err("showq path must not be empty".to_string());
            }
            Ok(ShowqAddress::Unix(PathBuf::from(path)))
        }
    }
}

impl std::fmt::Display for ShowqAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShowqAddress::Unix(path) => write!(f, "unix:{}", path.display()),
            ShowqAddress::Tcp(addr) => write!(f, "tcp:{}", addr),
        }
    }
}

/// Either transport, chosen at startup from configuration
#[derive(Debug, Clone)]
pub enum AnyTransport {
    Unix(UnixSocketTransport),
    Tcp(TcpTransport),
}

/// Stream returned by [`AnyTransport`]
#[derive(Debug)]
pub enum AnyStream {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl AsyncRead for AnyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<IoResult<()>> {
        match self.get_mut() {
            AnyStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
            AnyStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl From<&ShowqAddress> for AnyTransport {
    fn from(addr: &ShowqAddress) -> Self {
        match addr {
            ShowqAddress::Unix(path) => AnyTransport::Unix(UnixSocketTransport::new(path.clone())),
            ShowqAddress::Tcp(addr) => AnyTransport::Tcp(TcpTransport::new(addr.clone())),
        }
    }
}

impl Transport for AnyTransport {
    type Stream = AnyStream;

    fn connect(&self) -> Pin<Box<dyn Future<Output = IoResult<AnyStream>> + Send + '_>> {
        Box::pin(async move {
            match self {
                AnyTransport::Unix(t) => t.connect().await.map(AnyStream::Unix),
                AnyTransport::Tcp(t) => t.connect().await.map(AnyStream::Tcp),
            }
        })
    }

    fn endpoint(&self) -> String {
        match self {
            AnyTransport::Unix(t) => t.endpoint(),
            AnyTransport::Tcp(t) => t.endpoint(),
        }
    }
}

/// Serves a fixed listing from memory on every connect
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    listing: bytes::Bytes,
}

impl MemoryTransport {
    pub fn new(listing: impl Into<bytes::Bytes>) -> Self {
        MemoryTransport {
            listing: listing.into(),
        }
    }
}

impl Transport for MemoryTransport {
    type Stream = std::io::Cursor<bytes::Bytes>;

    fn connect(
        &self,
    ) -> Pin<Box<dyn Future<Output = IoResult<std::io::Cursor<bytes::Bytes>>> + Send + '_>> {
        let listing = self.listing.clone();
        Box::pin(async move { Ok(std::io::Cursor::new(listing)) })
    }

    fn endpoint(&self) -> String {
        format!("memory:{}b", self.listing.len())
    }
}
