//! Length-prefixed JSON transport to the remote authority.
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! UTF-8 JSON. Any failure on the link is a [`TransportError`]; none of them
//! are recoverable by a running program.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

/// Appended to every transport error message.
pub const REPORT_HINT: &str =
    " (If you are a competitor, please report this to the tournament organizers.)";

/// Frames larger than this are treated as corruption.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Failure on the link to the remote authority.
#[derive(Debug)]
pub enum TransportError {
    /// Connecting failed with something other than "connection refused".
    Connect(io::Error),
    /// Writing a frame failed.
    Send(io::Error),
    /// Reading a frame failed.
    Receive(io::Error),
    /// The remote side closed the connection mid-session.
    Closed,
    /// The link was used after `close`.
    NotConnected,
    /// A frame could not be parsed or had an unexpected shape.
    Malformed(String),
    /// A frame announced an implausible length.
    FrameTooLarge(u32),
    /// Another thread panicked while holding the link.
    Poisoned,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect(e) => write!(f, "failed to connect to the game server: {e}"),
            Self::Send(e) => write!(f, "failed to send data: {e}"),
            Self::Receive(e) => write!(f, "failed to receive data: {e}"),
            Self::Closed => write!(f, "socket connection closed unexpectedly"),
            Self::NotConnected => write!(f, "socket not connected"),
            Self::Malformed(msg) => write!(f, "malformed message: {msg}"),
            Self::FrameTooLarge(len) => write!(f, "frame of {len} bytes exceeds the limit"),
            Self::Poisoned => write!(f, "link lock poisoned"),
        }?;
        f.write_str(REPORT_HINT)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) | Self::Send(e) | Self::Receive(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Framed JSON client.
#[derive(Debug)]
pub struct Client {
    stream: Option<TcpStream>,
}

impl Client {
    /// Connect to `addr`, retrying every `retry` while the connection is
    /// refused. There is no overall timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] for any other connect failure.
    pub fn connect(addr: SocketAddr, retry: Duration) -> Result<Self, TransportError> {
        let mut attempts = 0_u64;
        loop {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    // Strict request/response alternation with small frames.
                    stream.set_nodelay(true).map_err(TransportError::Connect)?;
                    debug!(%addr, attempts, "connected");
                    return Ok(Self::from_stream(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    attempts += 1;
                    if attempts == 1 {
                        debug!(%addr, "server not accepting connections yet, retrying");
                    }
                    thread::sleep(retry);
                }
                Err(e) => return Err(TransportError::Connect(e)),
            }
        }
    }

    /// Wrap an already connected stream.
    #[must_use]
    pub const fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    /// Send one JSON document.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the link is closed or the write fails.
    pub fn send<T: serde::Serialize + ?Sized>(&mut self, message: &T) -> Result<(), TransportError> {
        let body = serde_json::to_vec(message)?;
        let len = u32::try_from(body.len())
            .map_err(|_| TransportError::FrameTooLarge(u32::MAX))?;
        trace!(len, "send");
        let stream = self.stream()?;
        stream
            .write_all(&len.to_be_bytes())
            .and_then(|()| stream.write_all(&body))
            .map_err(TransportError::Send)
    }

    /// Send an explicit `null` acknowledgement.
    ///
    /// # Errors
    ///
    /// As [`Client::send`].
    pub fn send_null(&mut self) -> Result<(), TransportError> {
        self.send(&serde_json::Value::Null)
    }

    /// Read one JSON document.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] on EOF, I/O failure, an oversized frame,
    /// or a body that is not valid JSON.
    pub fn receive(&mut self) -> Result<serde_json::Value, TransportError> {
        let stream = self.stream()?;
        let mut header = [0u8; 4];
        read_exactly(stream, &mut header)?;
        let len = u32::from_be_bytes(header);
        if len > MAX_FRAME_LEN {
            return Err(TransportError::FrameTooLarge(len));
        }
        let mut body = vec![0u8; len as usize];
        read_exactly(stream, &mut body)?;
        trace!(len, "receive");
        Ok(serde_json::from_slice(&body)?)
    }

    /// Shut the connection down. Calling it again does nothing.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            debug!("connection closed");
        }
    }

    /// Whether the link is still open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_exactly(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), TransportError> {
    stream.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            TransportError::Closed
        } else {
            TransportError::Receive(e)
        }
    })
}
