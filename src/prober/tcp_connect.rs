use std::net::Shutdown;

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::trace;

use super::{Connector, ProbeError, ProbeStep};
use crate::timer::Operation;
use crate::util::resolve_ipv4;

/// One IPv4 TCP connection attempt: open, connect, half-close, close.
///
/// The socket is released when the probe is closed or dropped, whichever
/// comes first, so every exit path of an attempt gives it back to the OS.
#[derive(Debug)]
pub struct ConnectionProbe {
    timeout: Duration,
    socket: Option<TcpSocket>,
    stream: Option<TcpStream>,
}

impl ConnectionProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(ProbeError::Socket)?;
        socket.set_nonblocking(true).map_err(ProbeError::Socket)?;
        let socket = TcpSocket::from_std_stream(socket.into());

        Ok(Self {
            timeout,
            socket: Some(socket),
            stream: None,
        })
    }

    /// Resolve and connect, bounded by the probe timeout.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<(), ProbeError> {
        let socket = self.socket.take().ok_or(ProbeError::NotConnected)?;
        let attempt = async {
            let addr = resolve_ipv4(host, port).await?;
            socket.connect(addr).await.map_err(ProbeError::Connection)
        };

        let stream = timeout(self.timeout, attempt)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;
        self.stream = Some(stream);
        Ok(())
    }

    /// Shut down the read half only. Nothing is ever written.
    pub fn half_close(&self) -> Result<(), ProbeError> {
        let stream = self.stream.as_ref().ok_or(ProbeError::NotConnected)?;
        SockRef::from(stream)
            .shutdown(Shutdown::Read)
            .map_err(ProbeError::Connection)
    }

    pub fn close(&mut self) {
        self.socket.take();
        self.stream.take();
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some() || self.stream.is_some()
    }
}

impl Drop for ConnectionProbe {
    fn drop(&mut self) {
        if self.is_open() {
            trace!("releasing probe socket");
        }
        self.close();
    }
}

impl Operation<ProbeStep> for ConnectionProbe {
    type Error = ProbeError;

    async fn apply(&mut self, step: &ProbeStep) -> Result<(), ProbeError> {
        match step {
            ProbeStep::Connect { host, port } => self.connect(host, *port).await,
            ProbeStep::HalfClose => self.half_close(),
        }
    }
}

/// Hands out a fresh [`ConnectionProbe`] per attempt.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    timeout: Duration,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Connector for TcpConnector {
    type Probe = ConnectionProbe;

    fn open(&self) -> Result<ConnectionProbe, ProbeError> {
        ConnectionProbe::new(self.timeout)
    }
}
