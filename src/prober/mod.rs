use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::timer::Operation;

pub mod tcp_connect;

/// Why a single probe attempt did not complete.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("no IPv4 address found for {0}")]
    NoIpv4Address(String),

    #[error("connection failed: {0}")]
    Connection(#[source] io::Error),

    #[error("socket is not connected")]
    NotConnected,

    #[error("could not create socket: {0}")]
    Socket(#[source] io::Error),
}

/// One step of a probe attempt, executed in order by the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStep {
    Connect { host: String, port: u16 },
    HalfClose,
}

/// Opens a fresh, unconnected probe for every attempt.
pub trait Connector {
    type Probe: Operation<ProbeStep, Error = ProbeError>;

    fn open(&self) -> Result<Self::Probe, ProbeError>;
}

/// Classified result of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Connected and half-closed; latency in milliseconds.
    Success(f64),
    TimedOut,
    Failed(String),
    /// The run was interrupted while this attempt was pending.
    Cancelled,
}

impl Outcome {
    pub fn from_result(result: Result<Duration, ProbeError>) -> Self {
        match result {
            Ok(elapsed) => Outcome::Success(elapsed.as_secs_f64() * 1000.0),
            Err(ProbeError::Timeout(_)) => Outcome::TimedOut,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}
