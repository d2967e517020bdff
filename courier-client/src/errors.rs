//! Error types for courier-client.

use std::{fmt, io};

use courier_ingest::IngestError;

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// A request the platform refused, e.g. `420 FLOOD_WAIT_30`.
///
/// A trailing `_<digits>` on the platform's message is split off into
/// [`RpcError::value`], so `FLOOD_WAIT_30` keeps the name `FLOOD_WAIT`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcError {
    pub code:  i32,
    pub name:  String,
    pub value: Option<u32>,
}

impl RpcError {
    /// Split a platform message such as `"FLOOD_WAIT_30"` into name and value.
    pub fn from_platform(code: i32, message: &str) -> Self {
        let numbered = message
            .rsplit_once('_')
            .filter(|(_, tail)| !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|(name, tail)| Some((name, tail.parse::<u32>().ok()?)));
        match numbered {
            Some((name, value)) => Self { code, name: name.to_owned(), value: Some(value) },
            None => Self { code, name: message.to_owned(), value: None },
        }
    }

    /// The rate-limit error asking the caller to wait `seconds`.
    pub fn flood_wait(seconds: u32) -> Self {
        Self { code: 420, name: "FLOOD_WAIT".to_owned(), value: Some(seconds) }
    }

    /// `true` if the error carries exactly this name.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name
    }

    /// Seconds the platform asked us to back off, for `FLOOD_WAIT` only.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        match (self.code, self.name.as_str(), self.value) {
            (420, "FLOOD_WAIT", Some(secs)) => Some(u64::from(secs)),
            _ => None,
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "platform error {} {}_{v}", self.code, self.name),
            None => write!(f, "platform error {} {}", self.code, self.name),
        }
    }
}

impl std::error::Error for RpcError {}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// Failure of a single [`crate::Messenger`] call.
#[derive(Debug)]
pub enum InvocationError {
    /// Refused by the platform.
    Rpc(RpcError),
    Io(io::Error),
    /// The session is not (or no longer) logged in.
    Unauthorized,
    /// Recipient or conversation could not be resolved.
    PeerNotFound(String),
    /// The connection went away before an answer arrived.
    Dropped,
}

impl InvocationError {
    /// See [`RpcError::flood_wait_seconds`].
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        if let Self::Rpc(rpc) = self { rpc.flood_wait_seconds() } else { None }
    }

    /// `true` for a platform refusal with this name.
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Self::Rpc(rpc) if rpc.is_named(name))
    }
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e)             => e.fmt(f),
            Self::Io(e)              => write!(f, "connection failed: {e}"),
            Self::Unauthorized       => f.write_str("session is not authorized"),
            Self::PeerNotFound(peer) => write!(f, "cannot resolve {peer}"),
            Self::Dropped            => f.write_str("connection closed before the reply arrived"),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(e) => Some(e),
            Self::Io(e)  => Some(e),
            _            => None,
        }
    }
}

impl From<RpcError> for InvocationError {
    fn from(e: RpcError) -> Self { Self::Rpc(e) }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

// ─── JobError ─────────────────────────────────────────────────────────────────

/// Why a send job could not start or had to abort.
///
/// Per-message failures never surface here; the pipeline counts them and
/// moves on.
#[derive(Debug)]
pub enum JobError {
    /// The payload could not be turned into a table. Nothing was sent.
    Ingest(IngestError),
    /// The platform session is not authorized. Nothing was sent.
    Unauthorized,
    /// A platform call outside the per-message loop failed.
    Invocation(InvocationError),
    /// Progress could not be persisted.
    Store(io::Error),
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest(e)     => write!(f, "ingestion failed: {e}"),
            Self::Unauthorized  => write!(f, "not authorized on the messaging platform"),
            Self::Invocation(e) => write!(f, "{e}"),
            Self::Store(e)      => write!(f, "state store error: {e}"),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ingest(e)     => Some(e),
            Self::Invocation(e) => Some(e),
            Self::Store(e)      => Some(e),
            Self::Unauthorized  => None,
        }
    }
}

impl From<IngestError> for JobError {
    fn from(e: IngestError) -> Self { Self::Ingest(e) }
}

impl From<io::Error> for JobError {
    fn from(e: io::Error) -> Self { Self::Store(e) }
}

impl From<InvocationError> for JobError {
    fn from(e: InvocationError) -> Self {
        match e {
            InvocationError::Unauthorized => Self::Unauthorized,
            other                         => Self::Invocation(other),
        }
    }
}

// ─── MonitorError ─────────────────────────────────────────────────────────────

/// Errors from the index builder and the reply monitor.
#[derive(Debug)]
pub enum MonitorError {
    /// A platform call failed.
    Invocation(InvocationError),
    /// Reply state could not be loaded or saved.
    Store(io::Error),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invocation(e) => write!(f, "{e}"),
            Self::Store(e)      => write!(f, "state store error: {e}"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invocation(e) => Some(e),
            Self::Store(e)      => Some(e),
        }
    }
}

impl From<InvocationError> for MonitorError {
    fn from(e: InvocationError) -> Self { Self::Invocation(e) }
}

impl From<io::Error> for MonitorError {
    fn from(e: io::Error) -> Self { Self::Store(e) }
}
