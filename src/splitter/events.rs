// ABOUTME: Events produced by the downstream layer and consumed by the splitter
//
// The enum is non-exhaustive: consumers must keep a wildcard arm so new
// event kinds never break dispatch.

use serde::{Deserialize, Serialize};

use super::miner::MinerHandle;

/// Login payload passed through to the mapper unmodified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    /// JSON-RPC id of the login call, echoed back by the mapper
    pub id: i64,
    pub login: String,
    pub password: String,
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rig_id: Option<String>,
    /// Algorithms the miner advertises
    pub algorithms: Vec<String>,
}

/// A unit of completed work submitted by a miner
#[derive(Debug, Clone)]
pub struct SubmitEvent {
    pub miner: MinerHandle,
    /// JSON-RPC id of the submit call
    pub request_id: i64,
    pub job_id: String,
    pub nonce: String,
    pub result: String,
    pub algorithm: Option<String>,
}

/// Kind tag, mostly useful for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connection,
    Close,
    Login,
    Submit,
    Accept,
    Reject,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Connection => "connection",
            Self::Close => "close",
            Self::Login => "login",
            Self::Submit => "submit",
            Self::Accept => "accept",
            Self::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// Event emitted by the downstream layer
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ProxyEvent {
    /// A miner opened a connection
    Connection { miner: MinerHandle },
    /// A miner closed its connection
    Close { miner: MinerHandle },
    /// A miner sent its login request
    Login {
        miner: MinerHandle,
        request: LoginRequest,
    },
    /// A miner submitted a share
    Submit(SubmitEvent),
    /// The upstream accepted a share
    Accept { miner: MinerHandle },
    /// The upstream rejected a share
    Reject { miner: MinerHandle, reason: String },
}

impl ProxyEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connection { .. } => EventKind::Connection,
            Self::Close { .. } => EventKind::Close,
            Self::Login { .. } => EventKind::Login,
            Self::Submit(_) => EventKind::Submit,
            Self::Accept { .. } => EventKind::Accept,
            Self::Reject { .. } => EventKind::Reject,
        }
    }

    /// The miner this event originated from
    pub fn miner(&self) -> &MinerHandle {
        match self {
            Self::Connection { miner }
            | Self::Close { miner }
            | Self::Login { miner, .. }
            | Self::Accept { miner }
            | Self::Reject { miner, .. } => miner,
            Self::Submit(event) => &event.miner,
        }
    }
}
