//! Bus channel, envelope and payload types (spec §4.4, §6.2).

use serde::{Deserialize, Serialize};
use vsm_hlc::Hlc;

/// The five logical channels. Each carries a default priority; `command`
/// and `intel` additionally support an "urgent" priority for escalation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Command,
    Audit,
    Algedonic,
    Horizontal,
    Intel,
}

impl Channel {
    pub fn default_priority(self) -> u8 {
        match self {
            Channel::Command => 50,
            Channel::Audit => 100,
            Channel::Algedonic => 255,
            Channel::Horizontal => 10,
            Channel::Intel => 25,
        }
    }

    /// Escalated priority for channels that support one (`command`, `intel`).
    pub fn urgent_priority(self) -> u8 {
        match self {
            Channel::Command => 150,
            Channel::Intel => 75,
            other => other.default_priority(),
        }
    }

    pub fn is_durable(self) -> bool {
        matches!(self, Channel::Audit)
    }
}

/// Self-describing tagged-union payload. Unknown variants (from a future
/// version of a peer) are parsed into `Unknown` and logged, never
/// dispatched reflectively (spec §9).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "tag", content = "data")]
pub enum Payload {
    Operation(serde_json::Value),
    CoordinationRequest(serde_json::Value),
    AuditRecord(serde_json::Value),
    Algedonic(serde_json::Value),
    CrdtDelta(serde_json::Value),
    CrdtDigest(serde_json::Value),
    CrdtStateRequest(serde_json::Value),
    CrdtStateResponse(serde_json::Value),
    CrdtRegistered(serde_json::Value),
    IntelScan(serde_json::Value),
    PolicyUpdate(serde_json::Value),
    #[serde(other)]
    Unknown,
}

/// One message on the bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: String,
    pub correlation_id: String,
    pub hlc: Hlc,
    pub channel: Channel,
    pub routing_key: String,
    pub priority: u8,
    /// Milliseconds after enqueue before a mailbox may silently drop this
    /// envelope instead of delivering it (spec §4.4: `algedonic` carries a
    /// fixed 60s TTL). `None` means it never expires.
    pub ttl_ms: Option<u64>,
    pub payload: Payload,
}

impl Envelope {
    pub fn is_algedonic(&self) -> bool {
        matches!(self.channel, Channel::Algedonic)
    }
}
