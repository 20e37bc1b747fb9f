//! Hybrid Logical Clock (HLC) — causality stamps consumed by the CRDT
//! context store and by the message bus.
//!
//! An HLC hybridizes wall-clock time with a logical counter so that two
//! stamps issued on different hosts with loosely synchronized clocks can
//! still be totally ordered in a way that respects causality: if event A
//! happens-before event B, `compare(A, B)` is never `Greater`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies the node/replica that issued an HLC stamp.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A single HLC stamp: `(physical_ms, logical_counter, node_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hlc {
    pub ts: u64,
    pub counter: u32,
    pub node: NodeId,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HlcError {
    #[error("malformed HLC stamp: {0}")]
    Malformed(String),
}

impl Hlc {
    /// Create a fresh clock state for `node_id`, seeded at the wall clock.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            ts: now_ms(),
            counter: 0,
            node: node_id.into(),
        }
    }

    /// `tick`: advance the clock for a purely local event.
    ///
    /// If wall-clock time has moved past the stamp's `ts`, reset the
    /// counter; otherwise bump the counter, absorbing clock regressions.
    pub fn tick(&self) -> Hlc {
        let now = now_ms();
        if now > self.ts {
            Hlc {
                ts: now,
                counter: 0,
                node: self.node.clone(),
            }
        } else {
            Hlc {
                ts: self.ts,
                counter: self.counter + 1,
                node: self.node.clone(),
            }
        }
    }

    /// `recv`: merge a remote stamp into the local clock on message receipt.
    pub fn recv(&self, remote: &Hlc) -> Hlc {
        let now = now_ms();
        let m = now.max(self.ts).max(remote.ts);

        let counter = if m == self.ts && m == remote.ts {
            self.counter.max(remote.counter) + 1
        } else if m == self.ts {
            self.counter + 1
        } else if m == remote.ts {
            remote.counter + 1
        } else {
            0
        };

        Hlc {
            ts: m,
            counter,
            node: self.node.clone(),
        }
    }

    /// Lexicographic total order over `(ts, counter, node)`.
    pub fn compare(&self, other: &Hlc) -> Ordering {
        (self.ts, self.counter, &self.node).cmp(&(other.ts, other.counter, &other.node))
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Hlc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.ts, self.counter, self.node)
    }
}

impl FromStr for Hlc {
    type Err = HlcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let ts = parts
            .next()
            .ok_or_else(|| HlcError::Malformed(s.to_string()))?
            .parse::<u64>()
            .map_err(|_| HlcError::Malformed(s.to_string()))?;
        let counter = parts
            .next()
            .ok_or_else(|| HlcError::Malformed(s.to_string()))?
            .parse::<u32>()
            .map_err(|_| HlcError::Malformed(s.to_string()))?;
        let node = parts
            .next()
            .ok_or_else(|| HlcError::Malformed(s.to_string()))?;
        if node.is_empty() {
            return Err(HlcError::Malformed(s.to_string()));
        }
        Ok(Hlc {
            ts,
            counter,
            node: NodeId::new(node),
        })
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_strictly_after_self() {
        let clock = Hlc::new("node-a");
        let ticked = clock.tick();
        assert_eq!(clock.compare(&ticked), Ordering::Less);
    }

    #[test]
    fn tick_bumps_counter_under_a_frozen_clock() {
        let clock = Hlc {
            ts: 1_000_000_000_000,
            counter: 4,
            node: NodeId::new("node-a"),
        };
        // wall clock will never reach year 33658 CE, so this always takes
        // the "else" branch deterministically in tests
        let ticked = clock.tick();
        assert_eq!(ticked.ts, clock.ts);
        assert_eq!(ticked.counter, 5);
    }

    #[test]
    fn recv_dominates_both_inputs() {
        let local = Hlc {
            ts: 100,
            counter: 2,
            node: NodeId::new("node-a"),
        };
        let remote = Hlc {
            ts: 100,
            counter: 5,
            node: NodeId::new("node-b"),
        };
        let merged = local.recv(&remote);
        assert_ne!(local.compare(&merged), Ordering::Greater);
        assert_ne!(remote.compare(&merged), Ordering::Greater);
        assert_eq!(merged.ts, 100);
        assert_eq!(merged.counter, 6);
    }

    #[test]
    fn recv_picks_remote_ts_when_remote_leads() {
        let local = Hlc {
            ts: 50,
            counter: 9,
            node: NodeId::new("node-a"),
        };
        let remote = Hlc {
            ts: 200,
            counter: 1,
            node: NodeId::new("node-b"),
        };
        let merged = local.recv(&remote);
        assert_eq!(merged.ts, 200);
        assert_eq!(merged.counter, 2);
        assert_eq!(merged.node, NodeId::new("node-a"));
    }

    #[test]
    fn compare_is_total_order_over_ts_counter_node() {
        let a = Hlc {
            ts: 10,
            counter: 0,
            node: NodeId::new("a"),
        };
        let b = Hlc {
            ts: 10,
            counter: 0,
            node: NodeId::new("b"),
        };
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&a), Ordering::Greater);
    }

    #[test]
    fn display_and_parse_round_trip() {
        let stamp = Hlc {
            ts: 42,
            counter: 7,
            node: NodeId::new("replica-1"),
        };
        let rendered = stamp.to_string();
        let parsed: Hlc = rendered.parse().unwrap();
        assert_eq!(stamp, parsed);
    }

    #[test]
    fn parse_rejects_malformed_stamps() {
        assert!("not-an-hlc".parse::<Hlc>().is_err());
        assert!("10-abc-node".parse::<Hlc>().is_err());
    }

    proptest::proptest! {
        #[test]
        fn recv_never_loses_causality(a_ctr in 0u32..1000, b_ctr in 0u32..1000) {
            let a = Hlc { ts: 1000, counter: a_ctr, node: NodeId::new("a") };
            let b = Hlc { ts: 1000, counter: b_ctr, node: NodeId::new("b") };
            let merged = a.recv(&b);
            proptest::prop_assert!(a.compare(&merged) != Ordering::Greater);
            proptest::prop_assert!(b.compare(&merged) != Ordering::Greater);
        }
    }
}
