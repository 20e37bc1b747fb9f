//! Per-subscriber priority mailbox. Every subscriber — regardless of how
//! many channels it listens on — drains one mailbox, so an `algedonic`
//! message queued before a later `command` message is always delivered
//! first (spec §8, invariant 7), and messages sharing a `routing_key`
//! keep publish order (spec §5).

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tracing::debug;

use crate::types::Envelope;

#[derive(Debug)]
struct Scored {
    envelope: Envelope,
    seq: u64,
    /// When this entry stops being deliverable, derived from
    /// `envelope.ttl_ms` at enqueue time. `None` means it never expires.
    expires_at: Option<Instant>,
}

impl Scored {
    fn new(envelope: Envelope, seq: u64) -> Self {
        let expires_at = envelope.ttl_ms.map(|ttl| Instant::now() + Duration::from_millis(ttl));
        Self { envelope, seq, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.envelope.priority == other.envelope.priority && self.seq == other.seq
    }
}
impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: higher priority pops first; within
        // equal priority, the earlier sequence number pops first (so we
        // reverse the sequence comparison).
        self.envelope
            .priority
            .cmp(&other.envelope.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct Mailbox {
    heap: BinaryHeap<Scored>,
    capacity: usize,
    notify: Arc<Notify>,
}

pub enum PushOutcome {
    Accepted,
    /// A lower-priority queued message was dropped to make room.
    AcceptedAfterDroppingLowerPriority,
    /// The mailbox is full and this message's priority didn't beat the
    /// lowest one queued: rejected (caller reports `overloaded`).
    RejectedOverloaded,
}

impl Mailbox {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            capacity,
            notify: Arc::new(Notify::new()),
        }
    }

    /// A cloneable handle to this mailbox's wakeup signal, so a waiter
    /// can drop the mailbox's lock before awaiting (parking_lot guards
    /// aren't meant to be held across an await point).
    pub fn notify_handle(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Push a message, applying the bounded-mailbox back-pressure policy
    /// from spec §5: on overflow, drop the lowest-priority queued message
    /// first; if this message doesn't beat the minimum, reject it.
    /// Algedonic messages are never subject to this and must be handled
    /// by the caller before reaching here (see `Bus::publish`).
    pub fn push(&mut self, envelope: Envelope, seq: u64) -> PushOutcome {
        if self.heap.len() < self.capacity {
            self.heap.push(Scored::new(envelope, seq));
            self.notify.notify_one();
            return PushOutcome::Accepted;
        }

        let min_priority = self
            .heap
            .iter()
            .map(|s| s.envelope.priority)
            .min()
            .unwrap_or(0);

        if envelope.priority > min_priority {
            // Drop one lowest-priority entry (ties broken by oldest seq).
            let mut remaining: Vec<Scored> = self.heap.drain().collect();
            if let Some(victim_idx) = remaining
                .iter()
                .enumerate()
                .filter(|(_, s)| s.envelope.priority == min_priority)
                .min_by_key(|(_, s)| s.seq)
                .map(|(idx, _)| idx)
            {
                remaining.remove(victim_idx);
            }
            self.heap = remaining.into_iter().collect();
            self.heap.push(Scored::new(envelope, seq));
            self.notify.notify_one();
            PushOutcome::AcceptedAfterDroppingLowerPriority
        } else {
            PushOutcome::RejectedOverloaded
        }
    }

    /// Force-push ignoring capacity — used only for algedonic messages,
    /// which are never dropped (spec §4.4/§5).
    pub fn force_push(&mut self, envelope: Envelope, seq: u64) {
        self.heap.push(Scored::new(envelope, seq));
        self.notify.notify_one();
    }

    /// Pops the highest-priority live message, silently dropping any
    /// expired ones ahead of it (spec §4.4: `algedonic` carries a 60s
    /// TTL; other channels may set one too).
    pub fn try_pop(&mut self) -> Option<Envelope> {
        while let Some(scored) = self.heap.pop() {
            if scored.is_expired() {
                debug!(
                    channel = ?scored.envelope.channel,
                    routing_key = %scored.envelope.routing_key,
                    "dropping expired envelope"
                );
                continue;
            }
            return Some(scored.envelope);
        }
        None
    }

    pub async fn wait_for_message(&self) {
        if self.heap.is_empty() {
            self.notify.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Channel, Payload};
    use vsm_hlc::{Hlc, NodeId};

    fn env(channel: Channel, priority: u8) -> Envelope {
        Envelope {
            sender: "s".into(),
            correlation_id: "c".into(),
            hlc: Hlc::new(NodeId::new("n")),
            channel,
            routing_key: "system.1.test".into(),
            priority,
            ttl_ms: None,
            payload: Payload::Operation(serde_json::json!({})),
        }
    }

    // Scenario S-4 from the spec: policy_update (50), algedonic (255),
    // policy_update (50) -- drained in order algedonic, first, second.
    #[test]
    fn scenario_s4_algedonic_priority() {
        let mut mailbox = Mailbox::new(10);
        mailbox.push(env(Channel::Command, 50), 0);
        mailbox.push(env(Channel::Algedonic, 255), 1);
        mailbox.push(env(Channel::Command, 50), 2);

        let first = mailbox.try_pop().unwrap();
        assert!(first.is_algedonic());

        let second = mailbox.try_pop().unwrap();
        assert_eq!(second.routing_key, "system.1.test");
        assert!(!second.is_algedonic());

        let third = mailbox.try_pop().unwrap();
        assert!(!third.is_algedonic());

        assert!(mailbox.try_pop().is_none());
    }

    #[test]
    fn overflow_drops_lowest_priority_first() {
        let mut mailbox = Mailbox::new(2);
        mailbox.push(env(Channel::Horizontal, 10), 0);
        mailbox.push(env(Channel::Command, 50), 1);
        // Third push beats the lowest priority (10) queued: it should be
        // admitted, dropping the horizontal message.
        matches!(
            mailbox.push(env(Channel::Audit, 100), 2),
            PushOutcome::AcceptedAfterDroppingLowerPriority
        );
        assert_eq!(mailbox.len(), 2);
        let popped: Vec<u8> = std::iter::from_fn(|| mailbox.try_pop().map(|e| e.priority)).collect();
        assert_eq!(popped, vec![100, 50]);
    }

    #[test]
    fn overflow_rejects_when_not_higher_priority() {
        let mut mailbox = Mailbox::new(1);
        mailbox.push(env(Channel::Audit, 100), 0);
        let outcome = mailbox.push(env(Channel::Horizontal, 10), 1);
        assert!(matches!(outcome, PushOutcome::RejectedOverloaded));
        assert_eq!(mailbox.len(), 1);
    }

    #[test]
    fn expired_envelope_is_skipped_on_pop() {
        let mut mailbox = Mailbox::new(10);
        let mut expiring = env(Channel::Command, 50);
        expiring.ttl_ms = Some(1);
        mailbox.push(expiring, 0);
        std::thread::sleep(Duration::from_millis(20));
        mailbox.push(env(Channel::Horizontal, 10), 1);

        // The expired command message is dropped silently; the lower
        // priority but still-live horizontal message is what comes back.
        let popped = mailbox.try_pop().unwrap();
        assert_eq!(popped.channel, Channel::Horizontal);
        assert!(mailbox.try_pop().is_none());
    }

    #[test]
    fn no_ttl_never_expires() {
        let mut mailbox = Mailbox::new(10);
        mailbox.push(env(Channel::Command, 50), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert!(mailbox.try_pop().is_some());
    }
}
