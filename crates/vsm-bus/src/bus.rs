//! The bus itself: named subscribers, each with a priority mailbox fed by
//! every channel they listen on, plus the bounded-buffer/backoff
//! behaviour a publisher falls back to when its connector believes the
//! broker is unreachable (spec §4.4, §5).
//!
//! This crate models an *abstract* bus (spec §1): there is no real broker
//! transport here, only the in-process routing and back-pressure rules
//! that the teacher's `mdcs-sdk::network::MemoryTransport` models for
//! peer-to-peer messaging, generalized to five channels with priorities.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{BusError, Result};
use crate::mailbox::{Mailbox, PushOutcome};
use crate::types::{Channel, Envelope};

struct Subscription {
    channels: Vec<Channel>,
    mailbox: Mutex<Mailbox>,
}

/// Publish-side connector state. A real deployment's connector watches a
/// broker connection; this one is driven by `Bus::set_broker_reachable`
/// so tests can simulate broker loss deterministically.
pub struct ConnectorState {
    reachable: std::sync::atomic::AtomicBool,
    backoff_ms: AtomicU64,
}

impl ConnectorState {
    fn new() -> Self {
        Self {
            reachable: std::sync::atomic::AtomicBool::new(true),
            backoff_ms: AtomicU64::new(0),
        }
    }

    /// Exponential backoff, capped at 30s, reset to 0 on reconnect.
    fn next_backoff(&self) -> Duration {
        let prev = self.backoff_ms.load(Ordering::Relaxed);
        let next = if prev == 0 { 100 } else { (prev * 2).min(30_000) };
        self.backoff_ms.store(next, Ordering::Relaxed);
        Duration::from_millis(next)
    }

    fn reset_backoff(&self) {
        self.backoff_ms.store(0, Ordering::Relaxed);
    }
}

pub struct Bus {
    subscribers: RwLock<HashMap<String, Subscription>>,
    seq: AtomicU64,
    connector: ConnectorState,
    default_mailbox_capacity: usize,
}

impl Bus {
    pub fn new(default_mailbox_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            seq: AtomicU64::new(0),
            connector: ConnectorState::new(),
            default_mailbox_capacity,
        }
    }

    /// Register a subscriber for a set of channels. Re-subscribing
    /// replaces the channel list but keeps any already-queued messages.
    pub fn subscribe(&self, subscriber: impl Into<String>, channels: Vec<Channel>) {
        let subscriber = subscriber.into();
        let mut subs = self.subscribers.write();
        subs.entry(subscriber)
            .and_modify(|s| s.channels = channels.clone())
            .or_insert_with(|| Subscription {
                channels,
                mailbox: Mutex::new(Mailbox::new(self.default_mailbox_capacity)),
            });
    }

    pub fn unsubscribe(&self, subscriber: &str) {
        self.subscribers.write().remove(subscriber);
    }

    /// Simulates broker connectivity for the publish-side connector. When
    /// unreachable, `publish` still accepts messages into subscriber
    /// mailboxes directly (there is no separate wire hop in this
    /// abstract bus) but reports the reconnect backoff a real connector
    /// would be waiting out, per spec §4.4.
    pub fn set_broker_reachable(&self, reachable: bool) {
        if reachable {
            self.connector.reset_backoff();
            info!("bus broker reconnected");
        } else {
            warn!("bus broker unreachable, publishers will back off");
        }
        self.connector
            .reachable
            .store(reachable, Ordering::Relaxed);
    }

    pub fn broker_reachable(&self) -> bool {
        self.connector.reachable.load(Ordering::Relaxed)
    }

    /// Duration a caller should wait before retrying publish, per the
    /// connector's exponential backoff. Only meaningful when the broker
    /// is unreachable; returns `Duration::ZERO` otherwise.
    pub fn reconnect_backoff(&self) -> Duration {
        if self.broker_reachable() {
            Duration::ZERO
        } else {
            self.connector.next_backoff()
        }
    }

    /// Publish `(channel, routing_key, payload, priority)` is
    /// non-blocking for senders; delivery is at-least-once to every
    /// subscriber listening on `envelope.channel`. Algedonic messages
    /// are never dropped: if a mailbox cannot accept one, this is fatal
    /// (spec §4.4) and is surfaced as `BusError::AlgedonicOverflow`.
    pub fn publish(&self, envelope: Envelope) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let subs = self.subscribers.read();
        for (name, sub) in subs.iter() {
            if !sub.channels.contains(&envelope.channel) {
                continue;
            }
            let mut mailbox = sub.mailbox.lock();
            if envelope.is_algedonic() {
                mailbox.force_push(envelope.clone(), seq);
                continue;
            }
            match mailbox.push(envelope.clone(), seq) {
                PushOutcome::Accepted => {}
                PushOutcome::AcceptedAfterDroppingLowerPriority => {
                    warn!(subscriber = %name, channel = ?envelope.channel, "mailbox overflow, dropped lower-priority message");
                }
                PushOutcome::RejectedOverloaded => {
                    warn!(subscriber = %name, channel = ?envelope.channel, "mailbox overloaded, message rejected");
                }
            }
        }
        Ok(())
    }

    /// Publish addressed to exactly one subscriber (used for `algedonic`,
    /// which spec §4.4 describes as direct routing rather than fanout).
    pub fn publish_direct(&self, subscriber: &str, envelope: Envelope) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let subs = self.subscribers.read();
        let sub = subs
            .get(subscriber)
            .ok_or_else(|| BusError::UnknownSubscriber(subscriber.to_string()))?;
        let mut mailbox = sub.mailbox.lock();
        if envelope.is_algedonic() {
            mailbox.force_push(envelope, seq);
            return Ok(());
        }
        match mailbox.push(envelope, seq) {
            PushOutcome::RejectedOverloaded => Err(BusError::AlgedonicOverflow {
                subscriber: subscriber.to_string(),
                reason: "mailbox overloaded".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Drain the next highest-priority message for a subscriber, if any.
    pub fn try_recv(&self, subscriber: &str) -> Result<Option<Envelope>> {
        let subs = self.subscribers.read();
        let sub = subs
            .get(subscriber)
            .ok_or_else(|| BusError::UnknownSubscriber(subscriber.to_string()))?;
        Ok(sub.mailbox.lock().try_pop())
    }

    /// Block until `subscriber`'s mailbox has at least one message.
    /// `tokio::sync::Notify` keeps a permit for a `notify_one` that fires
    /// before anyone is waiting, so a publish landing between `try_recv`
    /// and the wait below is never missed.
    pub async fn recv(&self, subscriber: &str) -> Result<Envelope> {
        loop {
            if let Some(envelope) = self.try_recv(subscriber)? {
                return Ok(envelope);
            }
            let notify = {
                let subs = self.subscribers.read();
                let sub = subs
                    .get(subscriber)
                    .ok_or_else(|| BusError::UnknownSubscriber(subscriber.to_string()))?;
                sub.mailbox.lock().notify_handle()
            };
            notify.notified().await;
        }
    }

    pub fn mailbox_len(&self, subscriber: &str) -> usize {
        self.subscribers
            .read()
            .get(subscriber)
            .map(|s| s.mailbox.lock().len())
            .unwrap_or(0)
    }
}
