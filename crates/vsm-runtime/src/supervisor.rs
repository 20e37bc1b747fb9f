//! A small supervisor abstraction (spec §9): owns a set of child tasks,
//! each declaring a restart policy and backed off exponentially between
//! restarts. Restart never restores in-process state — anything that
//! must survive a crash lives in the Tiered Store / CRDT Context Store,
//! not here. Grounded on the teacher's `mdcs-sdk::client::Client` /
//! `session::Session` ownership pattern, generalized from owning
//! documents to owning supervised tasks.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Always restarted, whether it exited cleanly or faulted.
    Permanent,
    /// Restarted only if it faulted; a clean exit is left stopped.
    Transient,
    /// Never restarted, regardless of exit reason.
    Temporary,
}

pub struct Supervisor {
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
}

impl Supervisor {
    pub fn new(initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            initial_backoff_ms,
            max_backoff_ms,
        }
    }

    /// Spawn `factory` under `policy`. `factory` is called again from
    /// scratch on every restart — it owns building a fresh child, with
    /// no access to the previous attempt's state, by construction.
    pub fn supervise<F, Fut>(&self, name: impl Into<String>, policy: RestartPolicy, factory: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let name = name.into();
        let initial_backoff_ms = self.initial_backoff_ms;
        let max_backoff_ms = self.max_backoff_ms;
        tokio::spawn(async move {
            let mut backoff_ms = initial_backoff_ms;
            loop {
                let outcome = factory().await;
                let restart = match (&outcome, policy) {
                    (Ok(()), RestartPolicy::Permanent) => {
                        info!(actor = %name, "permanent child exited cleanly, restarting");
                        true
                    }
                    (Ok(()), _) => {
                        info!(actor = %name, "child exited cleanly, not restarting");
                        false
                    }
                    (Err(cause), RestartPolicy::Temporary) => {
                        error!(actor = %name, kind = "fatal", cause = %cause, "temporary child faulted, not restarting");
                        false
                    }
                    (Err(cause), _) => {
                        warn!(actor = %name, kind = "fatal", cause = %cause, backoff_ms, "child faulted, restarting with clean state");
                        true
                    }
                };
                if !restart {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(max_backoff_ms);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn transient_restarts_on_fault_then_stops_on_clean_exit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::new(1, 2);
        let calls2 = calls.clone();
        let handle = supervisor.supervise("s1", RestartPolicy::Transient, move || {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("simulated fault".to_string())
                } else {
                    Ok(())
                }
            }
        });
        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn temporary_never_restarts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::new(1, 2);
        let calls2 = calls.clone();
        let handle = supervisor.supervise("s4", RestartPolicy::Temporary, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), String>("dead".to_string())
            }
        });
        handle.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_restarts_even_after_clean_exit_until_external_stop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let supervisor = Supervisor::new(1, 2);
        let calls2 = calls.clone();
        let handle = supervisor.supervise("s5", RestartPolicy::Permanent, move || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();
        assert!(calls.load(Ordering::SeqCst) >= 2);
    }
}
