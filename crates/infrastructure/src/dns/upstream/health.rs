use splitroute_domain::DomainError;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Consecutive failure count of one upstream.
#[derive(Debug, Default)]
pub struct Liveness {
    fails: AtomicU32,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn down(&self, max_fails: u32) -> bool {
        max_fails != 0 && self.fails.load(Ordering::Relaxed) > max_fails
    }

    /// Returns the failure count after this failure.
    pub fn record_failure(&self) -> u32 {
        self.fails.fetch_add(1, Ordering::Relaxed).saturating_add(1)
    }

    pub fn reset(&self) {
        self.fails.store(0, Ordering::Relaxed);
    }

    pub fn fails(&self) -> u32 {
        self.fails.load(Ordering::Relaxed)
    }
}

/// Background task that, once triggered, checks an upstream every interval
/// until a check succeeds.
pub struct HealthProbe {
    trigger: mpsc::Sender<()>,
    pending: Mutex<Option<mpsc::Receiver<()>>>,
    shutdown: CancellationToken,
}

impl HealthProbe {
    pub fn new() -> Self {
        let (trigger, receiver) = mpsc::channel(1);
        Self {
            trigger,
            pending: Mutex::new(Some(receiver)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Non-blocking. A trigger while one is already queued is dropped.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    pub fn start<F, Fut>(&self, interval: Duration, liveness: Arc<Liveness>, label: String, check: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
    {
        let receiver = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(mut receiver) = receiver else {
            debug!(upstream = %label, "Health probe already started");
            return;
        };
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            debug!(upstream = %label, interval_ms = interval.as_millis() as u64, "Health probe started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    signal = receiver.recv() => {
                        if signal.is_none() {
                            break;
                        }
                    }
                }

                loop {
                    match check().await {
                        Ok(()) => {
                            if liveness.fails() > 0 {
                                info!(upstream = %label, "Upstream healthy again");
                            }
                            liveness.reset();
                            break;
                        }
                        Err(e) => {
                            let fails = liveness.record_failure();
                            warn!(upstream = %label, fails, error = %e, "Health check failed");
                        }
                    }

                    tokio::select! {
                        _ = shutdown.cancelled() => return,
                        _ = tokio::time::sleep(interval) => {}
                    }
                }
            }
            debug!(upstream = %label, "Health probe stopped");
        });
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::new()
    }
}
