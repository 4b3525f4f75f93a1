use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Maximum idle connections kept per upstream.
const MAX_IDLE_PER_HOST: usize = 4;

/// Idle stream connections to one upstream. Entries older than `expire` are
/// dropped instead of being handed out.
pub struct StreamPool<S> {
    idle: Mutex<Vec<(S, Instant)>>,
    expire_ms: AtomicU64,
}

impl<S> StreamPool<S> {
    pub fn new(expire: Duration) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(MAX_IDLE_PER_HOST)),
            expire_ms: AtomicU64::new(expire.as_millis() as u64),
        }
    }

    pub fn set_expire(&self, expire: Duration) {
        self.expire_ms
            .store(expire.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn expire(&self) -> Duration {
        Duration::from_millis(self.expire_ms.load(Ordering::Relaxed))
    }

    /// Most recently returned connection that has not expired.
    pub fn take(&self) -> Option<S> {
        let expire = self.expire();
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        idle.retain(|(_, since)| since.elapsed() < expire);
        idle.pop().map(|(stream, _)| stream)
    }

    pub fn put(&self, stream: S) {
        if self.expire().is_zero() {
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(|e| e.into_inner());
        if idle.len() < MAX_IDLE_PER_HOST {
            idle.push((stream, Instant::now()));
        }
    }

    pub fn len(&self) -> usize {
        self.idle.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
