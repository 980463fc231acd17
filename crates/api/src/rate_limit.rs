use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct Buckets {
    clients: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

/// Sliding-window request budget per client key.
///
/// Clients whose requests have all aged out of the window are dropped, so
/// the table only holds keys seen within roughly the last two windows.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    inner: Arc<Mutex<Buckets>>,
    window: Duration,
    max_requests: usize,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buckets {
                clients: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            window,
            max_requests,
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let window = self.window;
        let mut guard = self.inner.lock();

        if now.saturating_duration_since(guard.last_sweep) > window {
            guard.clients.retain(|_, queue| {
                prune(queue, now, window);
                !queue.is_empty()
            });
            guard.last_sweep = now;
        }

        let queue = guard.clients.entry(key.to_string()).or_default();
        prune(queue, now, window);

        if queue.len() >= self.max_requests {
            return false;
        }

        queue.push_back(now);
        true
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.inner.lock().clients.len()
    }
}

fn prune(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = queue.front() {
        if now.saturating_duration_since(*front) > window {
            queue.pop_front();
        } else {
            break;
        }
    }
}
