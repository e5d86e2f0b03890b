use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Global pause between units of work against the portal.
///
/// One instance is shared by every worker; waiters queue on the mutex so the
/// interval holds across all of them, not per worker.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until the next slot is open, then books the one after it.
    /// The first call never waits.
    pub async fn pace(&self) {
        let mut next = self.next_slot.lock().await;
        if let Some(at) = *next {
            tokio::time::sleep_until(at).await;
        }
        *next = Some(Instant::now() + self.interval);
    }
}
