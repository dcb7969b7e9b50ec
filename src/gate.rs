use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide limiter for outbound generative calls. One instance is built
/// at startup and shared through `AppState`, so it bounds every concurrent
/// request's JSON attempts and image calls together, not one request's pair.
///
/// Admission is FIFO: tokio's semaphore queues waiters in arrival order.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the duration of one admitted call; the slot frees on drop.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl Gate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Suspends until fewer than `capacity` calls are admitted, then admits
    /// the caller. Waiting never blocks other requests' progress.
    pub async fn admit(&self) -> GatePermit {
        // The semaphore is never closed, so acquire cannot fail.
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .expect("gate semaphore closed");
        GatePermit { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
