use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Count {
    current: usize,
    max: usize,
}

/// Counts how many connections a server is serving at once,
/// and the most it ever served at once.
///
/// Clones share the same count.
#[derive(Debug, Clone, Default)]
pub struct ConnectionCounter {
    count: Arc<Mutex<Count>>,
}

impl ConnectionCounter {
    /// Create a counter at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Count> {
        // A panicking test thread must not hide the count from the others
        self.count.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// A connection started
    pub fn increment(&self) {
        let mut count = self.lock();
        count.current += 1;
        count.max = count.max.max(count.current);
    }

    /// A connection ended
    pub fn decrement(&self) {
        let mut count = self.lock();
        count.current = count.current.saturating_sub(1);
    }

    /// Set both the current count and the maximum back to zero
    pub fn reset(&self) {
        *self.lock() = Count::default();
    }

    /// Connections being served right now
    #[must_use]
    pub fn current(&self) -> usize {
        self.lock().current
    }

    /// Most connections served at once since creation or the last reset
    #[must_use]
    pub fn max(&self) -> usize {
        self.lock().max
    }
}
