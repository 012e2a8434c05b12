use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out at most `limit` sample slots across all workers.
#[derive(Debug)]
pub(super) struct SampleLimiter {
    limit: u64,
    issued: AtomicU64,
}

impl SampleLimiter {
    pub(super) const fn new(limit: u64) -> Self {
        Self {
            limit,
            issued: AtomicU64::new(0),
        }
    }

    pub(super) fn try_reserve(&self) -> bool {
        loop {
            let current = self.issued.load(Ordering::Relaxed);
            if current >= self.limit {
                return false;
            }
            let Some(next) = current.checked_add(1) else {
                return false;
            };
            if self
                .issued
                .compare_exchange(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub(super) fn issued(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}
