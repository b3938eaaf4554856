//! Per-cache-file write serialization
//!
//! Two bookmarks on the same host resolve to the same cache file. Fetches for
//! one filename take the same stripe so the second caller sees the finished
//! file instead of racing the first writer.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::{Mutex, MutexGuard};

const DEFAULT_STRIPES: usize = 64;

#[derive(Debug)]
pub struct StripedLocks {
    stripes: Vec<Mutex<()>>,
}

impl Default for StripedLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

impl StripedLocks {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    pub async fn lock(&self, key: &str) -> MutexGuard<'_, ()> {
        self.stripes[self.stripe_for(key)].lock().await
    }

    fn stripe_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = StripedLocks::new(4);
        let guard = locks.lock("abc.ico").await;

        let mut contender = task::spawn(locks.lock("abc.ico"));
        assert_pending!(contender.poll());

        drop(guard);
        assert!(contender.is_woken());
        assert_ready!(contender.poll());
    }

    #[test]
    fn test_zero_stripes_is_clamped() {
        let locks = StripedLocks::new(0);
        assert_eq!(locks.stripe_for("anything"), 0);
    }
}
