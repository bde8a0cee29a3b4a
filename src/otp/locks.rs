use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Registry of one mutex per identifier.
///
/// Every issue/verify/resend for an identifier runs under that
/// identifier's mutex, so read-modify-write sequences on the store never
/// interleave. Entries are reclaimed by `compact` once nobody holds them.
pub(crate) struct KeyedLocks {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Lock handle for one identifier. All callers passing the same key
    /// receive the same mutex until `compact` observes it unheld.
    pub(crate) async fn handle(&self, key: &str) -> Arc<Mutex<()>> {
        let mut entries = self.entries.lock().await;
        Arc::clone(entries.entry(key.to_string()).or_default())
    }

    /// Drops entries no task currently holds. The map itself owns one
    /// strong reference, so anything above that is a live holder.
    pub(crate) async fn compact(&self) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_key_yields_the_same_mutex() {
        let locks = KeyedLocks::new();
        let a = locks.handle("+15550001111").await;
        let b = locks.handle("+15550001111").await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn holding_one_key_does_not_block_another() {
        let locks = KeyedLocks::new();
        let a = locks.handle("a").await;
        let _guard = a.lock().await;

        let b = locks.handle("b").await;
        assert!(b.try_lock().is_ok());

        let a_again = locks.handle("a").await;
        assert!(a_again.try_lock().is_err());
    }

    #[tokio::test]
    async fn compact_reclaims_only_unheld_entries() {
        let locks = KeyedLocks::new();
        let held = locks.handle("held").await;
        let _guard = held.lock().await;
        drop(locks.handle("idle").await);

        assert_eq!(locks.len().await, 2);
        locks.compact().await;
        assert_eq!(locks.len().await, 1);

        drop(_guard);
        drop(held);
        locks.compact().await;
        assert_eq!(locks.len().await, 0);
    }
}
