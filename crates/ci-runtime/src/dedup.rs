use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Bounded LRU of recently-seen hook dedupe keys. A `HashSet` for O(1)
/// membership plus a `VecDeque` for eviction order — the teacher already
/// depends on `once_cell` for this kind of lazily-built, process-lifetime
/// cache, so this is sized at construction rather than behind a `Lazy`.
pub struct DedupCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

struct Inner {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(Inner { seen: HashSet::new(), order: VecDeque::new() }), capacity: capacity.max(1) }
    }

    /// Returns `true` if `key` was already present (a duplicate delivery);
    /// otherwise records it and returns `false`.
    pub fn check_and_insert(&self, key: String) -> bool {
        let mut inner = self.inner.lock().expect("dedup cache mutex poisoned");
        if inner.seen.contains(&key) {
            return true;
        }
        if inner.order.len() >= self.capacity
            && let Some(oldest) = inner.order.pop_front()
        {
            inner.seen.remove(&oldest);
        }
        inner.order.push_back(key.clone());
        inner.seen.insert(key);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_delivery_is_not_a_duplicate() {
        let cache = DedupCache::new(10);
        assert!(!cache.check_and_insert("k1".to_string()));
    }

    #[test]
    fn repeated_key_is_flagged_duplicate() {
        let cache = DedupCache::new(10);
        cache.check_and_insert("k1".to_string());
        assert!(cache.check_and_insert("k1".to_string()));
    }

    #[test]
    fn eviction_forgets_the_oldest_key_once_full() {
        let cache = DedupCache::new(2);
        cache.check_and_insert("a".to_string());
        cache.check_and_insert("b".to_string());
        cache.check_and_insert("c".to_string());
        assert!(!cache.check_and_insert("a".to_string()));
    }
}
