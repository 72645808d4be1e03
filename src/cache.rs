use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long activity responses stay cached
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Small thread-safe key/value cache where every entry expires after a fixed TTL
///
/// Expired entries are dropped when they are next read, and in bulk on every write, so
/// keys that are never read again do not accumulate.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a live entry, removing it if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_at(key, value, Instant::now());
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).map(|entry| entry.value)
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key, _| !key.starts_with(prefix));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set_at(&self, key: impl Into<String>, value: V, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
