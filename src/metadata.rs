//! Persisted cache entry and store structures.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Schema tag written into every entry. Bump when the entry shape changes;
/// entries carrying any other tag are treated as misses.
pub const CACHE_VERSION: &str = "v1";

/// Storage key the whole store is serialized under.
pub const CACHE_KEY: &str = "moc_video_cache";

/// Default time an entry stays valid (7 days).
pub const DEFAULT_CACHE_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The persisted store: video URL -> entry.
///
/// Entries are kept as raw JSON and decoded one at a time, so a record
/// written by an older or foreign schema is a miss for that URL only and
/// survives a read-modify-write untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheStore {
    entries: BTreeMap<String, Value>,
}

impl CacheStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded entry for `url`, or `None` if absent or of an unknown shape
    pub fn entry(&self, url: &str) -> Option<CacheEntry> {
        self.entries
            .get(url)
            .and_then(|raw| CacheEntry::deserialize(raw).ok())
    }

    /// Insert or replace the entry for `url`
    pub fn insert(&mut self, url: String, entry: CacheEntry) {
        // A struct of a u64 and a String always serializes.
        let raw = serde_json::to_value(entry).unwrap_or(Value::Null);
        self.entries.insert(url, raw);
    }

    /// Remove the record for `url`, whatever its shape. Returns whether one existed.
    pub fn remove(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    /// Whether any record, decodable or not, exists for `url`
    pub fn contains_key(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URLs whose entries decode and are valid at `now`
    pub fn valid_urls(&self, now: u64, max_age: Duration) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().filter_map(move |(url, raw)| {
            CacheEntry::deserialize(raw)
                .ok()
                .filter(|entry| entry.is_valid(now, max_age))
                .map(|_| url.as_str())
        })
    }
}

/// One persisted record of a video that finished loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// When the entry was written (milliseconds since UNIX_EPOCH)
    #[serde(default)]
    pub timestamp: u64,
    /// Schema tag the entry was written with
    #[serde(default)]
    pub version: String,
}

impl CacheEntry {
    /// Create an entry stamped with the current time and schema version
    pub fn new() -> Self {
        Self::with_time(current_time_millis())
    }

    /// Create an entry with a specific timestamp and the current schema version
    pub fn with_time(timestamp: u64) -> Self {
        Self {
            timestamp,
            version: CACHE_VERSION.to_string(),
        }
    }

    /// Age of this entry at `now`. Timestamps in the future have age zero.
    pub fn age(&self, now: u64) -> Duration {
        Duration::from_millis(now.saturating_sub(self.timestamp))
    }

    /// Check whether this entry can be trusted at `now`
    pub fn is_valid(&self, now: u64, max_age: Duration) -> bool {
        self.version == CACHE_VERSION && self.age(now) < max_age
    }
}

impl Default for CacheEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a persisted blob into a store.
///
/// Fails only when the blob is not a JSON object; individual entries are
/// never rejected here.
pub fn parse_store(blob: &str) -> crate::Result<CacheStore> {
    Ok(serde_json::from_str(blob)?)
}

/// Current time in milliseconds since UNIX_EPOCH
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
