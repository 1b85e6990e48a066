//! Bounded result cache keyed by image fingerprint.
//!
//! Eviction is strict FIFO: the oldest inserted key goes first, and reading
//! or overwriting an entry never changes its position.

use crate::types::RecognitionResult;
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Default number of cached results.
pub const DEFAULT_CAPACITY: usize = 50;

/// BLAKE3 digest of the full encoded image string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an encoded image (the whole `"<prefix>,<payload>"` string).
    pub fn of(image: &str) -> Self {
        Self(blake3::hash(image.as_bytes()).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

/// Fixed-capacity map from fingerprint to recognition result.
#[derive(Debug)]
pub struct ResultCache {
    entries: HashMap<Fingerprint, RecognitionResult>,
    order: VecDeque<Fingerprint>,
    capacity: usize,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ResultCache {
    /// Create a cache holding at most `capacity` results (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&self, key: &Fingerprint) -> Option<&RecognitionResult> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &Fingerprint) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert a result, evicting the oldest entry if a new key would exceed capacity.
    ///
    /// Returns the evicted key, if any.
    pub fn put(&mut self, key: Fingerprint, value: RecognitionResult) -> Option<Fingerprint> {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.order.pop_front().inspect(|oldest| {
                self.entries.remove(oldest);
            })
        } else {
            None
        };

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
