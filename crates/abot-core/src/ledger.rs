//! Sender message → bot reply correlation.
//!
//! When a user edits a message that produced a reply, the bot edits its own
//! reply instead of posting a second one. Only the most recent sends are kept:
//! [`CorrelationWindow`] holds between `W` and `2W` entries and rebuilds itself
//! from the newest half every `W` inserts, so memory stays bounded over a
//! long-running process and each insert is amortized O(1).

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::Mutex;

use crate::domain::MessageRef;

/// Number of recent sends that always survive a compaction.
pub const DEFAULT_WINDOW: usize = 100;

/// Bounded key → value map that forgets the oldest half when full.
///
/// `order[..cursor]` lists every key present in `map`, oldest first (a key
/// recorded twice appears twice; the map keeps the latest value).
#[derive(Debug)]
pub struct CorrelationWindow<K, V> {
    window: usize,
    map: HashMap<K, V>,
    order: Vec<Option<K>>,
    cursor: usize,
}

impl<K, V> CorrelationWindow<K, V>
where
    K: Copy + Eq + Hash,
    V: Copy,
{
    /// `window` is clamped to at least 1.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            map: HashMap::with_capacity(window * 2),
            order: vec![None; window * 2],
            cursor: 0,
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.map.insert(key, value);
        self.order[self.cursor] = Some(key);
        self.cursor += 1;

        if self.cursor == self.window * 2 {
            self.compact();
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).copied()
    }

    /// Number of distinct keys currently retrievable.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Keep only the newest `W` inserts, in fresh allocations.
    fn compact(&mut self) {
        let w = self.window;
        let newest = &self.order[w..];

        let mut map = HashMap::with_capacity(w * 2);
        for key in newest.iter().flatten() {
            if let Some(v) = self.map.get(key) {
                map.insert(*key, *v);
            }
        }

        let mut order = vec![None; w * 2];
        order[..w].copy_from_slice(newest);

        self.map = map;
        self.order = order;
        self.cursor = w;
    }
}

/// Correlates inbound messages with the bot's reply to them.
///
/// All operations go through one lock; the ledger never calls into the user
/// directory (or anything else holding a lock) while holding it.
#[derive(Debug)]
pub struct SentMessageLedger {
    inner: Mutex<CorrelationWindow<MessageRef, MessageRef>>,
}

impl Default for SentMessageLedger {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl SentMessageLedger {
    pub fn new(window: usize) -> Self {
        Self {
            inner: Mutex::new(CorrelationWindow::new(window)),
        }
    }

    pub async fn record_send(&self, inbound: MessageRef, outbound: MessageRef) {
        self.inner.lock().await.insert(inbound, outbound);
    }

    /// The reply previously sent for `inbound`, if still remembered.
    pub async fn lookup_reply_target(&self, inbound: MessageRef) -> Option<MessageRef> {
        self.inner.lock().await.get(&inbound)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
