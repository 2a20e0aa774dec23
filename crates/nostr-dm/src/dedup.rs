// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::num::NonZeroUsize;

use lru::LruCache;
use nostr::EventId;

/// IDs of the most recently sent messages
///
/// Approximate deduplication of relay echoes of self-sent messages: the set is bounded and the
/// oldest ID is evicted first, so a very old echo may slip through.
/// Lookups don't refresh the position of an ID.
#[derive(Debug)]
pub(crate) struct RecentlySent {
    ids: LruCache<EventId, ()>,
}

impl RecentlySent {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            ids: LruCache::new(capacity),
        }
    }

    /// Record a locally originated ID
    #[inline]
    pub(crate) fn record(&mut self, id: EventId) {
        self.ids.put(id, ());
    }

    /// Check if the ID was recently sent, without refreshing it
    #[inline]
    pub(crate) fn contains(&self, id: &EventId) -> bool {
        self.ids.contains(id)
    }
}
