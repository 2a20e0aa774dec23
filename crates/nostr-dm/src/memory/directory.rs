// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use nostr::nips::nip17;
use nostr::util::BoxedFuture;
use nostr::{Event, Kind, PublicKey, RelayUrl, Timestamp};
use tokio::sync::RwLock;

use crate::directory::{DirectoryError, DmRelayDirectory};

#[derive(Debug, Clone)]
struct InboxRelays {
    created_at: Timestamp,
    relays: HashSet<RelayUrl>,
}

/// In-memory DM relay directory
///
/// Fed with kind 10050 events; the most recent list of each author wins.
#[derive(Debug, Clone, Default)]
pub struct MemoryRelayDirectory {
    lists: Arc<RwLock<HashMap<PublicKey, InboxRelays>>>,
}

impl MemoryRelayDirectory {
    /// Construct a new empty directory
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a DM relay list event
    ///
    /// Returns `false` if the event is not a kind 10050 or is older than the known list.
    pub async fn process_event(&self, event: &Event) -> bool {
        if event.kind != Kind::InboxRelays {
            return false;
        }

        let mut lists = self.lists.write().await;

        if let Some(current) = lists.get(&event.pubkey) {
            if current.created_at >= event.created_at {
                return false;
            }
        }

        let relays: HashSet<RelayUrl> = nip17::extract_relay_list(event).cloned().collect();

        tracing::debug!(
            public_key = %event.pubkey,
            relays = relays.len(),
            "Updated DM relays."
        );

        lists.insert(
            event.pubkey,
            InboxRelays {
                created_at: event.created_at,
                relays,
            },
        );

        true
    }

    /// Replace the DM relays of a public key
    pub async fn set_relays<I>(&self, public_key: PublicKey, relays: I)
    where
        I: IntoIterator<Item = RelayUrl>,
    {
        let mut lists = self.lists.write().await;
        lists.insert(
            public_key,
            InboxRelays {
                created_at: Timestamp::now(),
                relays: relays.into_iter().collect(),
            },
        );
    }
}

impl DmRelayDirectory for MemoryRelayDirectory {
    fn dm_relays<'a>(
        &'a self,
        public_key: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<HashSet<RelayUrl>, DirectoryError>> {
        Box::pin(async move {
            let lists = self.lists.read().await;
            Ok(lists
                .get(public_key)
                .map(|list| list.relays.clone())
                .unwrap_or_default())
        })
    }
}
