// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::key::ConversationKey;

/// One lock per conversation
///
/// Sends, ingests and flag writes of a conversation are serialized,
/// different conversations proceed concurrently.
#[derive(Debug, Default)]
pub(super) struct ConversationLocks {
    locks: Mutex<HashMap<ConversationKey, Arc<AsyncMutex<()>>>>,
}

impl ConversationLocks {
    pub(super) async fn lock(&self, key: &ConversationKey) -> OwnedMutexGuard<()> {
        let lock: Arc<AsyncMutex<()>> = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.clone()).or_default().clone()
        };

        lock.lock_owned().await
    }
}
