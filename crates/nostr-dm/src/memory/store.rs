// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use nostr::util::BoxedFuture;
use nostr::{EventId, PublicKey, RelayUrl};
use tokio::sync::Mutex;

use crate::conversation::ConversationRecord;
use crate::key::{ConversationKey, Participants};
use crate::message::DirectMessage;
use crate::store::{ConversationStore, SaveMessageStatus, StoreError};

#[derive(Debug, Default)]
struct AccountData {
    conversations: HashMap<ConversationKey, ConversationRecord>,
    messages: HashMap<EventId, DirectMessage>,
}

/// In-memory conversation store
///
/// Records are lost on drop.
#[derive(Debug, Clone, Default)]
pub struct MemoryConversationStore {
    accounts: Arc<Mutex<HashMap<PublicKey, AccountData>>>,
}

impl MemoryConversationStore {
    /// Construct a new empty store
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationStore for MemoryConversationStore {
    fn fetch_or_create<'a>(
        &'a self,
        account: &'a PublicKey,
        participants: &'a Participants,
    ) -> BoxedFuture<'a, Result<ConversationRecord, StoreError>> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().await;
            let data: &mut AccountData = accounts.entry(*account).or_default();

            let record: &mut ConversationRecord = data
                .conversations
                .entry(participants.key())
                .or_insert_with(|| ConversationRecord::new(*account, participants.clone()));

            Ok(record.clone())
        })
    }

    fn fetch<'a>(
        &'a self,
        account: &'a PublicKey,
        key: &'a ConversationKey,
    ) -> BoxedFuture<'a, Result<Option<ConversationRecord>, StoreError>> {
        Box::pin(async move {
            let accounts = self.accounts.lock().await;
            Ok(accounts
                .get(account)
                .and_then(|data| data.conversations.get(key))
                .cloned())
        })
    }

    fn fetch_by_account<'a>(
        &'a self,
        account: &'a PublicKey,
    ) -> BoxedFuture<'a, Result<Vec<ConversationRecord>, StoreError>> {
        Box::pin(async move {
            let accounts = self.accounts.lock().await;

            let mut records: Vec<ConversationRecord> = match accounts.get(account) {
                Some(data) => data.conversations.values().cloned().collect(),
                None => return Ok(Vec::new()),
            };

            // Most recent first, conversations without messages last
            records.sort_by(|a, b| {
                b.last_message_at
                    .cmp(&a.last_message_at)
                    .then_with(|| a.key.cmp(&b.key))
            });

            Ok(records)
        })
    }

    fn save_conversation<'a>(
        &'a self,
        record: &'a ConversationRecord,
    ) -> BoxedFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().await;
            accounts
                .entry(record.account)
                .or_default()
                .conversations
                .insert(record.key.clone(), record.clone());
            Ok(())
        })
    }

    fn save_message<'a>(
        &'a self,
        account: &'a PublicKey,
        message: &'a DirectMessage,
    ) -> BoxedFuture<'a, Result<SaveMessageStatus, StoreError>> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().await;
            let data: &mut AccountData = accounts.entry(*account).or_default();

            match data.messages.entry(message.id) {
                Entry::Occupied(..) => Ok(SaveMessageStatus::Duplicate),
                Entry::Vacant(entry) => {
                    entry.insert(message.clone());
                    Ok(SaveMessageStatus::Saved)
                }
            }
        })
    }

    fn message<'a>(
        &'a self,
        account: &'a PublicKey,
        id: &'a EventId,
    ) -> BoxedFuture<'a, Result<Option<DirectMessage>, StoreError>> {
        Box::pin(async move {
            let accounts = self.accounts.lock().await;
            Ok(accounts
                .get(account)
                .and_then(|data| data.messages.get(id))
                .cloned())
        })
    }

    fn messages<'a>(
        &'a self,
        account: &'a PublicKey,
        key: &'a ConversationKey,
    ) -> BoxedFuture<'a, Result<Vec<DirectMessage>, StoreError>> {
        Box::pin(async move {
            let accounts = self.accounts.lock().await;

            let mut messages: Vec<DirectMessage> = match accounts.get(account) {
                Some(data) => data
                    .messages
                    .values()
                    .filter(|m| &m.conversation == key)
                    .cloned()
                    .collect(),
                None => return Ok(Vec::new()),
            };

            messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

            Ok(messages)
        })
    }

    fn remove_message<'a>(
        &'a self,
        account: &'a PublicKey,
        id: &'a EventId,
    ) -> BoxedFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().await;
            Ok(accounts
                .get_mut(account)
                .and_then(|data| data.messages.remove(id))
                .is_some())
        })
    }

    fn add_message_relay<'a>(
        &'a self,
        account: &'a PublicKey,
        id: &'a EventId,
        relay_url: &'a RelayUrl,
    ) -> BoxedFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let mut accounts = self.accounts.lock().await;

            match accounts
                .get_mut(account)
                .and_then(|data| data.messages.get_mut(id))
            {
                Some(message) => {
                    message.relays.insert(relay_url.clone());
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use nostr::Keys;

    use super::*;
    use crate::message::MessageKind;
    use crate::testing;

    #[tokio::test]
    async fn test_fetch_or_create_is_idempotent() {
        let store = MemoryConversationStore::new();
        let account = Keys::generate().public_key();
        let other = Keys::generate().public_key();

        let participants = Participants::new([account, other]);
        let mut record = store.fetch_or_create(&account, &participants).await.unwrap();
        assert!(!record.accepted);

        record.accepted = true;
        store.save_conversation(&record).await.unwrap();

        let reversed = Participants::new([other, account]);
        let record = store.fetch_or_create(&account, &reversed).await.unwrap();
        assert!(record.accepted);

        // Scoped per account
        let by_other = store.fetch_or_create(&other, &reversed).await.unwrap();
        assert!(!by_other.accepted);
        assert_eq!(store.fetch_by_account(&account).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_messages() {
        let store = MemoryConversationStore::new();
        let account = Keys::generate().public_key();
        let relay = testing::url("wss://relay.example.com");

        let later = testing::message(account, 20, MessageKind::Modern);
        let earlier = testing::message(account, 10, MessageKind::Legacy);

        assert!(store.save_message(&account, &later).await.unwrap().is_saved());
        assert!(store.save_message(&account, &earlier).await.unwrap().is_saved());
        assert_eq!(
            store.save_message(&account, &later).await.unwrap(),
            SaveMessageStatus::Duplicate
        );

        let messages = store.messages(&account, &later.conversation).await.unwrap();
        assert_eq!(messages, vec![earlier.clone(), later.clone()]);

        assert!(store
            .add_message_relay(&account, &later.id, &relay)
            .await
            .unwrap());
        let stored = store.message(&account, &later.id).await.unwrap().unwrap();
        assert!(stored.relays.contains(&relay));

        assert!(store.remove_message(&account, &earlier.id).await.unwrap());
        assert!(!store.remove_message(&account, &earlier.id).await.unwrap());
        assert!(!store
            .add_message_relay(&account, &earlier.id, &relay)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_fetch_by_account_most_recent_first() {
        let store = MemoryConversationStore::new();
        let account = Keys::generate().public_key();

        let mut old = ConversationRecord::new(
            account,
            Participants::new([account, Keys::generate().public_key()]),
        );
        old.last_message_at = Some(testing::ts(10));

        let mut recent = ConversationRecord::new(
            account,
            Participants::new([account, Keys::generate().public_key()]),
        );
        recent.last_message_at = Some(testing::ts(20));

        let empty = ConversationRecord::new(
            account,
            Participants::new([account, Keys::generate().public_key()]),
        );

        store.save_conversation(&old).await.unwrap();
        store.save_conversation(&empty).await.unwrap();
        store.save_conversation(&recent).await.unwrap();

        let records = store.fetch_by_account(&account).await.unwrap();
        assert_eq!(records, vec![recent, old, empty]);
    }
}
