// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Conversation classifier
//!
//! Partitions the conversations of an account into visible buckets.

use std::collections::HashSet;
use std::sync::Arc;

use nostr::PublicKey;

use crate::conversation::ConversationRecord;
use crate::trust::TrustPolicy;

/// Classified conversations
///
/// Each bucket keeps the input order, with pinned conversations moved first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationBuckets {
    /// Accepted conversations
    pub accepted: Vec<ConversationRecord>,
    /// Message requests admitted by the trust policy
    pub requests: Vec<ConversationRecord>,
    /// Message requests rejected by the trust policy
    pub requests_outside_trust: Vec<ConversationRecord>,
    /// Hidden conversations
    pub hidden: Vec<ConversationRecord>,
    /// Two-party conversations with a blocked counterpart
    pub blocked: Vec<ConversationRecord>,
}

impl ConversationBuckets {
    /// Total unread messages of the accepted conversations (badge count)
    pub fn unread(&self) -> usize {
        self.accepted.iter().map(|c| c.unread).sum()
    }

    /// Total unread messages of the requests admitted by the trust policy
    pub fn new_requests(&self) -> usize {
        self.requests.iter().map(|c| c.unread).sum()
    }

    /// Number of requests rejected by the trust policy
    #[inline]
    pub fn outside_trust_count(&self) -> usize {
        self.requests_outside_trust.len()
    }

    /// Number of hidden conversations
    #[inline]
    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    /// Requests to display, optionally revealing the ones outside the trust policy
    pub fn visible_requests(
        &self,
        show_outside_trust: bool,
    ) -> impl Iterator<Item = &ConversationRecord> {
        let outside: &[ConversationRecord] = if show_outside_trust {
            &self.requests_outside_trust
        } else {
            &[]
        };

        self.requests.iter().chain(outside.iter())
    }

    /// Check if there are no accepted conversations and no requests
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
            && self.requests.is_empty()
            && self.requests_outside_trust.is_empty()
    }
}

/// Conversation classifier
#[derive(Debug, Clone)]
pub struct ConversationClassifier {
    account: PublicKey,
    blocked: HashSet<PublicKey>,
    allowed: HashSet<PublicKey>,
    trust: Option<Arc<dyn TrustPolicy>>,
}

impl ConversationClassifier {
    /// New classifier for `account`, without block list and with trust filtering disabled
    pub fn new(account: PublicKey) -> Self {
        Self {
            account,
            blocked: HashSet::new(),
            allowed: HashSet::new(),
            trust: None,
        }
    }

    /// Set the block list
    pub fn blocked<I>(mut self, public_keys: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        self.blocked = public_keys.into_iter().collect();
        self
    }

    /// Enable trust filtering of message requests
    #[inline]
    pub fn trust_policy<T>(mut self, policy: T) -> Self
    where
        T: TrustPolicy + 'static,
    {
        self.trust = Some(Arc::new(policy));
        self
    }

    /// Enable trust filtering with a shared policy
    #[inline]
    pub fn shared_trust_policy(mut self, policy: Arc<dyn TrustPolicy>) -> Self {
        self.trust = Some(policy);
        self
    }

    /// Always admit `public_key` in the requests, regardless of the trust policy
    #[inline]
    pub fn allow(&mut self, public_key: PublicKey) {
        self.allowed.insert(public_key);
    }

    #[inline]
    fn is_blocked(&self, conversation: &ConversationRecord) -> bool {
        match conversation.counterpart() {
            Some(counterpart) => self.blocked.contains(&counterpart),
            None => false,
        }
    }

    fn is_trusted(&self, conversation: &ConversationRecord, allowed: &HashSet<PublicKey>) -> bool {
        let Some(trust) = &self.trust else {
            return true;
        };

        // Groups and conversations with self are never filtered here
        match conversation.counterpart() {
            Some(counterpart) => allowed.contains(&counterpart) || trust.is_allowed(&counterpart),
            None => true,
        }
    }

    /// Classify the conversations
    ///
    /// Records of other accounts are skipped.
    pub fn classify<I>(&self, conversations: I) -> ConversationBuckets
    where
        I: IntoIterator<Item = ConversationRecord>,
    {
        let conversations: Vec<ConversationRecord> = conversations
            .into_iter()
            .filter(|c| c.account == self.account)
            .collect();

        // Counterparts the account started a conversation with
        let allowed: HashSet<PublicKey> = conversations
            .iter()
            .filter(|c| c.is_initiated_by_account())
            .filter_map(|c| c.counterpart())
            .chain(self.allowed.iter().copied())
            .collect();

        let mut buckets: ConversationBuckets = ConversationBuckets::default();

        for conversation in conversations.into_iter() {
            if conversation.hidden {
                buckets.hidden.push(conversation);
            } else if self.is_blocked(&conversation) {
                buckets.blocked.push(conversation);
            } else if conversation.accepted {
                buckets.accepted.push(conversation);
            } else if self.is_trusted(&conversation, &allowed) {
                buckets.requests.push(conversation);
            } else {
                buckets.requests_outside_trust.push(conversation);
            }
        }

        pinned_first(&mut buckets.accepted);
        pinned_first(&mut buckets.requests);
        pinned_first(&mut buckets.requests_outside_trust);
        pinned_first(&mut buckets.hidden);

        buckets
    }
}

/// Stable sort with pinned conversations first
#[inline]
fn pinned_first(conversations: &mut [ConversationRecord]) {
    conversations.sort_by_key(|c| !c.pinned);
}

#[cfg(test)]
mod tests {
    use nostr::Keys;

    use super::*;
    use crate::key::Participants;
    use crate::trust::{AllowAll, TrustedSet};

    fn conversation(account: PublicKey, others: &[PublicKey]) -> ConversationRecord {
        ConversationRecord::new(
            account,
            Participants::new(others.iter().copied().chain([account])),
        )
    }

    #[derive(Debug)]
    struct RejectAll;

    impl TrustPolicy for RejectAll {
        fn is_allowed(&self, _public_key: &PublicKey) -> bool {
            false
        }
    }

    #[test]
    fn test_partition_is_exhaustive_and_disjoint() {
        let account = Keys::generate().public_key();
        let friend = Keys::generate().public_key();
        let stranger = Keys::generate().public_key();
        let spammer = Keys::generate().public_key();
        let blocked = Keys::generate().public_key();

        let mut accepted = conversation(account, &[friend]);
        accepted.accepted = true;
        accepted.unread = 2;

        let mut request = conversation(account, &[stranger]);
        request.unread = 3;

        let outside = conversation(account, &[spammer]);

        let mut blocked_conv = conversation(account, &[blocked]);
        blocked_conv.accepted = true;

        let mut hidden = conversation(account, &[Keys::generate().public_key()]);
        hidden.hidden = true;

        let classifier = ConversationClassifier::new(account)
            .blocked([blocked])
            .trust_policy(TrustedSet::new([stranger]));

        let buckets = classifier.classify(vec![
            accepted.clone(),
            request.clone(),
            outside.clone(),
            blocked_conv,
            hidden,
        ]);

        assert_eq!(buckets.accepted, vec![accepted]);
        assert_eq!(buckets.requests, vec![request]);
        assert_eq!(buckets.requests_outside_trust, vec![outside]);
        assert_eq!(buckets.blocked.len(), 1);
        assert_eq!(buckets.hidden_count(), 1);

        assert_eq!(buckets.unread(), 2);
        assert_eq!(buckets.new_requests(), 3);
        assert_eq!(buckets.outside_trust_count(), 1);
        assert_eq!(buckets.visible_requests(false).count(), 1);
        assert_eq!(buckets.visible_requests(true).count(), 2);
    }

    #[test]
    fn test_groups_bypass_trust() {
        let account = Keys::generate().public_key();
        let a = Keys::generate().public_key();
        let b = Keys::generate().public_key();

        let group = conversation(account, &[a, b]);

        let classifier = ConversationClassifier::new(account)
            .blocked([a, b])
            .trust_policy(RejectAll);

        let buckets = classifier.classify(vec![group]);
        assert_eq!(buckets.requests.len(), 1);
    }

    #[test]
    fn test_trust_disabled_admits_everyone() {
        let account = Keys::generate().public_key();
        let stranger = Keys::generate().public_key();

        let buckets =
            ConversationClassifier::new(account).classify(vec![conversation(account, &[stranger])]);
        assert_eq!(buckets.requests.len(), 1);

        let buckets = ConversationClassifier::new(account)
            .trust_policy(AllowAll)
            .classify(vec![conversation(account, &[stranger])]);
        assert_eq!(buckets.requests.len(), 1);
    }

    #[test]
    fn test_initiated_conversations_are_allowed() {
        let account = Keys::generate().public_key();
        let contacted = Keys::generate().public_key();
        let manual = Keys::generate().public_key();

        let mut initiated = conversation(account, &[contacted]);
        initiated.initiator = Some(account);
        initiated.hidden = true;

        let request = conversation(account, &[contacted]);
        let manual_request = conversation(account, &[manual]);

        let mut classifier = ConversationClassifier::new(account).trust_policy(RejectAll);
        classifier.allow(manual);

        let buckets = classifier.classify(vec![initiated, request, manual_request]);
        assert_eq!(buckets.requests.len(), 2);
        assert!(buckets.requests_outside_trust.is_empty());
    }

    #[test]
    fn test_pinned_first_is_stable() {
        let account = Keys::generate().public_key();
        let keys: Vec<PublicKey> = (0..4).map(|_| Keys::generate().public_key()).collect();

        let mut conversations: Vec<ConversationRecord> = keys
            .iter()
            .map(|pk| {
                let mut c = conversation(account, &[*pk]);
                c.accepted = true;
                c
            })
            .collect();
        conversations[1].pinned = true;
        conversations[3].pinned = true;

        let buckets = ConversationClassifier::new(account).classify(conversations.clone());
        let order: Vec<PublicKey> = buckets
            .accepted
            .iter()
            .filter_map(|c| c.counterpart())
            .collect();

        assert_eq!(order, vec![keys[1], keys[3], keys[0], keys[2]]);
    }

    #[test]
    fn test_other_accounts_are_skipped() {
        let account = Keys::generate().public_key();
        let other_account = Keys::generate().public_key();
        let stranger = Keys::generate().public_key();

        let buckets = ConversationClassifier::new(account)
            .classify(vec![conversation(other_account, &[stranger])]);
        assert!(buckets.is_empty());
    }
}
