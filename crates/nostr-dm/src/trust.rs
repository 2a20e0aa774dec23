// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Trust policies

use std::collections::HashSet;
use std::fmt::Debug;

use nostr::PublicKey;

/// Web of trust predicate
///
/// Used to hide message requests that are likely spam.
pub trait TrustPolicy: Debug + Send + Sync {
    /// Check if the [`PublicKey`] is admitted
    fn is_allowed(&self, public_key: &PublicKey) -> bool;
}

/// Admit everyone
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl TrustPolicy for AllowAll {
    #[inline]
    fn is_allowed(&self, _public_key: &PublicKey) -> bool {
        true
    }
}

/// Admit only a fixed set of public keys
#[derive(Debug, Clone, Default)]
pub struct TrustedSet {
    public_keys: HashSet<PublicKey>,
}

impl TrustedSet {
    /// New trusted set
    pub fn new<I>(public_keys: I) -> Self
    where
        I: IntoIterator<Item = PublicKey>,
    {
        Self {
            public_keys: public_keys.into_iter().collect(),
        }
    }

    /// Trust a public key
    #[inline]
    pub fn insert(&mut self, public_key: PublicKey) -> bool {
        self.public_keys.insert(public_key)
    }
}

impl TrustPolicy for TrustedSet {
    #[inline]
    fn is_allowed(&self, public_key: &PublicKey) -> bool {
        self.public_keys.contains(public_key)
    }
}
