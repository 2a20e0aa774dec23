// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Historical rescan
//!
//! Recovers messages that the live subscription missed (i.e., sent while offline),
//! requesting history in 30-day windows going backward from now.

use nostr::{Filter, Kind, PublicKey, Timestamp};

use crate::constant::RESCAN_WINDOW_SECS;

/// Time window of a rescan request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RescanWindow {
    /// Window index, starting from `0` for the most recent one
    pub months_ago: u32,
    /// Window start
    pub since: Timestamp,
    /// Window end
    pub until: Timestamp,
}

impl RescanWindow {
    /// Filters of the window
    ///
    /// Legacy messages sent and received by the account, and gift wraps addressed to it.
    /// Gift wraps are signed by throw-away keys, so they can't be matched by author.
    pub fn filters(&self, account: PublicKey) -> Vec<Filter> {
        vec![
            Filter::new()
                .author(account)
                .kind(Kind::EncryptedDirectMessage)
                .since(self.since)
                .until(self.until),
            Filter::new()
                .pubkey(account)
                .kind(Kind::EncryptedDirectMessage)
                .since(self.since)
                .until(self.until),
            Filter::new()
                .pubkey(account)
                .kind(Kind::GiftWrap)
                .since(self.since)
                .until(self.until),
        ]
    }
}

/// Plan `months` consecutive windows ending at `now`, most recent first
///
/// Windows never go before the UNIX epoch: planning stops at the first window starting at `0`.
pub fn rescan_windows(now: Timestamp, months: u32) -> Vec<RescanWindow> {
    let mut windows: Vec<RescanWindow> = Vec::with_capacity(months as usize);
    let mut until: u64 = now.as_secs();

    for months_ago in 0..months {
        let since: u64 = until.saturating_sub(RESCAN_WINDOW_SECS);

        windows.push(RescanWindow {
            months_ago,
            since: Timestamp::from(since),
            until: Timestamp::from(until),
        });

        if since == 0 {
            break;
        }

        until = since;
    }

    windows
}
