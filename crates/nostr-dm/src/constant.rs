// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Constants

use std::num::NonZeroUsize;
use std::time::Duration;

/// Default timeout for relay `OK` acknowledgements of an outbound message
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(4);

/// Default timeout for DM relay (kind 10050) lookups
pub const DEFAULT_RELAY_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the recently sent message IDs set
pub const DEFAULT_DEDUP_CAPACITY: NonZeroUsize = NonZeroUsize::new(10).unwrap();

/// Default number of months scanned backward by a rescan
pub const DEFAULT_RESCAN_MONTHS: u32 = 36;

/// Default delay before a rescan starts
pub const DEFAULT_RESCAN_GRACE: Duration = Duration::from_secs(5);

/// Default delay between two rescan windows
pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Default notification channel size
pub const DEFAULT_NOTIFICATION_CHANNEL_SIZE: usize = 4096;

/// Length of a rescan window, in seconds (30 days)
pub const RESCAN_WINDOW_SECS: u64 = 30 * 24 * 60 * 60;

/// Seconds per day, used for day grouping
pub(crate) const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Max number of outbound messages whose delivery results are retained
pub(crate) const MAX_TRACKED_MESSAGES: NonZeroUsize = NonZeroUsize::new(1024).unwrap();
