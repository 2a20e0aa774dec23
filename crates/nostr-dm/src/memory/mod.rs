// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! In-memory backends

mod directory;
mod store;

pub use self::directory::MemoryRelayDirectory;
pub use self::store::MemoryConversationStore;
