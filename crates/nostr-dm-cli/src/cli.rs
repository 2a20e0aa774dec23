// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use clap::{Parser, Subcommand};
use nostr::{PublicKey, RelayUrl};

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute the conversation key of a set of participants
    #[command(arg_required_else_help = true)]
    ConversationKey {
        /// Participants (order and duplicates don't matter)
        participants: Vec<PublicKey>,
    },
    /// Print the history requests of a rescan
    RescanPlan {
        /// Account public key
        public_key: PublicKey,
        /// Number of 30-day windows
        #[clap(short, long, default_value_t = 3)]
        months: u32,
    },
    /// Send a message through a loopback transport and print the delivery results
    Simulate {
        /// Number of receivers (more than 1 makes it a group conversation)
        #[clap(short, long, default_value_t = 1)]
        receivers: usize,
        /// DM relays published by every receiver (none forces the legacy protocol for 1 receiver)
        #[clap(long)]
        relays: Vec<RelayUrl>,
        /// Relays that never acknowledge
        #[clap(long)]
        silent: Vec<RelayUrl>,
        /// Relays with a persistent connection (the others get a one-shot connection)
        #[clap(long)]
        connected: Vec<RelayUrl>,
        /// Delivery timeout in milliseconds
        #[clap(long, default_value_t = 500)]
        timeout_ms: u64,
        /// Message content
        #[clap(short, long, default_value = "hello")]
        content: String,
    },
}
