// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nostr::util::JsonUtil;
use nostr::{EventId, Keys, PublicKey, RelayUrl, Timestamp};
use nostr_dm::memory::MemoryRelayDirectory;
use nostr_dm::rescan::{self, RescanWindow};
use nostr_dm::{ConversationKey, DmEngine, DmOptions, IngestStatus, RecipientResult, SendOutput};
use tracing_subscriber::EnvFilter;

mod cli;
mod loopback;

use self::cli::{Cli, Command};
use self::loopback::LoopbackTransport;

type Result<T, E = Box<dyn std::error::Error>> = std::result::Result<T, E>;

const WRITE_RELAY: &str = "wss://write.loopback";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Cli::parse();

    match args.command {
        Command::ConversationKey { participants } => {
            println!("{}", ConversationKey::from_public_keys(participants));
            Ok(())
        }
        Command::RescanPlan { public_key, months } => {
            let windows: Vec<RescanWindow> = rescan::rescan_windows(Timestamp::now(), months);

            for window in windows.into_iter() {
                println!(
                    "#{} {} -> {}",
                    window.months_ago,
                    window.since.to_human_datetime(),
                    window.until.to_human_datetime()
                );

                for filter in window.filters(public_key).into_iter() {
                    println!("  {}", filter.as_json());
                }
            }

            Ok(())
        }
        Command::Simulate {
            receivers,
            relays,
            silent,
            connected,
            timeout_ms,
            content,
        } => simulate(receivers, relays, silent, connected, timeout_ms, content).await,
    }
}

async fn simulate(
    receivers: usize,
    relays: Vec<RelayUrl>,
    silent: Vec<RelayUrl>,
    connected: Vec<RelayUrl>,
    timeout_ms: u64,
    content: String,
) -> Result<()> {
    let account = Keys::generate();
    let receivers: Vec<Keys> = (0..receivers).map(|_| Keys::generate()).collect();

    let write_relay = RelayUrl::parse(WRITE_RELAY)?;
    let transport = Arc::new(LoopbackTransport::new(
        connected.into_iter().chain([write_relay.clone()]),
        silent,
    ));

    let directory = MemoryRelayDirectory::new();
    for keys in receivers.iter() {
        directory
            .set_relays(keys.public_key(), relays.iter().cloned())
            .await;
    }

    let timeout = Duration::from_millis(timeout_ms);
    let engine = DmEngine::builder(account.clone(), transport.clone())
        .directory(directory)
        .write_relays([write_relay])
        .opts(DmOptions::new().delivery_timeout(timeout))
        .build();
    engine.spawn_ack_listener();

    let output: SendOutput = engine
        .send_message(receivers.iter().map(|k| k.public_key()), content)
        .await?;

    println!("Message: {}", output.message.id);
    println!("Conversation: {}", output.message.conversation);
    println!("Protocol: {}", output.version);

    // Let the OKs arrive and the timeouts fire
    tokio::time::sleep(timeout + Duration::from_millis(100)).await;

    match engine.delivery(&output.message.id) {
        Some(results) => {
            for result in results.iter() {
                print_result(&account.public_key(), result);
            }
        }
        None => {
            let stored = engine.messages(&output.message.conversation).await?;
            let relays: Vec<String> = stored
                .iter()
                .filter(|m| m.id == output.message.id)
                .flat_map(|m| m.relays.iter().map(|r| r.to_string()))
                .collect();
            println!("No per-recipient tracking, accepted by: {relays:?}");
        }
    }

    // Deliver to the receivers
    for (index, keys) in receivers.into_iter().enumerate() {
        let offline = LoopbackTransport::new(Vec::<RelayUrl>::new(), Vec::<RelayUrl>::new());
        let inbox = DmEngine::new(keys, offline);
        let mut seen: HashSet<EventId> = HashSet::new();
        let mut ingested: usize = 0;

        for (event, relay_url, ..) in transport.published().into_iter() {
            if !seen.insert(event.id) {
                continue;
            }

            if inbox.handle_event(&event, Some(&relay_url)).await? == IngestStatus::Ingested {
                ingested += 1;
            }
        }

        println!("Receiver #{index} ({}): {ingested} message(s)", inbox.public_key());
    }

    Ok(())
}

fn print_result(account: &PublicKey, result: &RecipientResult) {
    let label: String = if &result.recipient == account {
        String::from("self")
    } else {
        result.recipient.to_string()
    };

    if result.is_no_relays() {
        println!("{label}: no DM relays");
        return;
    }

    let mut relays: Vec<(String, String)> = result
        .relays
        .iter()
        .map(|(url, state)| (url.to_string(), state.to_string()))
        .collect();
    relays.sort();

    println!("{label}:");
    for (url, state) in relays.into_iter() {
        println!("  {url}: {state}");
    }
}
