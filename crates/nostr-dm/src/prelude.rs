// Copyright (c) 2022-2023 Yuki Kishimoto
// Copyright (c) 2023-2025 Rust Nostr Developers
// Distributed under the MIT software license

//! Prelude

#![allow(unknown_lints)]
#![allow(ambiguous_glob_reexports)]
#![doc(hidden)]

pub use nostr::prelude::*;

pub use crate::classifier::*;
pub use crate::constant::*;
pub use crate::conversation::*;
pub use crate::crypto::*;
pub use crate::delivery::*;
pub use crate::directory::*;
pub use crate::engine::{self, *};
pub use crate::key::*;
pub use crate::memory::*;
pub use crate::message::*;
pub use crate::options::*;
pub use crate::rescan::*;
pub use crate::store::*;
pub use crate::tracker::*;
pub use crate::transport::*;
pub use crate::trust::*;
pub use crate::version::*;
pub use crate::*;
