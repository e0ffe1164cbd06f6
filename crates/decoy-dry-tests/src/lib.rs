// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared collaborators, doubles and fixtures for Decoy crates.
#![forbid(unsafe_code)]
//!
//! These are the ordinary business helpers that the engine is exercised
//! against. Each reaches its real implementation only through a
//! [`decoy_core::Target`] or an injected trait object, which is what makes it
//! interceptable.
//!
//! # Modules
//!
//! - [`storage`] - Key/value port, in-memory client, controller-backed double, client factory
//! - [`inventory`] - Key checks and default-and-replace over the storage port
//! - [`exec`] - Subprocess runner behind a function target
//! - [`decoder`] - Movie decoder port, JSON decoder, double, decoder factory
//! - [`globals`] - Global value and function variable targets

use std::sync::{Mutex, MutexGuard};

use decoy_core::{SetupError, TargetRegistry};

pub mod decoder;
pub mod exec;
pub mod globals;
pub mod inventory;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use decoder::{
    load_movie, new_decoder, DecodeError, Decoder, JsonDecoder, MockDecoder, Movie, DECODE,
    JSON_DECODE, NEW_DECODER,
};
pub use exec::{run, ExecArgs, ExecError, ExecFn, EXEC};
pub use globals::{clamp_to_limit, tokenize, DEFAULT_LIMIT, LIMIT, TOKENIZE};
pub use inventory::{
    check_item_key, check_item_key_default, replace_with_default, InventoryError, EXPECTED_VALUE,
};
pub use storage::{
    new_storage_client, InMemoryStorage, MockStorageClient, StorageClient, StorageError, GET,
    NEW_STORAGE_CLIENT, SET, STORAGE_GET, STORAGE_SET,
};

static SERIAL: Mutex<()> = Mutex::new(());

/// Serializes tests that patch the process-wide targets in this crate.
///
/// Hold the guard for the whole test; a poisoned lock is recovered.
pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|e| e.into_inner())
}

/// Registers every process-wide target of this crate with `registry`.
pub fn register_targets(registry: &TargetRegistry) -> Result<(), SetupError> {
    registry.register(&NEW_STORAGE_CLIENT)?;
    registry.register(&STORAGE_GET)?;
    registry.register(&STORAGE_SET)?;
    registry.register(&EXEC)?;
    registry.register(&NEW_DECODER)?;
    registry.register(&JSON_DECODE)?;
    registry.register(&LIMIT)?;
    registry.register(&TOKENIZE)?;
    Ok(())
}
