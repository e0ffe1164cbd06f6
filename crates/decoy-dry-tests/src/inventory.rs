// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Inventory helpers built on the storage port.

use thiserror::Error;
use tracing::debug;

use crate::storage::{new_storage_client, StorageClient, StorageError};

/// Value a healthy inventory key holds.
pub const EXPECTED_VALUE: &str = "Hello world";

/// Error type for inventory checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The key is absent.
    #[error("key `{0}` should exist")]
    Missing(String),
    /// The key holds something unexpected.
    #[error("key `{key}` holds `{found}`, expected `{expected}`")]
    WrongValue {
        /// Key that was read.
        key: String,
        /// Stored value.
        found: String,
        /// Value the caller required.
        expected: String,
    },
    /// The storage write failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Checks that `key` exists in `client` and holds [`EXPECTED_VALUE`].
pub fn check_item_key(client: &dyn StorageClient, key: &str) -> Result<(), InventoryError> {
    let value = client
        .get(key)
        .ok_or_else(|| InventoryError::Missing(key.to_owned()))?;
    if value == EXPECTED_VALUE {
        Ok(())
    } else {
        Err(InventoryError::WrongValue {
            key: key.to_owned(),
            found: value,
            expected: EXPECTED_VALUE.to_owned(),
        })
    }
}

/// Like [`check_item_key`], with the client obtained from the factory target.
pub fn check_item_key_default(key: &str) -> Result<(), InventoryError> {
    let client = new_storage_client();
    check_item_key(client.as_ref(), key)
}

/// Returns the value under `key`, storing `default` first when it is absent.
///
/// The value is read back after the write and must equal `default`.
pub fn replace_with_default(
    client: &dyn StorageClient,
    key: &str,
    default: &str,
) -> Result<String, InventoryError> {
    if let Some(existing) = client.get(key) {
        return Ok(existing);
    }
    debug!(key, "key absent; storing default");
    client.set(key, default)?;
    let stored = client
        .get(key)
        .ok_or_else(|| InventoryError::Missing(key.to_owned()))?;
    if stored == default {
        Ok(stored)
    } else {
        Err(InventoryError::WrongValue {
            key: key.to_owned(),
            found: stored,
            expected: default.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::storage::InMemoryStorage;

    #[test]
    fn check_accepts_expected_value() {
        let store = InMemoryStorage::new();
        store.set("k", EXPECTED_VALUE).unwrap();
        assert_eq!(check_item_key(&store, "k"), Ok(()));
    }

    #[test]
    fn check_reports_missing_and_wrong_values() {
        let store = InMemoryStorage::new();
        assert_eq!(
            check_item_key(&store, "k"),
            Err(InventoryError::Missing("k".into()))
        );
        store.set("k", "nope").unwrap();
        assert!(matches!(
            check_item_key(&store, "k"),
            Err(InventoryError::WrongValue { .. })
        ));
    }

    #[test]
    fn replace_keeps_existing_value() {
        let store = InMemoryStorage::new();
        store.set("k", "old").unwrap();
        assert_eq!(replace_with_default(&store, "k", "new").unwrap(), "old");
        assert_eq!(store.set_count(), 1);
    }

    #[test]
    fn replace_stores_default_when_absent() {
        let store = InMemoryStorage::new();
        assert_eq!(replace_with_default(&store, "k", "new").unwrap(), "new");
        assert_eq!(store.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn replace_propagates_storage_errors() {
        let store = InMemoryStorage::new();
        store.set_fail_on_set(true);
        assert_eq!(
            replace_with_default(&store, "k", "new"),
            Err(InventoryError::Storage(StorageError::Rejected("k".into())))
        );
    }
}
