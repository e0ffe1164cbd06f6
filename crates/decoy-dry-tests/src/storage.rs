// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Key/value storage port, its in-memory implementation and its double.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use decoy_core::{func, CallSite, Controller, ExpectationBuilder, Func, Target};
use thiserror::Error;
use tracing::debug;

/// Error type for storage writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Backend refused the write.
    #[error("write rejected for key `{0}`")]
    Rejected(String),
    /// Backend is not reachable.
    #[error("storage unavailable")]
    Unavailable,
}

/// Storage port used by the inventory helpers.
pub trait StorageClient: Send + Sync {
    /// Value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory [`StorageClient`] with call counters.
///
/// Clones share the same map. Both trait methods dispatch through the
/// [`STORAGE_GET`] and [`STORAGE_SET`] method targets, so tests can patch the
/// concrete implementation without swapping the client itself.
///
/// # Example
///
/// ```
/// use decoy_dry_tests::{InMemoryStorage, StorageClient};
///
/// let store = InMemoryStorage::new();
/// store.set("k1", "Hello world").unwrap();
/// assert_eq!(store.get("k1").as_deref(), Some("Hello world"));
/// assert_eq!(store.set_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<Mutex<InMemoryStorageInner>>,
}

#[derive(Debug, Default)]
struct InMemoryStorageInner {
    data: HashMap<String, String>,
    get_count: usize,
    set_count: usize,
    fail_on_set: bool,
}

static SHARED: LazyLock<InMemoryStorage> = LazyLock::new(InMemoryStorage::new);

impl InMemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given pairs.
    pub fn with_data(data: HashMap<String, String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InMemoryStorageInner {
                data,
                ..Default::default()
            })),
        }
    }

    /// Process-wide store handed out by the default client factory.
    pub fn shared() -> Self {
        SHARED.clone()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryStorageInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Configure the store to reject writes.
    pub fn set_fail_on_set(&self, fail: bool) {
        self.lock().fail_on_set = fail;
    }

    /// Number of `get` calls that reached the real implementation.
    pub fn get_count(&self) -> usize {
        self.lock().get_count
    }

    /// Number of `set` calls that reached the real implementation.
    pub fn set_count(&self) -> usize {
        self.lock().set_count
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    /// Reset data, counters and failure flag.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.data.clear();
        inner.get_count = 0;
        inner.set_count = 0;
        inner.fail_on_set = false;
    }

    fn real_get(&self, key: &str) -> Option<String> {
        let mut inner = self.lock();
        inner.get_count += 1;
        inner.data.get(key).cloned()
    }

    fn real_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        inner.set_count += 1;
        if inner.fail_on_set {
            return Err(StorageError::Rejected(key.to_owned()));
        }
        inner.data.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// Patchable body of [`InMemoryStorage::get`].
pub static STORAGE_GET: LazyLock<Target<Func<(InMemoryStorage, String), Option<String>>>> =
    LazyLock::new(|| {
        Target::method(
            "InMemoryStorage::get",
            func(|(store, key): (InMemoryStorage, String)| store.real_get(&key)),
        )
    });

/// Patchable body of [`InMemoryStorage::set`].
pub static STORAGE_SET: LazyLock<
    Target<Func<(InMemoryStorage, String, String), Result<(), StorageError>>>,
> = LazyLock::new(|| {
    Target::method(
        "InMemoryStorage::set",
        func(|(store, key, value): (InMemoryStorage, String, String)| {
            store.real_set(&key, &value)
        }),
    )
});

impl StorageClient for InMemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        STORAGE_GET.call((self.clone(), key.to_owned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        STORAGE_SET.call((self.clone(), key.to_owned(), value.to_owned()))
    }
}

/// Call site of [`StorageClient::get`] on a [`MockStorageClient`].
pub const GET: CallSite<(String,), Option<String>> = CallSite::method("StorageClient::get");
/// Call site of [`StorageClient::set`] on a [`MockStorageClient`].
pub const SET: CallSite<(String, String), Result<(), StorageError>> =
    CallSite::method("StorageClient::set");

/// Controller-backed [`StorageClient`] double.
///
/// Every call is routed through [`Controller::invoke`]; an unexpected call
/// panics with a [`decoy_core::CallError`] payload.
#[derive(Debug, Clone)]
pub struct MockStorageClient {
    controller: Controller,
}

impl MockStorageClient {
    /// Double bound to `controller`.
    pub fn new(controller: &Controller) -> Self {
        Self {
            controller: controller.clone(),
        }
    }

    /// Expectation on `get`.
    pub fn expect_get(&self) -> ExpectationBuilder<'_, (String,), Option<String>> {
        self.controller.expect(GET)
    }

    /// Expectation on `set`.
    pub fn expect_set(&self) -> ExpectationBuilder<'_, (String, String), Result<(), StorageError>> {
        self.controller.expect(SET)
    }
}

impl StorageClient for MockStorageClient {
    fn get(&self, key: &str) -> Option<String> {
        self.controller.invoke(GET, (key.to_owned(),))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.controller
            .invoke(SET, (key.to_owned(), value.to_owned()))
    }
}

/// Factory through which production code obtains its storage client.
pub static NEW_STORAGE_CLIENT: LazyLock<Target<Func<(), Arc<dyn StorageClient>>>> =
    LazyLock::new(|| {
        Target::function(
            "storage::new_storage_client",
            func(|()| -> Arc<dyn StorageClient> { Arc::new(InMemoryStorage::shared()) }),
        )
    });

/// Returns whatever client the factory target currently produces.
pub fn new_storage_client() -> Arc<dyn StorageClient> {
    let client = NEW_STORAGE_CLIENT.call(());
    debug!(patched = NEW_STORAGE_CLIENT.is_patched(), "storage client created");
    client
}
