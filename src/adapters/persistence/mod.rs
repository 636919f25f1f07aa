pub mod file;
pub mod memory;

pub use file::FilePersistence;
pub use memory::InMemoryPersistence;

use serde_json::Value as Json;

/// Raw key-value storage scoped to the application's private area.
///
/// Values are stored in their external (extended-JSON) representation; decoding
/// is the caller's concern.
pub trait Persistence: Send + Sync + std::fmt::Debug {
    /// Reads the value stored under `key`, or `None` if nothing is stored.
    ///
    /// # Errors
    /// Returns an error if the underlying storage cannot be read.
    fn read_raw(&self, key: &str) -> anyhow::Result<Option<Json>>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    /// Returns an error if the value could not be durably written. A failed write
    /// must leave the previously stored value in place.
    fn write_raw(&self, key: &str, value: Json) -> anyhow::Result<()>;
}
