use crate::adapters::persistence::Persistence;
use crate::domain::document::Document;
use crate::domain::extended_json;
use crate::domain::provider::PushProviderInfo;
use crate::error::{AppError, Result};
use opentelemetry::{KeyValue, global, metrics::Counter};
use parking_lot::Mutex;
use std::sync::Arc;

/// Namespace key under which all provider configs are persisted.
pub const DEFAULT_CONFIGS_KEY: &str = "apns.configs";

#[derive(Clone, Debug)]
struct Metrics {
    writes: Counter<u64>,
    write_errors: Counter<u64>,
    discarded_reads: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("push-registrar");
        Self {
            writes: meter
                .u64_counter("push_config_writes_total")
                .with_description("Total number of provider config writes")
                .build(),
            write_errors: meter
                .u64_counter("push_config_write_errors_total")
                .with_description("Total number of provider config writes that failed")
                .build(),
            discarded_reads: meter
                .u64_counter("push_config_discarded_reads_total")
                .with_description("Total number of unreadable provider configs treated as empty")
                .build(),
        }
    }
}

/// Persists every provider's info as one composite document, keyed by service name.
///
/// Read-modify-write cycles are serialized, so share a single instance per process.
/// Unreadable or malformed persisted state is treated as empty; write failures are
/// reported as `AppError::StoreWriteFailed`. An update that could not be read back
/// intact is refused with `AppError::MalformedDocument` and nothing is written.
#[derive(Debug)]
pub struct ConfigStore {
    persistence: Arc<dyn Persistence>,
    key: String,
    lock: Mutex<()>,
    metrics: Metrics,
}

impl ConfigStore {
    #[must_use]
    pub fn new(persistence: Arc<dyn Persistence>, key: impl Into<String>) -> Self {
        Self { persistence, key: key.into(), lock: Mutex::new(()), metrics: Metrics::new() }
    }

    #[must_use]
    pub fn with_default_key(persistence: Arc<dyn Persistence>) -> Self {
        Self::new(persistence, DEFAULT_CONFIGS_KEY)
    }

    /// Returns the composite document, or an empty one if nothing readable is stored.
    #[must_use]
    pub fn load(&self) -> Document {
        let _guard = self.lock.lock();
        self.read()
    }

    /// Returns the stored info document for `service_name`, if any.
    #[must_use]
    pub fn provider_info(&self, service_name: &str) -> Option<Document> {
        self.load().get_document(service_name).cloned()
    }

    /// Stores `info` under its service name, replacing any previous entry.
    ///
    /// # Errors
    /// Returns `AppError::MalformedDocument` if `info` has keys that extended JSON
    /// cannot carry, or `AppError::StoreWriteFailed` if the updated document cannot
    /// be persisted. Either way the stored entries are left as they were.
    #[tracing::instrument(level = "debug", skip(self, info), fields(service = %info.service_name()), err)]
    pub fn add_provider_info(&self, info: &PushProviderInfo) -> Result<()> {
        self.update(|configs| configs.set(info.service_name(), info.to_document()))
    }

    /// Removes the entry for `info`'s service name. Removing an absent entry is not an error.
    ///
    /// # Errors
    /// Returns `AppError::StoreWriteFailed` if the updated document cannot be persisted.
    pub fn remove_provider_info(&self, info: &PushProviderInfo) -> Result<()> {
        self.remove_service(info.service_name())
    }

    /// Removes the entry for `service_name`, writing the store back even if it was absent.
    ///
    /// # Errors
    /// Returns `AppError::StoreWriteFailed` if the updated document cannot be persisted.
    #[tracing::instrument(level = "debug", skip(self), fields(service = %service_name), err)]
    pub fn remove_service(&self, service_name: &str) -> Result<()> {
        self.update(|configs| {
            configs.remove(service_name);
        })
    }

    fn update(&self, mutate: impl FnOnce(&mut Document)) -> Result<()> {
        let _guard = self.lock.lock();
        let mut configs = self.read();
        mutate(&mut configs);

        let encoded = extended_json::encode_lossless(&configs).inspect_err(|e| {
            self.metrics.write_errors.add(1, &[KeyValue::new("reason", "malformed")]);
            tracing::error!(error = %e, key = %self.key, "Refusing to persist push configs");
        })?;

        match self.persistence.write_raw(&self.key, encoded) {
            Ok(()) => {
                self.metrics.writes.add(1, &[]);
                Ok(())
            }
            Err(e) => {
                self.metrics.write_errors.add(1, &[KeyValue::new("reason", "io")]);
                tracing::error!(error = %e, key = %self.key, "Failed to write push configs");
                Err(AppError::StoreWriteFailed(format!("{e:#}")))
            }
        }
    }

    fn read(&self) -> Document {
        let raw = match self.persistence.read_raw(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Document::new(),
            Err(e) => {
                self.metrics.discarded_reads.add(1, &[KeyValue::new("reason", "unreadable")]);
                tracing::warn!(error = %e, key = %self.key, "Failed to read push configs, starting empty");
                return Document::new();
            }
        };

        extended_json::decode(&raw).unwrap_or_else(|e| {
            self.metrics.discarded_reads.add(1, &[KeyValue::new("reason", "malformed")]);
            tracing::warn!(error = %e, key = %self.key, "Discarding malformed push configs");
            Document::new()
        })
    }
}
