use crate::adapters::transport::Transport;
use crate::core::config_store::ConfigStore;
use crate::core::task::Task;
use crate::domain::document::Document;
use crate::domain::provider::{Action, DeviceField, PushProviderInfo};
use crate::error::{AppError, Result};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::OnceLock;

/// Registers and deregisters this device for push notifications with one provider.
///
/// Implementations build their envelopes with [`base_register_push_request`] and
/// [`base_deregister_push_request`] and drive [`register_push`] / [`deregister_push`],
/// which keep the local config store in step with the backend.
pub trait PushClient: Send + Sync + std::fmt::Debug {
    /// The service that handles push for this client. Also keys its stored config.
    fn service_name(&self) -> &str;

    /// Registers `token` with the provider and the backend.
    ///
    /// Resolves with the backend's reply once the registration is acknowledged
    /// and recorded locally.
    fn register_token(&self, token: &str) -> Task<Document>;

    /// Deregisters this device from the provider and the backend.
    fn deregister(&self) -> Task<Document>;
}

#[derive(Clone, Debug)]
struct Metrics {
    requests: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn get() -> &'static Self {
        static METRICS: OnceLock<Metrics> = OnceLock::new();
        METRICS.get_or_init(|| {
            let meter = global::meter("push-registrar");
            Self {
                requests: meter
                    .u64_counter("push_requests_total")
                    .with_description("Total number of push registration requests sent")
                    .build(),
                errors: meter
                    .u64_counter("push_request_errors_total")
                    .with_description("Total number of push registration requests that failed")
                    .build(),
            }
        })
    }
}

/// Builds the generic registration envelope, `{service, data: {}}`.
#[must_use]
pub fn base_register_push_request(service_name: &str) -> Document {
    Document::new()
        .with(DeviceField::ServiceName.as_str(), service_name)
        .with(DeviceField::Data.as_str(), Document::new())
}

/// Builds the generic deregistration envelope, `{service}`.
#[must_use]
pub fn base_deregister_push_request(service_name: &str) -> Document {
    Document::new().with(DeviceField::ServiceName.as_str(), service_name)
}

/// Persists `info` in the config store.
///
/// # Errors
/// Returns `AppError::StoreWriteFailed` if the store cannot be written.
pub fn add_info_to_configs(store: &ConfigStore, info: &PushProviderInfo) -> Result<()> {
    store.add_provider_info(info)
}

/// Stops persisting `info` in the config store.
///
/// # Errors
/// Returns `AppError::StoreWriteFailed` if the store cannot be written.
pub fn remove_info_from_configs(store: &ConfigStore, info: &PushProviderInfo) -> Result<()> {
    store.remove_provider_info(info)
}

/// Sends a registration envelope and, once the backend accepts it, records `info`.
///
/// # Errors
/// Returns `AppError::TransportFailure` if the backend call fails, leaving the store
/// untouched, or `AppError::PartialRegistration` carrying the backend reply if the
/// registration succeeded remotely but could not be recorded.
#[tracing::instrument(skip(transport, store, request, info), fields(service = %info.service_name()), err)]
pub async fn register_push(
    transport: &dyn Transport,
    store: &ConfigStore,
    request: Document,
    info: &PushProviderInfo,
) -> Result<Document> {
    let response = execute(transport, Action::RegisterPush, request).await?;

    if let Err(e) = add_info_to_configs(store, info) {
        Metrics::get().errors.add(1, &[KeyValue::new("reason", "partial_registration")]);
        return Err(AppError::PartialRegistration { response, source: Box::new(e) });
    }

    tracing::info!("Registered for push notifications");
    Ok(response)
}

/// Sends a deregistration envelope and, once the backend accepts it, forgets `info`.
///
/// The backend is the source of truth: if the local entry cannot be removed the
/// failure is logged and the deregistration still succeeds.
///
/// # Errors
/// Returns `AppError::TransportFailure` if the backend call fails.
#[tracing::instrument(skip(transport, store, request, info), fields(service = %info.service_name()), err)]
pub async fn deregister_push(
    transport: &dyn Transport,
    store: &ConfigStore,
    request: Document,
    info: &PushProviderInfo,
) -> Result<Document> {
    let response = execute(transport, Action::DeregisterPush, request).await?;

    if let Err(e) = remove_info_from_configs(store, info) {
        tracing::error!(error = %e, "Deregistered remotely but failed to remove local push config");
    } else {
        tracing::info!("Deregistered from push notifications");
    }
    Ok(response)
}

async fn execute(transport: &dyn Transport, action: Action, request: Document) -> Result<Document> {
    let metrics = Metrics::get();
    metrics.requests.add(1, &[KeyValue::new("action", action.as_str())]);

    transport.execute(action, request).await.map_err(|e| {
        metrics.errors.add(1, &[KeyValue::new("reason", "transport")]);
        tracing::warn!(error = %e, %action, "Push request failed");
        AppError::transport(e)
    })
}
