use crate::adapters::transport::Transport;
use crate::core::config_store::ConfigStore;
use crate::core::push_client::{
    PushClient, base_deregister_push_request, base_register_push_request, deregister_push, register_push,
};
use crate::core::task::Task;
use crate::domain::document::{Document, Value};
use crate::domain::provider::{DeviceField, DeviceInfo, PushProviderInfo};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::Instrument;

/// Token-based push client for the platform's native push service.
#[derive(Debug, Clone)]
pub struct ApnsPushClient {
    service_name: String,
    transport: Arc<dyn Transport>,
    store: Arc<ConfigStore>,
    device: Option<DeviceInfo>,
    runtime: Handle,
}

impl ApnsPushClient {
    /// Creates a client whose operations run on `runtime`.
    #[must_use]
    pub fn new(
        service_name: impl Into<String>,
        transport: Arc<dyn Transport>,
        store: Arc<ConfigStore>,
        runtime: Handle,
    ) -> Self {
        Self { service_name: service_name.into(), transport, store, device: None, runtime }
    }

    #[must_use]
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = Some(device);
        self
    }

    fn provider_info(&self, token: Option<&str>) -> PushProviderInfo {
        PushProviderInfo::new(self.service_name.as_str()).with_field(DeviceField::RegistrationToken.as_str(), token)
    }

    fn register_request(&self, token: &str) -> Document {
        let mut request = base_register_push_request(&self.service_name);
        if let Some(data) = request.get_mut(DeviceField::Data.as_str()).and_then(Value::as_document_mut) {
            data.set(DeviceField::RegistrationToken.as_str(), token);
        }
        if let Some(device) = &self.device {
            device.apply(&mut request);
        }
        request
    }

    fn deregister_request(&self) -> Document {
        let mut request = base_deregister_push_request(&self.service_name);
        if let Some(device) = &self.device {
            device.apply(&mut request);
        }
        request
    }
}

impl PushClient for ApnsPushClient {
    fn service_name(&self) -> &str {
        &self.service_name
    }

    fn register_token(&self, token: &str) -> Task<Document> {
        let request = self.register_request(token);
        let info = self.provider_info(Some(token));
        let transport = Arc::clone(&self.transport);
        let store = Arc::clone(&self.store);

        Task::spawn(
            &self.runtime,
            async move { register_push(transport.as_ref(), &store, request, &info).await }
                .instrument(tracing::info_span!("apns_register", service = %self.service_name)),
        )
    }

    fn deregister(&self) -> Task<Document> {
        let request = self.deregister_request();
        let info = self.provider_info(None);
        let transport = Arc::clone(&self.transport);
        let store = Arc::clone(&self.store);

        Task::spawn(
            &self.runtime,
            async move { deregister_push(transport.as_ref(), &store, request, &info).await }
                .instrument(tracing::info_span!("apns_deregister", service = %self.service_name)),
        )
    }
}
