use crate::domain::document::{Document, Value};
use crate::error::{AppError, Result};
use std::fmt;

/// Field of a persisted provider info document naming its service.
pub const SERVICE_NAME_FIELD: &str = "serviceName";

/// Field names of the push registration envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceField {
    ServiceName,
    Data,
    RegistrationToken,
    DeviceId,
    AppId,
    AppVersion,
    Platform,
    PlatformVersion,
}

impl DeviceField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceName => "service",
            Self::Data => "data",
            Self::RegistrationToken => "registrationToken",
            Self::DeviceId => "deviceId",
            Self::AppId => "appId",
            Self::AppVersion => "appVersion",
            Self::Platform => "platform",
            Self::PlatformVersion => "platformVersion",
        }
    }
}

/// Backend actions understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    RegisterPush,
    DeregisterPush,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegisterPush => "registerPush",
            Self::DeregisterPush => "deregisterPush",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration metadata for one push provider.
///
/// The service name keys the provider's entry in the config store; everything
/// else is opaque to this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct PushProviderInfo {
    service_name: String,
    fields: Document,
}

impl PushProviderInfo {
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into(), fields: Document::new() }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(key, value);
        self
    }

    /// Sets a provider field. The service name field cannot be overridden this way.
    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key != SERVICE_NAME_FIELD {
            self.fields.set(key, value);
        }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new().with(SERVICE_NAME_FIELD, self.service_name.as_str());
        doc.merge(self.fields.clone());
        doc
    }

    /// Rebuilds provider info from its persisted document.
    ///
    /// # Errors
    /// Returns `AppError::MalformedDocument` if the document has no string `serviceName`.
    pub fn from_document(mut doc: Document) -> Result<Self> {
        match doc.remove(SERVICE_NAME_FIELD) {
            Some(Value::String(service_name)) => Ok(Self { service_name, fields: doc }),
            _ => Err(AppError::MalformedDocument(format!("provider info is missing a string \"{SERVICE_NAME_FIELD}\""))),
        }
    }
}

/// Device metadata merged into the top level of every envelope a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub app_id: String,
    pub app_version: Option<String>,
    pub platform: Option<String>,
    pub platform_version: Option<String>,
}

impl DeviceInfo {
    /// Describes this device with a freshly generated device id.
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            device_id: uuid::Uuid::new_v4().to_string(),
            app_id: app_id.into(),
            app_version: None,
            platform: Some(std::env::consts::OS.to_owned()),
            platform_version: None,
        }
    }

    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_platform_version(mut self, version: impl Into<String>) -> Self {
        self.platform_version = Some(version.into());
        self
    }

    /// Writes the device fields into `request`. Unset optional fields are left out.
    pub fn apply(&self, request: &mut Document) {
        request.set(DeviceField::DeviceId.as_str(), self.device_id.as_str());
        request.set(DeviceField::AppId.as_str(), self.app_id.as_str());
        request.set(DeviceField::AppVersion.as_str(), self.app_version.as_deref());
        request.set(DeviceField::Platform.as_str(), self.platform.as_deref());
        request.set(DeviceField::PlatformVersion.as_str(), self.platform_version.as_deref());
    }
}
