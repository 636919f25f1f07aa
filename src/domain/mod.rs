pub mod document;
pub mod extended_json;
pub mod provider;

pub use document::{Document, Value};
pub use provider::{Action, DeviceInfo, PushProviderInfo};
