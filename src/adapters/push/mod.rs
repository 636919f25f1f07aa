pub mod apns;

pub use apns::ApnsPushClient;
