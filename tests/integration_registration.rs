mod common;

use common::{RecordingTransport, flaky_store};
use push_registrar::adapters::push::ApnsPushClient;
use push_registrar::core::{Outcome, PushClient, TaskState};
use push_registrar::domain::{Action, DeviceInfo, Document};
use push_registrar::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

const SERVICE: &str = "push-svc";

fn stored_entry(token: &str) -> Document {
    Document::new().with("serviceName", SERVICE).with("registrationToken", token)
}

#[tokio::test]
async fn test_register_persists_provider_info() {
    common::setup_tracing();
    let (_, store) = flaky_store();
    let transport = Arc::new(RecordingTransport::default());
    let client = ApnsPushClient::new(SERVICE, transport.clone(), Arc::clone(&store), Handle::current());

    let Outcome::Succeeded(response) = client.register_token("tok123").outcome().await else {
        panic!("registration should succeed");
    };

    assert_eq!(response.get_str("status"), Some("ok"));
    assert_eq!(transport.actions(), vec![Action::RegisterPush]);
    let (_, request) = transport.requests.lock()[0].clone();
    assert_eq!(request.get_str("service"), Some(SERVICE));
    assert_eq!(request.get_document("data").and_then(|d| d.get_str("registrationToken")), Some("tok123"));
    assert_eq!(store.provider_info(SERVICE), Some(stored_entry("tok123")));
}

#[tokio::test]
async fn test_register_twice_overwrites_entry() {
    common::setup_tracing();
    let (_, store) = flaky_store();
    let client =
        ApnsPushClient::new(SERVICE, Arc::new(RecordingTransport::default()), Arc::clone(&store), Handle::current());

    assert!(matches!(client.register_token("first").outcome().await, Outcome::Succeeded(_)));
    assert!(matches!(client.register_token("second").outcome().await, Outcome::Succeeded(_)));

    let configs = store.load();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs.get_document(SERVICE), Some(&stored_entry("second")));
}

#[tokio::test]
async fn test_transport_failure_leaves_store_untouched() {
    common::setup_tracing();
    let (_, store) = flaky_store();
    let client =
        ApnsPushClient::new(SERVICE, Arc::new(RecordingTransport::failing()), Arc::clone(&store), Handle::current());

    let outcome = client.register_token("tok123").outcome().await;

    assert!(matches!(outcome, Outcome::Failed(AppError::TransportFailure(_))));
    assert!(store.load().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_yields_partial_registration() {
    common::setup_tracing();
    let (persistence, store) = flaky_store();
    let transport = Arc::new(RecordingTransport::default());
    let client = ApnsPushClient::new(SERVICE, transport.clone(), Arc::clone(&store), Handle::current());

    assert!(matches!(client.register_token("old").outcome().await, Outcome::Succeeded(_)));
    persistence.set_fail_writes(true);

    let Outcome::Failed(err) = client.register_token("tok123").outcome().await else {
        panic!("registration should fail locally");
    };

    assert!(matches!(
        &err,
        AppError::PartialRegistration { source, .. } if matches!(**source, AppError::StoreWriteFailed(_))
    ));
    assert_eq!(err.partial_response().and_then(|r| r.get_str("action")), Some("registerPush"));
    assert_eq!(transport.actions(), vec![Action::RegisterPush, Action::RegisterPush]);
    assert_eq!(store.provider_info(SERVICE), Some(stored_entry("old")));
}

#[tokio::test]
async fn test_deregister_removes_provider_info() {
    common::setup_tracing();
    let (_, store) = flaky_store();
    let transport = Arc::new(RecordingTransport::default());
    let client = ApnsPushClient::new(SERVICE, transport.clone(), Arc::clone(&store), Handle::current());

    assert!(matches!(client.register_token("tok123").outcome().await, Outcome::Succeeded(_)));
    assert!(matches!(client.deregister().outcome().await, Outcome::Succeeded(_)));

    assert!(store.load().is_empty());
    let (action, request) = transport.requests.lock()[1].clone();
    assert_eq!(action, Action::DeregisterPush);
    assert_eq!(request, Document::new().with("service", SERVICE));
}

#[tokio::test]
async fn test_deregister_succeeds_when_local_removal_fails() {
    common::setup_tracing();
    let (persistence, store) = flaky_store();
    let client =
        ApnsPushClient::new(SERVICE, Arc::new(RecordingTransport::default()), Arc::clone(&store), Handle::current());

    assert!(matches!(client.register_token("tok123").outcome().await, Outcome::Succeeded(_)));
    persistence.set_fail_writes(true);

    let task = client.deregister();
    assert!(matches!(task.outcome().await, Outcome::Succeeded(_)));
    assert_eq!(task.state(), TaskState::Succeeded);
    assert_eq!(store.provider_info(SERVICE), Some(stored_entry("tok123")));
}

#[tokio::test]
async fn test_deregister_failure_keeps_entry() {
    common::setup_tracing();
    let (_, store) = flaky_store();
    let ok = ApnsPushClient::new(SERVICE, Arc::new(RecordingTransport::default()), Arc::clone(&store), Handle::current());
    assert!(matches!(ok.register_token("tok123").outcome().await, Outcome::Succeeded(_)));

    let failing =
        ApnsPushClient::new(SERVICE, Arc::new(RecordingTransport::failing()), Arc::clone(&store), Handle::current());
    assert!(matches!(failing.deregister().outcome().await, Outcome::Failed(AppError::TransportFailure(_))));
    assert!(store.provider_info(SERVICE).is_some());
}

#[tokio::test]
async fn test_envelope_includes_device_info() {
    common::setup_tracing();
    let (_, store) = flaky_store();
    let transport = Arc::new(RecordingTransport::default());
    let device = DeviceInfo::new("app-1").with_app_version("2.0.0");
    let device_id = device.device_id.clone();
    let client =
        ApnsPushClient::new(SERVICE, transport.clone(), store, Handle::current()).with_device(device);

    assert!(matches!(client.deregister().outcome().await, Outcome::Succeeded(_)));

    let (_, request) = transport.requests.lock()[0].clone();
    assert_eq!(request.get_str("deviceId"), Some(device_id.as_str()));
    assert_eq!(request.get_str("appId"), Some("app-1"));
    assert_eq!(request.get_str("appVersion"), Some("2.0.0"));
}

#[tokio::test]
async fn test_cancel_in_flight_registration() {
    common::setup_tracing();
    let (_, store) = flaky_store();
    let transport = Arc::new(RecordingTransport::delayed(Duration::from_secs(30)));
    let client = ApnsPushClient::new(SERVICE, transport, Arc::clone(&store), Handle::current());

    let task = client.register_token("tok123");
    tokio::task::yield_now().await;
    assert!(task.cancel());

    assert!(matches!(task.outcome().await, Outcome::Cancelled));
    assert!(store.load().is_empty());
}

#[test]
fn test_blocking_wait_from_caller_thread() {
    common::setup_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap();
    let (_, store) = flaky_store();
    let client = ApnsPushClient::new(
        SERVICE,
        Arc::new(RecordingTransport::delayed(Duration::from_millis(20))),
        Arc::clone(&store),
        runtime.handle().clone(),
    );

    let response = client.register_token("tok123").wait().unwrap();

    assert_eq!(response.get_str("action"), Some("registerPush"));
    assert_eq!(store.provider_info(SERVICE), Some(stored_entry("tok123")));
}

#[test]
fn test_callbacks_fire_once_from_runtime_thread() {
    common::setup_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap();
    let (_, store) = flaky_store();
    let client =
        ApnsPushClient::new(SERVICE, Arc::new(RecordingTransport::default()), store, runtime.handle().clone());

    let (tx, rx) = std::sync::mpsc::channel();
    let task = client.register_token("tok123");
    task.on_complete(move |outcome| {
        tx.send(matches!(outcome, Outcome::Succeeded(_))).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    assert!(task.wait_timeout(Duration::from_secs(5)).is_some());
    assert!(rx.try_recv().is_err());
}
