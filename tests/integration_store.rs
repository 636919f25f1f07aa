mod common;

use push_registrar::adapters::persistence::{FilePersistence, Persistence};
use push_registrar::core::push_client::{
    add_info_to_configs, base_deregister_push_request, base_register_push_request, remove_info_from_configs,
};
use push_registrar::core::{ConfigStore, DEFAULT_CONFIGS_KEY};
use push_registrar::domain::document::{DateTime, ObjectId};
use push_registrar::domain::{Document, PushProviderInfo, Value, extended_json};
use push_registrar::error::AppError;
use serde_json::json;
use std::sync::Arc;

fn file_store(dir: &std::path::Path) -> (Arc<FilePersistence>, ConfigStore) {
    let persistence = Arc::new(FilePersistence::new(dir, "settings"));
    let store = ConfigStore::with_default_key(Arc::clone(&persistence) as Arc<dyn Persistence>);
    (persistence, store)
}

#[test]
fn test_configs_survive_restart_with_types_intact() {
    common::setup_tracing();
    let dir = tempfile::tempdir().unwrap();
    let info = PushProviderInfo::new("apns")
        .with_field("registrationToken", "abc")
        .with_field("badge", 3)
        .with_field("installId", ObjectId::from_bytes([1; 12]))
        .with_field("registeredAt", DateTime::from_millis(1_700_000_000_000));

    {
        let (_, store) = file_store(dir.path());
        add_info_to_configs(&store, &info).unwrap();
    }

    let (_, reopened) = file_store(dir.path());
    let stored = reopened.provider_info("apns").unwrap();
    assert_eq!(stored.get("badge"), Some(&Value::Int32(3)));
    assert_eq!(PushProviderInfo::from_document(stored).unwrap(), info);
}

#[test]
fn test_remove_from_corrupt_file_normalizes_it() {
    common::setup_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (persistence, store) = file_store(dir.path());
    std::fs::write(persistence.path(), b"garbage").unwrap();

    remove_info_from_configs(&store, &PushProviderInfo::new("apns")).unwrap();

    assert_eq!(persistence.read_raw(DEFAULT_CONFIGS_KEY).unwrap(), Some(json!({})));
}

#[test]
fn test_store_shares_suite_with_other_keys() {
    common::setup_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (persistence, store) = file_store(dir.path());
    persistence.write_raw("unrelated", json!({ "keep": true })).unwrap();

    add_info_to_configs(&store, &PushProviderInfo::new("gcm")).unwrap();
    remove_info_from_configs(&store, &PushProviderInfo::new("gcm")).unwrap();

    assert_eq!(persistence.read_raw("unrelated").unwrap(), Some(json!({ "keep": true })));
}

#[test]
fn test_persisted_composite_is_canonical_extended_json() {
    common::setup_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (persistence, store) = file_store(dir.path());

    add_info_to_configs(&store, &PushProviderInfo::new("apns").with_field("badge", 3)).unwrap();

    let raw = persistence.read_raw(DEFAULT_CONFIGS_KEY).unwrap().unwrap();
    assert_eq!(raw, json!({ "apns": { "serviceName": "apns", "badge": { "$numberInt": "3" } } }));
    assert_eq!(extended_json::decode(&raw).unwrap(), store.load());
}

#[test]
fn test_envelopes_encode_as_plain_documents() {
    assert_eq!(extended_json::encode(&base_register_push_request("svc")), json!({ "service": "svc", "data": {} }));
    assert_eq!(extended_json::encode(&base_deregister_push_request("svc")), json!({ "service": "svc" }));
    assert_eq!(base_deregister_push_request("svc"), Document::new().with("service", "svc"));
}

#[test]
fn test_dollar_keyed_field_does_not_wipe_other_providers() {
    common::setup_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (_, store) = file_store(dir.path());
    add_info_to_configs(&store, &PushProviderInfo::new("apns").with_field("registrationToken", "abc")).unwrap();

    let err = add_info_to_configs(&store, &PushProviderInfo::new("gcm").with_field("$meta", "x")).unwrap_err();
    assert!(matches!(err, AppError::MalformedDocument(_)));

    let (_, reopened) = file_store(dir.path());
    assert_eq!(reopened.load().keys().collect::<Vec<_>>(), vec!["apns"]);
}

#[test]
fn test_unreadable_suite_surfaces_store_write_failure() {
    common::setup_tracing();
    let dir = tempfile::tempdir().unwrap();
    let (persistence, store) = file_store(dir.path());
    std::fs::create_dir(persistence.path()).unwrap();

    let err = add_info_to_configs(&store, &PushProviderInfo::new("apns")).unwrap_err();

    assert!(matches!(err, AppError::StoreWriteFailed(_)));
    assert!(persistence.path().is_dir());
}
