#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use push_registrar::adapters::persistence::{InMemoryPersistence, Persistence};
use push_registrar::adapters::transport::Transport;
use push_registrar::core::ConfigStore;
use push_registrar::domain::{Action, Document};
use serde_json::Value as Json;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("push_registrar=debug".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Records every request and answers with a canned reply, or fails on demand.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub requests: Mutex<Vec<(Action, Document)>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail.store(true, Ordering::SeqCst);
        transport
    }

    pub fn delayed(delay: Duration) -> Self {
        let transport = Self::default();
        *transport.delay.lock() = Some(delay);
        transport
    }

    pub fn actions(&self) -> Vec<Action> {
        self.requests.lock().iter().map(|(action, _)| *action).collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn execute(&self, action: Action, request: Document) -> anyhow::Result<Document> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.requests.lock().push((action, request));
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("backend unavailable");
        }
        Ok(Document::new().with("status", "ok").with("action", action.as_str()))
    }
}

/// In-memory persistence whose writes can be switched off.
#[derive(Debug, Default)]
pub struct FlakyPersistence {
    inner: InMemoryPersistence,
    fail_writes: AtomicBool,
}

impl FlakyPersistence {
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Persistence for FlakyPersistence {
    fn read_raw(&self, key: &str) -> anyhow::Result<Option<Json>> {
        self.inner.read_raw(key)
    }

    fn write_raw(&self, key: &str, value: Json) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.inner.write_raw(key, value)
    }
}

pub fn flaky_store() -> (Arc<FlakyPersistence>, Arc<ConfigStore>) {
    let persistence = Arc::new(FlakyPersistence::default());
    let store = Arc::new(ConfigStore::with_default_key(Arc::clone(&persistence) as Arc<dyn Persistence>));
    (persistence, store)
}
