use super::Persistence;
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    entries: Mutex<HashMap<String, Json>>,
}

impl InMemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn read_raw(&self, key: &str) -> anyhow::Result<Option<Json>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write_raw(&self, key: &str, value: Json) -> anyhow::Result<()> {
        self.entries.lock().insert(key.to_owned(), value);
        Ok(())
    }
}
