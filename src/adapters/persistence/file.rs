use super::Persistence;
use anyhow::Context;
use parking_lot::Mutex;
use serde_json::{Map, Value as Json};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Stores every key of a settings suite in one JSON file, `<dir>/<suite>.json`.
///
/// Writes go to a sibling temp file that is renamed over the suite file, so a
/// failed write leaves the previous contents untouched.
#[derive(Debug)]
pub struct FilePersistence {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePersistence {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, suite_name: &str) -> Self {
        Self { path: dir.as_ref().join(format!("{suite_name}.json")), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> anyhow::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    fn parse(&self, contents: &[u8]) -> anyhow::Result<Map<String, Json>> {
        match serde_json::from_slice(contents).with_context(|| format!("failed to parse {}", self.path.display()))? {
            Json::Object(map) => Ok(map),
            _ => anyhow::bail!("{} does not hold a JSON object", self.path.display()),
        }
    }

    fn store(&self, map: &Map<String, Json>) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = dir.join(tmp_name);

        let result = (|| {
            let mut file = fs::File::create(&tmp_path)?;
            serde_json::to_writer(&mut file, map)?;
            file.flush()?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok::<(), anyhow::Error>(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result.with_context(|| format!("failed to write {}", self.path.display()))
    }
}

impl Persistence for FilePersistence {
    fn read_raw(&self, key: &str) -> anyhow::Result<Option<Json>> {
        let _guard = self.lock.lock();
        match self.read_file()? {
            Some(contents) => Ok(self.parse(&contents)?.remove(key)),
            None => Ok(None),
        }
    }

    fn write_raw(&self, key: &str, value: Json) -> anyhow::Result<()> {
        let _guard = self.lock.lock();
        // Only a file that reads but does not parse is discarded; I/O errors keep it.
        let mut map = match self.read_file()? {
            Some(contents) => self.parse(&contents).unwrap_or_else(|e| {
                tracing::warn!(error = %e, path = %self.path.display(), "Discarding corrupt settings file");
                Map::new()
            }),
            None => Map::new(),
        };
        map.insert(key.to_owned(), value);
        self.store(&map)
    }
}
