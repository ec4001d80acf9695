use std::collections::BTreeMap;
use std::path::PathBuf;

/// Persisted string preferences, the terminal counterpart of browser
/// local storage. Failures are logged and otherwise ignored.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// Flat JSON object on disk, rewritten on every `set`.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        if !self.path.exists() {
            return BTreeMap::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable preferences {:?}: {}", self.path, e);
                BTreeMap::new()
            }),
            Err(e) => {
                tracing::warn!("Failed to read preferences {:?}: {}", self.path, e);
                BTreeMap::new()
            }
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_all().remove(key)
    }

    fn set(&mut self, key: &str, value: &str) {
        let mut all = self.read_all();
        all.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
        let result = serde_json::to_string_pretty(&all)
            .map_err(std::io::Error::from)
            .and_then(|contents| std::fs::write(&self.path, contents));
        if let Err(e) = result {
            tracing::warn!("Failed to persist preference {}: {}", key, e);
        }
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    pub values: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}
