//! Save-game persistence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, PoisonError};

use crate::tracker::TrackerStats;
use crate::world::Snapshot;

/// Key-value backend for save data.
/// Platform-specific implementations should provide this
pub trait SaveStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Delete `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be modified.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl SaveStore for MemoryStore {
    type Error = Infallible;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Persisted progress for one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveData {
    pub level_id: String,
    pub world_snapshot: Snapshot,
    pub code_index: usize,
    pub stats: TrackerStats,
    pub timestamp: i64,
}

impl SaveData {
    /// # Errors
    ///
    /// Returns an error if the JSON does not match the save format.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::world::{EntityDescriptor, Position, WorldState};
    use serde_json::json;

    #[test]
    fn memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.write("k", "v").unwrap();
        assert_eq!(other.read("k").unwrap().as_deref(), Some("v"));
        other.remove("k").unwrap();
        assert!(!store.contains("k"));
        assert_eq!(store.read("k").unwrap(), None);
    }

    #[test]
    fn save_data_uses_camel_case_fields() {
        let mut world = WorldState::new(2, 2, 1, Arc::new(ManualClock::default()));
        world
            .add_entity(EntityDescriptor::new("a", "catapult").at(Position::new(1, 0)))
            .unwrap();
        world.set_variable("x", "int", json!(3));
        let save = SaveData {
            level_id: "1".into(),
            world_snapshot: world.snapshot(),
            code_index: 2,
            stats: TrackerStats::default(),
            timestamp: 42,
        };
        let json: serde_json::Value = serde_json::from_str(&save.to_json().unwrap()).unwrap();
        assert_eq!(json["levelId"], "1");
        assert_eq!(json["codeIndex"], 2);
        assert_eq!(json["worldSnapshot"]["variables"]["x"]["value"], 3);
        assert_eq!(
            json["worldSnapshot"]["grid"]["cells"][1][0]["entityIds"],
            json!(["a"])
        );
        let back = SaveData::from_json(&save.to_json().unwrap()).unwrap();
        assert_eq!(back, save);
    }
}
