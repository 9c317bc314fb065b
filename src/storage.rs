//! External contract for the Map's persistence layer (§4.6, §6).
//!
//! Grounded on the teacher's `City::load` (`layers/city.rs`): load once at startup, mutate in
//! memory through `Map`'s own methods, save explicitly. Only one backend is shipped —
//! `JsonFileStorage`, reading/writing the `{version, locations, connections}` document at a
//! configured path — but callers depend on the `Storage` trait so a different
//! `storage_provider_type` can be swapped in without touching the planning core.

use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Result, RouteError};
use crate::map::{Map, MapDocument};

/// Read/write access to the persisted map. The planning core only ever calls `load`; the editor
/// collaborator (`ctl`) is the one that calls `save` after mutating.
pub trait Storage {
    fn load(&self) -> Result<Map>;
    fn save(&self, map: &Map) -> Result<()>;
}

/// The one shipped backend: a single JSON document on disk, matching §6's persisted-map shape.
/// Writes go through a temp file + rename so a save is atomic from a reader's viewpoint, mirroring
/// `cache_store::save`.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStorage { path: path.into() }
    }
}

impl Storage for JsonFileStorage {
    /// A missing file loads as an empty map rather than an error — a fresh deployment with no map
    /// yet authored is a normal startup state, not `StorageInconsistency`.
    fn load(&self) -> Result<Map> {
        if !self.path.exists() {
            debug!("no map document at {}, starting with an empty map", self.path.display());
            return Ok(Map::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let doc: MapDocument = serde_json::from_str(&contents).map_err(|e| {
            warn!("map document at {} failed to parse: {}", self.path.display(), e);
            RouteError::from(e)
        })?;
        Map::from_document(doc)
    }

    fn save(&self, map: &Map) -> Result<()> {
        let doc = map.to_document();
        let serialized = serde_json::to_string_pretty(&doc)?;
        let tmp_path = tmp_path_for(&self.path);
        std::fs::write(&tmp_path, serialized)?;
        std::fs::rename(&tmp_path, &self.path)?;
        debug!("saved map document to {}", self.path.display());
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Location, Position};

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("transit-planner-storage-test-{}-{}", std::process::id(), name))
    }

    #[test]
    fn missing_file_loads_as_empty_map() {
        let path = scratch_path("missing.json");
        let storage = JsonFileStorage::new(&path);
        let map = storage.load().unwrap();
        assert_eq!(map.locations().count(), 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = scratch_path("roundtrip.json");
        let mut map = Map::new();
        map.add_location(Location::new("a".into(), "A".into(), Position::new(0, 0), "".into())).unwrap();

        let storage = JsonFileStorage::new(&path);
        storage.save(&map).unwrap();
        let loaded = storage.load().unwrap();
        assert_eq!(loaded.locations().count(), 1);
        assert!(loaded.location_by_id("a").is_some());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_document_is_reported_not_panicked() {
        let path = scratch_path("malformed.json");
        std::fs::write(&path, "{not json").unwrap();
        let storage = JsonFileStorage::new(&path);
        assert!(storage.load().is_err());
        std::fs::remove_file(&path).ok();
    }
}
