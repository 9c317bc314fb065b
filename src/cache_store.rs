//! Persistence for the heuristic cache (§4.3, §6): a namespaced keyed store, gzip-compressed,
//! written atomically (temp file + rename) and fsynced before the handle is dropped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;

use crate::error::{Result, RouteError};
use crate::heuristic::{HeuristicCache, CACHE_NAMESPACE};
use crate::map::Position;

/// Loads a heuristic cache from a gzip-compressed, namespaced JSON document at `path`. A missing
/// file is not an error: it is treated the same as an empty cache, since an unbuilt cache is a
/// normal startup state.
pub fn load(path: &Path) -> Result<HeuristicCache> {
    if !path.exists() {
        return Ok(HeuristicCache::new());
    }

    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let mut contents = String::new();
    decoder
        .read_to_string(&mut contents)
        .map_err(|e| RouteError::CacheIoError(e.to_string()))?;

    let document: HashMap<String, HashMap<String, Value>> =
        serde_json::from_str(&contents).map_err(|e| RouteError::CacheIoError(e.to_string()))?;

    let mut cache = HeuristicCache::new();
    if let Some(namespace) = document.get(CACHE_NAMESPACE) {
        for (key, value) in namespace {
            let pos = parse_pos_key(key)
                .ok_or_else(|| RouteError::CacheIoError(format!("malformed cache key '{}'", key)))?;
            let parsed = match value {
                Value::Null => None,
                Value::Number(n) => Some(n.as_i64().ok_or_else(|| {
                    RouteError::CacheIoError(format!("non-integer cache value for key '{}'", key))
                })?),
                _ => return Err(RouteError::CacheIoError(format!("unexpected cache value for key '{}'", key))),
            };
            cache.set(pos, parsed);
        }
    }
    Ok(cache)
}

/// Saves the cache to `path` atomically: serialized to a temp file in the same directory, then
/// renamed into place, then fsynced.
pub fn save(path: &Path, cache: &HeuristicCache) -> Result<()> {
    let mut namespace = serde_json::Map::new();
    for (pos, value) in cache.iter() {
        let v = match value {
            Some(d) => Value::from(d),
            None => Value::Null,
        };
        namespace.insert(format_pos_key(pos), v);
    }
    let mut document = serde_json::Map::new();
    document.insert(CACHE_NAMESPACE.to_string(), Value::Object(namespace));

    let serialized = serde_json::to_vec(&Value::Object(document))?;

    let tmp_path = path.with_extension("tmp");
    {
        let tmp_file = File::create(&tmp_path)?;
        let mut encoder = GzEncoder::new(tmp_file, Compression::default());
        encoder
            .write_all(&serialized)
            .map_err(|e| RouteError::CacheIoError(e.to_string()))?;
        let file = encoder
            .finish()
            .map_err(|e| RouteError::CacheIoError(e.to_string()))?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn format_pos_key(pos: Position) -> String {
    pos.to_string()
}

fn parse_pos_key(key: &str) -> Option<Position> {
    let trimmed = key.trim().strip_prefix('(')?.strip_suffix(')')?;
    let (x, y) = trimmed.split_once(',')?;
    Some(Position::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_key_round_trips() {
        let pos = Position::new(-12, 34);
        assert_eq!(parse_pos_key(&format_pos_key(pos)), Some(pos));
    }

    #[test]
    fn save_then_load_round_trips_values() {
        let dir = std::env::temp_dir().join(format!("route-planner-cache-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("heuristic.cache.gz");

        let mut cache = HeuristicCache::new();
        cache.set(Position::new(0, 0), Some(5));
        cache.set(Position::new(1, 1), None);
        save(&path, &cache).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.get(Position::new(0, 0)), Some(Some(5)));
        assert_eq!(loaded.get(Position::new(1, 1)), Some(None));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_loads_as_empty_cache() {
        let path = std::env::temp_dir().join("route-planner-cache-test-does-not-exist.gz");
        let cache = load(&path).unwrap();
        assert!(cache.is_empty());
    }
}
