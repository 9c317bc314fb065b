//! Layer 1 - the map aggregate: Locations joined by Connections, indexed for O(1) lookup by id
//! and by grid position.
//!
//! Represented as indexed arenas (two `Vec`s, slots tombstoned on delete so existing indices stay
//! valid) rather than as a `petgraph::Graph`, because the edge set here needs in-place mutation of
//! `is_train` and reassignable endpoints, which isn't a good fit for petgraph's stable-index API.

pub mod connection;
pub mod location;
pub mod position;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use connection::{Connection, ConnectionIndex};
pub use location::{Location, LocationIndex};
pub use position::Position;

use crate::error::{Result, RouteError};

/// The map aggregate. Loaded at startup from a [`crate::storage::Storage`] collaborator, mutated
/// only via the methods here so the three indices (by-id, by-pos, arena) never drift apart.
#[derive(Debug, Default)]
pub struct Map {
    locations: Vec<Option<Location>>,
    connections: Vec<Option<Connection>>,
    by_id: HashMap<String, LocationIndex>,
    by_pos: HashMap<Position, LocationIndex>,
}

impl Map {
    pub fn new() -> Self {
        Map::default()
    }

    pub fn locations(&self) -> impl Iterator<Item = (LocationIndex, &Location)> {
        self.locations
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|loc| (LocationIndex(i), loc)))
    }

    pub fn connections(&self) -> impl Iterator<Item = (ConnectionIndex, &Connection)> {
        self.connections
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (ConnectionIndex(i), c)))
    }

    pub fn location(&self, idx: LocationIndex) -> Option<&Location> {
        self.locations.get(idx.0).and_then(|s| s.as_ref())
    }

    pub fn connection(&self, idx: ConnectionIndex) -> Option<&Connection> {
        self.connections.get(idx.0).and_then(|s| s.as_ref())
    }

    pub fn location_at(&self, pos: Position) -> Option<(LocationIndex, &Location)> {
        let idx = *self.by_pos.get(&pos)?;
        self.location(idx).map(|loc| (idx, loc))
    }

    pub fn location_by_id(&self, id: &str) -> Option<(LocationIndex, &Location)> {
        let idx = *self.by_id.get(id)?;
        self.location(idx).map(|loc| (idx, loc))
    }

    /// Inserts a new Location. Fails with `DuplicateKey` if `id` or `pos` collides with a live
    /// entry.
    pub fn add_location(&mut self, location: Location) -> Result<LocationIndex> {
        self.check_location_collision(&location.id, location.pos, None)?;
        let idx = LocationIndex(self.locations.len());
        self.by_id.insert(location.id.clone(), idx);
        self.by_pos.insert(location.pos, idx);
        self.locations.push(Some(location));
        Ok(idx)
    }

    /// Updates a Location's id/pos/label/description in place. If `new_id` or `new_pos` are
    /// given and differ from the current value, the old index entries are retired and new ones
    /// installed atomically from the caller's viewpoint.
    pub fn update_location(
        &mut self,
        idx: LocationIndex,
        new_id: Option<String>,
        new_pos: Option<Position>,
        new_label: Option<String>,
        new_description: Option<String>,
    ) -> Result<()> {
        let (old_id, old_pos) = {
            let loc = self.require_location(idx)?;
            (loc.id.clone(), loc.pos)
        };
        self.check_location_collision(
            new_id.as_deref().unwrap_or(&old_id),
            new_pos.unwrap_or(old_pos),
            Some(idx),
        )?;

        let loc = self.locations[idx.0].as_mut().expect("checked above");
        if let Some(id) = new_id {
            if id != old_id {
                loc.id = id;
            }
        }
        if let Some(pos) = new_pos {
            if pos != old_pos {
                loc.pos = pos;
            }
        }
        if let Some(label) = new_label {
            loc.label = label;
        }
        if let Some(description) = new_description {
            loc.description = description;
        }

        if loc.id != old_id {
            self.by_id.remove(&old_id);
            self.by_id.insert(loc.id.clone(), idx);
        }
        if loc.pos != old_pos {
            self.by_pos.remove(&old_pos);
            self.by_pos.insert(loc.pos, idx);
        }
        Ok(())
    }

    /// Removes a Location and cascades: every connection incident to it is also removed.
    pub fn delete_location(&mut self, idx: LocationIndex) -> Result<()> {
        let incident = self.require_location(idx)?.connections.clone();
        for c in incident {
            self.delete_connection(c)?;
        }
        let loc = self.locations[idx.0].take().ok_or_else(|| {
            RouteError::StorageInconsistency(format!("location {:?} already removed", idx))
        })?;
        self.by_id.remove(&loc.id);
        self.by_pos.remove(&loc.pos);
        Ok(())
    }

    /// Adds a Connection between two existing, distinct Locations and recomputes their
    /// `is_station` flags.
    pub fn add_connection(
        &mut self,
        weight: u32,
        is_train: bool,
        label: String,
        description: String,
        a: LocationIndex,
        b: LocationIndex,
    ) -> Result<ConnectionIndex> {
        if a == b {
            return Err(RouteError::StorageInconsistency(
                "a connection's two endpoints must be distinct".to_string(),
            ));
        }
        self.require_location(a)?;
        self.require_location(b)?;

        let idx = ConnectionIndex(self.connections.len());
        self.connections
            .push(Some(Connection::new(weight, is_train, label, description, a, b)));
        self.locations[a.0].as_mut().unwrap().connections.push(idx);
        self.locations[b.0].as_mut().unwrap().connections.push(idx);
        self.recompute_is_station(a);
        self.recompute_is_station(b);
        Ok(idx)
    }

    /// Updates a Connection's mutable fields in place (endpoints are immutable once created).
    pub fn update_connection(
        &mut self,
        idx: ConnectionIndex,
        weight: Option<u32>,
        is_train: Option<bool>,
        label: Option<String>,
        description: Option<String>,
    ) -> Result<()> {
        let endpoints = self.require_connection(idx)?.endpoints();
        let c = self.connections[idx.0].as_mut().expect("checked above");
        if let Some(w) = weight {
            c.weight = w;
        }
        if let Some(t) = is_train {
            c.is_train = t;
        }
        if let Some(l) = label {
            c.label = l;
        }
        if let Some(d) = description {
            c.description = d;
        }
        for endpoint in endpoints {
            self.recompute_is_station(endpoint);
        }
        Ok(())
    }

    /// Removes a Connection, detaching it from both endpoints and recomputing their
    /// `is_station` flags.
    pub fn delete_connection(&mut self, idx: ConnectionIndex) -> Result<()> {
        let endpoints = self.require_connection(idx)?.endpoints();
        self.connections[idx.0] = None;
        for endpoint in endpoints {
            if let Some(loc) = self.locations[endpoint.0].as_mut() {
                loc.connections.retain(|&c| c != idx);
            }
            self.recompute_is_station(endpoint);
        }
        Ok(())
    }

    fn recompute_is_station(&mut self, idx: LocationIndex) {
        let connections = &self.connections;
        if let Some(loc) = self.locations[idx.0].as_mut() {
            loc.recompute_is_station(|c| connections[c.0].as_ref().map_or(false, |c| c.is_train));
        }
    }

    fn require_location(&self, idx: LocationIndex) -> Result<&Location> {
        self.location(idx)
            .ok_or_else(|| RouteError::StorageInconsistency(format!("no such location {:?}", idx)))
    }

    fn require_connection(&self, idx: ConnectionIndex) -> Result<&Connection> {
        self.connection(idx)
            .ok_or_else(|| RouteError::StorageInconsistency(format!("no such connection {:?}", idx)))
    }

    fn check_location_collision(
        &self,
        id: &str,
        pos: Position,
        excluding: Option<LocationIndex>,
    ) -> Result<()> {
        if let Some(existing) = self.by_id.get(id) {
            if Some(*existing) != excluding {
                return Err(RouteError::DuplicateKey(format!("location id '{}' already in use", id)));
            }
        }
        if let Some(existing) = self.by_pos.get(&pos) {
            if Some(*existing) != excluding {
                return Err(RouteError::DuplicateKey(format!("location pos {} already in use", pos)));
            }
        }
        Ok(())
    }
}

/// The persisted map document shape (§6): `{version, locations, connections}`. Unknown top-level
/// keys are rejected; a missing `version` is treated as pre-versioned and upgraded to 1.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    pub locations: Vec<LocationDocument>,
    pub connections: Vec<ConnectionDocument>,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationDocument {
    pub id: String,
    pub label: String,
    pub x: i64,
    pub y: i64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionDocument {
    pub locations: [String; 2],
    pub weight: u32,
    pub is_train: bool,
    pub label: String,
    #[serde(default)]
    pub description: String,
}

impl Map {
    /// Builds a Map from a parsed [`MapDocument`], failing with `StorageInconsistency` if a
    /// connection references an unknown location id.
    pub fn from_document(doc: MapDocument) -> Result<Map> {
        let mut map = Map::new();
        for loc in doc.locations {
            map.add_location(Location::new(loc.id, loc.label, Position::new(loc.x, loc.y), loc.description))?;
        }
        for conn in doc.connections {
            let [a_id, b_id] = conn.locations;
            let a = map
                .location_by_id(&a_id)
                .ok_or_else(|| RouteError::StorageInconsistency(format!("no such location '{}'", a_id)))?
                .0;
            let b = map
                .location_by_id(&b_id)
                .ok_or_else(|| RouteError::StorageInconsistency(format!("no such location '{}'", b_id)))?
                .0;
            map.add_connection(conn.weight, conn.is_train, conn.label, conn.description, a, b)?;
        }
        Ok(map)
    }

    /// Serializes this Map back to its persisted document shape.
    pub fn to_document(&self) -> MapDocument {
        MapDocument {
            version: 1,
            locations: self
                .locations()
                .map(|(_, loc)| LocationDocument {
                    id: loc.id.clone(),
                    label: loc.label.clone(),
                    x: loc.pos.x,
                    y: loc.pos.y,
                    description: loc.description.clone(),
                })
                .collect(),
            connections: self
                .connections()
                .map(|(_, c)| {
                    let [a, b] = c.endpoints();
                    ConnectionDocument {
                        locations: [
                            self.location(a).expect("endpoint must exist").id.clone(),
                            self.location(b).expect("endpoint must exist").id.clone(),
                        ],
                        weight: c.weight,
                        is_train: c.is_train,
                        label: c.label.clone(),
                        description: c.description.clone(),
                    }
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> Map {
        let mut map = Map::new();
        let a = map
            .add_location(Location::new("a".into(), "A".into(), Position::new(0, 0), "".into()))
            .unwrap();
        let b = map
            .add_location(Location::new("b".into(), "B".into(), Position::new(0, 1), "".into()))
            .unwrap();
        map.add_connection(1, false, "path".into(), "".into(), a, b).unwrap();
        map
    }

    #[test]
    fn is_station_tracks_incident_train_connections() {
        let mut map = Map::new();
        let a = map
            .add_location(Location::new("a".into(), "A".into(), Position::new(0, 0), "".into()))
            .unwrap();
        let b = map
            .add_location(Location::new("b".into(), "B".into(), Position::new(1, 0), "".into()))
            .unwrap();
        assert!(!map.location(a).unwrap().is_station());
        let c = map.add_connection(0, true, "L1".into(), "".into(), a, b).unwrap();
        assert!(map.location(a).unwrap().is_station());
        assert!(map.location(b).unwrap().is_station());
        map.delete_connection(c).unwrap();
        assert!(!map.location(a).unwrap().is_station());
        assert!(!map.location(b).unwrap().is_station());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut map = sample_map();
        let err = map.add_location(Location::new("a".into(), "Dup".into(), Position::new(5, 5), "".into()));
        assert!(matches!(err, Err(RouteError::DuplicateKey(_))));
    }

    #[test]
    fn duplicate_pos_rejected() {
        let mut map = sample_map();
        let err = map.add_location(Location::new("c".into(), "C".into(), Position::new(0, 0), "".into()));
        assert!(matches!(err, Err(RouteError::DuplicateKey(_))));
    }

    #[test]
    fn update_location_pos_retires_old_index() {
        let mut map = sample_map();
        let (a, _) = map.location_by_id("a").unwrap();
        map.update_location(a, None, Some(Position::new(9, 9)), None, None).unwrap();
        assert!(map.location_at(Position::new(0, 0)).is_none());
        assert!(map.location_at(Position::new(9, 9)).is_some());
    }

    #[test]
    fn delete_location_cascades_connections() {
        let mut map = sample_map();
        let (a, _) = map.location_by_id("a").unwrap();
        assert_eq!(map.connections().count(), 1);
        map.delete_location(a).unwrap();
        assert_eq!(map.connections().count(), 0);
        let (b, loc_b) = map.location_by_id("b").unwrap();
        assert!(loc_b.connections().is_empty());
        let _ = b;
    }

    #[test]
    fn other_side_never_returns_self() {
        let map = sample_map();
        let (a, _) = map.location_by_id("a").unwrap();
        let (b, _) = map.location_by_id("b").unwrap();
        let (_, loc_a) = map.location_by_id("a").unwrap();
        let conn_idx = loc_a.connections()[0];
        let conn = map.connection(conn_idx).unwrap();
        assert_eq!(conn.other_side(a), Some(b));
        assert_ne!(conn.other_side(a), Some(a));
    }

    #[test]
    fn document_round_trip() {
        let map = sample_map();
        let doc = map.to_document();
        let json = serde_json::to_string(&doc).unwrap();
        let reparsed: MapDocument = serde_json::from_str(&json).unwrap();
        let rebuilt = Map::from_document(reparsed).unwrap();
        assert_eq!(rebuilt.locations().count(), map.locations().count());
        assert_eq!(rebuilt.connections().count(), map.connections().count());
        assert_eq!(rebuilt.to_document().locations.len(), doc.locations.len());
    }

    #[test]
    fn document_rejects_unknown_top_level_key() {
        let json = r#"{"version":1,"locations":[],"connections":[],"bogus":true}"#;
        let parsed: Result<MapDocument> = serde_json::from_str(json).map_err(RouteError::from);
        assert!(parsed.is_err());
    }

    #[test]
    fn document_missing_version_defaults_to_one() {
        let json = r#"{"locations":[],"connections":[]}"#;
        let doc: MapDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.version, 1);
    }
}
