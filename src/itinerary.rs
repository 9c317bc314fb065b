//! Layer 5 - the itinerary segmenter: turns a raw `AStarNode` chain into a typed, human-meaningful
//! sequence of Legs (walk / board / leave / change train / enter or change street).
//!
//! Adapted from the route-assembly pass of the storytelling-layer route planner this crate
//! descends from, extended to also emit `EnterStreet`/`ChangeStreet` for purely-walking
//! connections rather than coalescing them into plain Walk legs.

use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize};

use crate::astar::AStarNode;
use crate::map::{ConnectionIndex, Map, Position};

/// The kind of one itinerary Leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Walk,
    BoardTrain,
    LeaveTrain,
    ChangeTrain,
    EnterStreet,
    ChangeStreet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRef {
    pub label: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRef {
    pub label: String,
    pub description: String,
}

/// One endpoint of a Leg: the raw position, optional attached Location metadata, and — depending
/// on the Leg's kind — a train-stop count/list or the boarded connection's metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_stops: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stops: Option<Vec<LocationRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionRef>,
}

/// One contiguous travel segment of a single kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Leg {
    #[serde(rename = "type")]
    pub kind: LegKind,
    pub from: PositionInfo,
    pub to: PositionInfo,
    pub distance: i64,
}

/// The result of segmenting a search outcome: a genuine path, or confirmation there wasn't one.
#[derive(Debug, Clone)]
pub enum Itinerary {
    Legs(Vec<Leg>),
    NotReachable,
}

/// Serializes directly to the §6 wire shape: a JSON array of Legs, empty for `NotReachable` (an
/// unreachable end and a trivial already-there route are indistinguishable on the wire — both are
/// "no Legs to take"). Written by hand rather than derived so `server.rs` can call `.json(&itinerary)`
/// straight off the core's return value instead of hand-building the response shape itself.
impl Serialize for Itinerary {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Itinerary::Legs(legs) => legs.serialize(serializer),
            Itinerary::NotReachable => serializer.serialize_seq(Some(0))?.end(),
        }
    }
}

/// Describes this leg in a single human-readable sentence, for the `ctl` client mode. Adapted
/// from `original_source/src/RoutePlanner.py`'s `write_route_text`: reads only the Leg's own
/// embedded `PositionInfo` metadata (the `location` field attached during segmentation), so it
/// needs no `Map` of its own — the `ctl` client mode calls this straight off a deserialized server
/// response, without ever loading a map.
pub fn describe(leg: &Leg) -> String {
    let from_text = position_text(&leg.from);
    let to_text = position_text(&leg.to);

    match leg.kind {
        LegKind::BoardTrain => format!(
            "Board the {}",
            leg.to.connection.as_ref().map(|c| c.label.as_str()).unwrap_or("train")
        ),
        LegKind::LeaveTrain => {
            let n = leg.to.num_stops.unwrap_or(1);
            format!("Leave the train at {} ({} stop{})", to_text, n, if n == 1 { "" } else { "s" })
        }
        LegKind::ChangeTrain => {
            let n = leg.to.num_stops.unwrap_or(1);
            format!(
                "Change trains at {} ({} stop{}) for the {}",
                to_text,
                n,
                if n == 1 { "" } else { "s" },
                leg.to.connection.as_ref().map(|c| c.label.as_str()).unwrap_or("train")
            )
        }
        LegKind::Walk | LegKind::EnterStreet | LegKind::ChangeStreet => {
            format!("Walk {} blocks from {} to {}", leg.distance, from_text, to_text)
        }
    }
}

fn position_text(info: &PositionInfo) -> String {
    match &info.location {
        Some(loc) => format!("{} ({})", info.position, loc.label),
        None => info.position.to_string(),
    }
}

/// Segments a search result into an [`Itinerary`]. `chain` is the raw `AStarNode` sequence
/// returned by the search (which starts at `start` and stops one hop short of `end` — see
/// [`crate::astar::search`]'s reconstruction); `start` and `end` bound it on both sides so the
/// state machine sees the whole route, including the final hop into `end`. `start == end` yields
/// an empty-but-present itinerary (zero Legs); a genuinely unreachable end is represented upstream
/// by [`crate::astar::SearchOutcome::NotReachable`], not by this function.
pub fn segment(map: &Map, start: Position, end: Position, chain: &[AStarNode]) -> Vec<Leg> {
    let mut segmenter = Segmenter::new(map);
    segmenter.push(AStarNode { pos: start, arriving_connection: None });
    for &node in chain {
        segmenter.push(node);
    }
    segmenter.push(AStarNode { pos: end, arriving_connection: None });
    segmenter.finish()
}

struct Segmenter<'a> {
    map: &'a Map,
    legs: Vec<Leg>,
    anchor: Option<AStarNode>,
    last: Option<AStarNode>,
    on_train: bool,
    stops_buffer: Vec<AStarNode>,
}

impl<'a> Segmenter<'a> {
    fn new(map: &'a Map) -> Self {
        Segmenter { map, legs: Vec::new(), anchor: None, last: None, on_train: false, stops_buffer: Vec::new() }
    }

    fn push(&mut self, node: AStarNode) {
        self.last = Some(node);
        let Some(anchor) = self.anchor else {
            self.anchor = Some(node);
            return;
        };

        match self.connection_of(node) {
            Some(conn) if conn.is_train => {
                if !self.on_train {
                    if anchor.pos != node.pos {
                        self.emit(LegKind::Walk, anchor, node);
                    }
                    self.emit(LegKind::BoardTrain, node, node);
                    self.on_train = true;
                    self.anchor = Some(node);
                    self.stops_buffer.clear();
                } else {
                    let anchor_label = anchor.arriving_connection.and_then(|c| self.map.connection(c)).map(|c| &c.label);
                    if anchor_label != Some(&conn.label) {
                        self.emit(LegKind::ChangeTrain, anchor, node);
                        self.on_train = true;
                        self.anchor = Some(node);
                        self.stops_buffer.clear();
                    } else {
                        self.stops_buffer.push(node);
                    }
                }
            }
            Some(_non_train) => {
                let anchor_conn = anchor.arriving_connection.and_then(|c| self.map.connection(c));
                match anchor_conn {
                    Some(prev) if prev.is_train => {
                        self.emit(LegKind::LeaveTrain, anchor, node);
                        self.on_train = false;
                        self.anchor = Some(node);
                        self.stops_buffer.clear();
                    }
                    Some(_) => {
                        self.emit(LegKind::ChangeStreet, anchor, node);
                        self.anchor = Some(node);
                    }
                    None => {
                        self.emit(LegKind::EnterStreet, anchor, node);
                        self.anchor = Some(node);
                    }
                }
            }
            None => {
                if self.on_train {
                    self.emit(LegKind::LeaveTrain, anchor, node);
                    self.on_train = false;
                    self.anchor = Some(node);
                    self.stops_buffer.clear();
                }
                // otherwise: pure grid step, coalesces into the next Walk.
            }
        }
    }

    fn finish(mut self) -> Vec<Leg> {
        if let (Some(anchor), Some(last)) = (self.anchor, self.last) {
            if anchor.pos != last.pos {
                self.emit(LegKind::Walk, anchor, last);
            }
        }
        self.legs
    }

    fn connection_of(&self, node: AStarNode) -> Option<&crate::map::Connection> {
        node.arriving_connection.and_then(|c| self.map.connection(c))
    }

    fn emit(&mut self, kind: LegKind, from: AStarNode, to: AStarNode) {
        let distance = from.pos.manhattan(to.pos);
        let from_info = self.position_info(kind, from);
        let to_info = self.position_info(kind, to);
        self.legs.push(Leg { kind, from: from_info, to: to_info, distance });
    }

    fn position_info(&self, kind: LegKind, node: AStarNode) -> PositionInfo {
        let location = self.map.location_at(node.pos).map(|(_, loc)| LocationRef {
            label: loc.label.clone(),
            position: loc.pos,
        });

        let (num_stops, stops) = if matches!(kind, LegKind::LeaveTrain | LegKind::ChangeTrain) {
            let stops: Vec<LocationRef> = self
                .stops_buffer
                .iter()
                .filter_map(|s| self.map.location_at(s.pos))
                .map(|(_, loc)| LocationRef { label: loc.label.clone(), position: loc.pos })
                .collect();
            (Some(self.stops_buffer.len() + 1), Some(stops))
        } else {
            (None, None)
        };

        let connection = if matches!(kind, LegKind::BoardTrain | LegKind::ChangeTrain) {
            self.connection_of(node).map(|c| ConnectionRef { label: c.label.clone(), description: c.description.clone() })
        } else {
            None
        };

        PositionInfo { position: node.pos, location, num_stops, stops, connection }
    }
}
