//! Coordinate propagator: turns the validated segment tree into
//! absolute node coordinates and orientations.
//!
//! Must only run on a validated tree. On a tree every node is reached
//! exactly once from the origin, so the result is deterministic up to
//! the configured rounding regardless of traversal tie-breaks.

use std::collections::VecDeque;

use indexmap::IndexMap;
use tracing::debug;

use crate::store::{NodeRecord, Record, RecordStore};

use super::config::SolverConfig;
use super::error::TopologyError;
use super::types::{normalize_degrees, round_to, Point};

/// One incident segment seen from a node
#[derive(Debug, Clone)]
struct Incidence {
    neighbor: String,
    length: f64,
    /// Segment angle as traversed away from this node: the declared
    /// A→B angle when this node is end A, flipped 180° when it is end B
    outbound_angle: f64,
}

/// Solve absolute coordinates for every node reachable from the origin
/// and write them back to the node records in one batch.
///
/// `origin` defaults to the end-A anchor of the first declared segment.
/// The origin node is pinned at (0, 0); each hop adds the segment's
/// (length, angle) displacement. Per-node orientation is the angle of
/// the summed unit vectors of all incident segment angles, each flipped
/// when the node is that segment's B end.
pub fn propagate<S: RecordStore>(
    store: &mut S,
    origin: Option<&str>,
    config: &SolverConfig,
) -> Result<(), TopologyError> {
    let incidences = collect_incidences(store);
    if incidences.is_empty() {
        return Ok(());
    }

    let origin = match origin {
        Some(name) => {
            if !incidences.contains_key(name) {
                return Err(TopologyError::dangling(name));
            }
            name.to_string()
        }
        // By convention: end A of the first declared segment
        None => incidences.keys().next().cloned().unwrap_or_default(),
    };

    // Breadth-first displacement sum from the origin
    let mut coordinates: IndexMap<String, Point> = IndexMap::new();
    coordinates.insert(origin.clone(), Point::new(0.0, 0.0));
    let mut queue = VecDeque::from([origin]);
    while let Some(node) = queue.pop_front() {
        let at = coordinates[&node];
        for incidence in &incidences[&node] {
            if coordinates.contains_key(&incidence.neighbor) {
                continue;
            }
            let radians = incidence.outbound_angle.to_radians();
            let next = Point::new(
                round_to(at.x + incidence.length * radians.cos(), config.precision),
                round_to(at.y + incidence.length * radians.sin(), config.precision),
            );
            coordinates.insert(incidence.neighbor.clone(), next);
            queue.push_back(incidence.neighbor.clone());
        }
    }

    // Batch write-back only after the full solve succeeded; refuse to
    // overwrite a non-node record that happens to carry a node's name
    for name in coordinates.keys() {
        if let Some(record) = store.get(name) {
            if record.as_node().is_none() {
                return Err(TopologyError::collision(name.as_str(), record.item_type()));
            }
        }
    }
    for (name, point) in &coordinates {
        let mut node = match store.get(name).and_then(|r| r.as_node()) {
            Some(existing) => existing.clone(),
            None => NodeRecord::new(name.clone()),
        };
        node.placement.translate_x = point.x;
        node.placement.translate_y = point.y;
        node.placement.absolute_rotation = orientation(&incidences[name])
            .map(|angle| normalize_degrees(round_to(angle, config.precision)));
        store.upsert(Record::Node(node));
    }

    debug!(nodes = coordinates.len(), "propagated node coordinates");
    Ok(())
}

/// Average incident angle for connector orientation: the angle of the
/// resultant of all outbound unit vectors, normalized to [0, 360).
/// A node with no incident segments has no defined orientation.
fn orientation(incidences: &[Incidence]) -> Option<f64> {
    if incidences.is_empty() {
        return None;
    }
    let (sum_x, sum_y) = incidences.iter().fold((0.0_f64, 0.0_f64), |(x, y), inc| {
        let radians = inc.outbound_angle.to_radians();
        (x + radians.cos(), y + radians.sin())
    });
    Some(normalize_degrees(sum_y.atan2(sum_x).to_degrees()))
}

/// Incident segments per node, in store declaration order. The first
/// key is always the end-A node of the first declared segment, which
/// is what the default origin choice relies on.
fn collect_incidences<S: RecordStore>(store: &S) -> IndexMap<String, Vec<Incidence>> {
    let mut incidences: IndexMap<String, Vec<Incidence>> = IndexMap::new();

    for record in store.read_all() {
        if let Some(seg) = record.as_segment() {
            incidences
                .entry(seg.node_at_end_a.clone())
                .or_default()
                .push(Incidence {
                    neighbor: seg.node_at_end_b.clone(),
                    length: seg.length,
                    outbound_angle: seg.angle(),
                });
            incidences
                .entry(seg.node_at_end_b.clone())
                .or_default()
                .push(Incidence {
                    neighbor: seg.node_at_end_a.clone(),
                    length: seg.length,
                    outbound_angle: normalize_degrees(seg.angle() + 180.0),
                });
        }
    }
    incidences
}
