//! Topology builder: ensures every declared anchor is reachable
//! through at least one segment.
//!
//! The builder only seeds structure. Placeholder lengths and angles on
//! auto-generated segments come from the injected rng and are meant to
//! be edited by the user afterwards; nothing downstream depends on the
//! specific values.

use std::collections::HashMap;

use tracing::debug;

use crate::store::{NodeRecord, Record, RecordStore, SegmentRecord, ORIGIN};

use super::config::SolverConfig;
use super::error::TopologyError;
use super::types::BuildContext;

/// One surviving edge of the working topology, before re-materialization
#[derive(Debug, Clone)]
struct Edge {
    name: String,
    end_a: String,
    end_b: String,
    length: f64,
    angle: f64,
    /// Whether this edge already exists as a store record
    existing: bool,
}

/// Ensure the segment/node graph covers every declared anchor,
/// synthesizing a seed topology where necessary and pruning stale
/// auto-generated legs, then re-materialize the survivors as records.
///
/// Fails with [`TopologyError::InsufficientTopology`] when fewer than
/// two anchors are declared. Never removes a segment that still touches
/// a declared anchor through more than one edge.
pub fn ensure_topology<S: RecordStore>(
    store: &mut S,
    anchors: &[String],
    ctx: &mut BuildContext,
    config: &SolverConfig,
) -> Result<(), TopologyError> {
    if anchors.len() < 2 {
        return Err(TopologyError::insufficient(anchors.len()));
    }

    let mut edges: Vec<Edge> = store
        .read_all()
        .iter()
        .filter_map(|r| r.as_segment())
        .map(|seg| Edge {
            name: seg.name.clone(),
            end_a: seg.node_at_end_a.clone(),
            end_b: seg.node_at_end_b.clone(),
            length: seg.length,
            angle: seg.angle(),
            existing: true,
        })
        .collect();

    if edges.is_empty() {
        seed_topology(&mut edges, store, anchors, ctx, config);
    } else {
        attach_uncovered_anchors(&mut edges, store, anchors, ctx, config);
    }

    prune_stale_legs(&mut edges, store, anchors);
    materialize(&edges, store);
    Ok(())
}

/// Seed a topology for a store with no segments at all: a single
/// joining segment for exactly two anchors, a hub-and-spoke star for
/// more. The first segment always gets angle 0 so the seed layout has
/// a stable reference direction.
fn seed_topology<S: RecordStore>(
    edges: &mut Vec<Edge>,
    store: &S,
    anchors: &[String],
    ctx: &mut BuildContext,
    config: &SolverConfig,
) {
    if anchors.len() == 2 {
        let edge = new_edge(edges, store, &anchors[0], &anchors[1], 0.0, ctx, config);
        debug!(segment = %edge.name, "seeded joining segment");
        edges.push(edge);
        return;
    }

    // More than two anchors: one hub with a spoke to every anchor
    let hub = ctx.next_name(&config.hub_name, |candidate| {
        store.get(candidate).is_some() || anchors.iter().any(|a| a == candidate)
    });
    for (i, anchor) in anchors.iter().enumerate() {
        let angle = if i == 0 { 0.0 } else { ctx.random_angle() };
        let edge = new_edge(edges, store, &hub, anchor, angle, ctx, config);
        debug!(segment = %edge.name, hub = %hub, anchor = %anchor, "seeded spoke");
        edges.push(edge);
    }
}

/// Attach every declared anchor that no segment touches yet to an
/// arbitrary already-covered anchor with a fresh leg.
fn attach_uncovered_anchors<S: RecordStore>(
    edges: &mut Vec<Edge>,
    store: &S,
    anchors: &[String],
    ctx: &mut BuildContext,
    config: &SolverConfig,
) {
    // Deterministic attach point: end A of the first declared segment
    let attach_to = edges[0].end_a.clone();
    for anchor in anchors {
        let covered = edges
            .iter()
            .any(|e| e.end_a == *anchor || e.end_b == *anchor);
        if covered {
            continue;
        }
        let angle = ctx.random_angle();
        let edge = new_edge(edges, store, &attach_to, anchor, angle, ctx, config);
        debug!(segment = %edge.name, anchor = %anchor, "attached uncovered anchor");
        edges.push(edge);
    }
}

fn new_edge<S: RecordStore>(
    edges: &[Edge],
    store: &S,
    end_a: &str,
    end_b: &str,
    angle: f64,
    ctx: &mut BuildContext,
    config: &SolverConfig,
) -> Edge {
    let name = ctx.next_name("S", |candidate| {
        store.get(candidate).is_some() || edges.iter().any(|e| e.name == candidate)
    });
    Edge {
        name,
        end_a: end_a.to_string(),
        end_b: end_b.to_string(),
        length: ctx.random_length(config.placeholder_length),
        angle,
        existing: false,
    }
}

/// Drop segments whose endpoint is no longer a declared anchor and is
/// touched by that segment alone, deleting their store records and any
/// node record left with no incident segment.
fn prune_stale_legs<S: RecordStore>(edges: &mut Vec<Edge>, store: &mut S, anchors: &[String]) {
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in edges.iter() {
        *degree.entry(edge.end_a.as_str()).or_insert(0) += 1;
        *degree.entry(edge.end_b.as_str()).or_insert(0) += 1;
    }

    let is_declared = |name: &str| anchors.iter().any(|a| a == name);
    let stale: Vec<String> = edges
        .iter()
        .filter(|edge| {
            let a_stale = !is_declared(&edge.end_a) && degree[edge.end_a.as_str()] == 1;
            let b_stale = !is_declared(&edge.end_b) && degree[edge.end_b.as_str()] == 1;
            a_stale || b_stale
        })
        .map(|edge| edge.name.clone())
        .collect();

    for name in &stale {
        let Some(idx) = edges.iter().position(|e| e.name == *name) else {
            continue;
        };
        let edge = edges.remove(idx);
        debug!(segment = %edge.name, "pruned stale leg");
        store.delete(&edge.name);
        for endpoint in [&edge.end_a, &edge.end_b] {
            let still_used = edges
                .iter()
                .any(|e| e.end_a == *endpoint || e.end_b == *endpoint);
            if !still_used && !is_declared(endpoint) {
                store.delete(endpoint);
            }
        }
    }
}

/// Write every surviving segment and node back into the store with its
/// structural fields populated. Existing segment geometry (user-edited
/// length/angle/diameter) is left alone; only the parent-csys defaults
/// are re-asserted: a segment's parent is its end-A node, a node's
/// parent is always the global root.
fn materialize<S: RecordStore>(edges: &[Edge], store: &mut S) {
    for edge in edges {
        if edge.existing {
            if let Some(seg) = store.get(&edge.name).and_then(|r| r.as_segment()) {
                let mut seg = seg.clone();
                seg.placement.parent_csys_instance = seg.node_at_end_a.clone();
                seg.placement.parent_csys_outputcsys = ORIGIN.to_string();
                store.upsert(Record::Segment(seg));
            }
        } else {
            store.upsert(Record::Segment(SegmentRecord::new(
                &edge.name,
                &edge.end_a,
                &edge.end_b,
                edge.length,
                edge.angle,
            )));
        }

        for endpoint in [&edge.end_a, &edge.end_b] {
            match store.get(endpoint) {
                Some(record) => {
                    // A stale non-root parent on a node record would
                    // skew csys resolution of its solved coordinates
                    if let Some(node) = record.as_node() {
                        let mut node = node.clone();
                        node.placement.parent_csys_instance = ORIGIN.to_string();
                        node.placement.parent_csys_outputcsys = ORIGIN.to_string();
                        store.upsert(Record::Node(node));
                    }
                }
                None => {
                    store.upsert(Record::Node(NodeRecord::new(endpoint.clone())));
                }
            }
        }
    }
}
