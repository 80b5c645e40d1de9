//! Topology validator: the segment/node graph must be a single
//! connected, acyclic tree.
//!
//! Runs after every builder pass and before coordinate propagation; the
//! propagator assumes a validated tree and visits each node exactly
//! once.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;

use crate::store::RecordStore;

use super::error::TopologyError;

/// Undirected adjacency over the segment graph: node name to
/// (neighbor, segment) pairs, in store declaration order
type Adjacency = IndexMap<String, Vec<(String, String)>>;

/// Build the undirected adjacency structure from all segment records
fn build_adjacency<S: RecordStore>(store: &S) -> Adjacency {
    let mut adjacency = Adjacency::new();
    for record in store.read_all() {
        if let Some(seg) = record.as_segment() {
            adjacency
                .entry(seg.node_at_end_a.clone())
                .or_default()
                .push((seg.node_at_end_b.clone(), seg.name.clone()));
            adjacency
                .entry(seg.node_at_end_b.clone())
                .or_default()
                .push((seg.node_at_end_a.clone(), seg.name.clone()));
        }
    }
    adjacency
}

/// Verify the segment graph is one connected, cycle-free component and
/// that every declared anchor has at least one incident segment.
pub fn validate<S: RecordStore>(store: &S, anchors: &[String]) -> Result<(), TopologyError> {
    let adjacency = build_adjacency(store);
    check_acyclic(&adjacency)?;
    for anchor in anchors {
        if !adjacency.contains_key(anchor) {
            return Err(TopologyError::dangling(anchor));
        }
    }
    check_connected(&adjacency)?;
    Ok(())
}

/// Depth-first sweep tracking the segment each node was entered
/// through; meeting a visited node over any other segment closes a
/// loop. Tracking the entry segment (not just the parent node) also
/// catches parallel segments between the same two nodes.
fn check_acyclic(adjacency: &Adjacency) -> Result<(), TopologyError> {
    let mut visited: HashSet<&str> = HashSet::new();

    for start in adjacency.keys() {
        if visited.contains(start.as_str()) {
            continue;
        }
        let mut stack: Vec<(&str, Option<&str>)> = vec![(start, None)];
        while let Some((node, entry_segment)) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            for (neighbor, segment) in &adjacency[node] {
                if Some(segment.as_str()) == entry_segment {
                    continue;
                }
                if visited.contains(neighbor.as_str()) {
                    return Err(TopologyError::cycle(
                        segment.as_str(),
                        neighbor.as_str(),
                        node,
                    ));
                }
                stack.push((neighbor, Some(segment)));
            }
        }
    }
    Ok(())
}

/// Breadth-first sweep collecting connected components; more than one
/// is reported with the sorted member list of every cluster.
fn check_connected(adjacency: &Adjacency) -> Result<(), TopologyError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut clusters: Vec<Vec<String>> = Vec::new();

    for start in adjacency.keys() {
        if seen.contains(start.as_str()) {
            continue;
        }
        let mut cluster = Vec::new();
        let mut queue = VecDeque::from([start.as_str()]);
        seen.insert(start);
        while let Some(node) = queue.pop_front() {
            cluster.push(node.to_string());
            for (neighbor, _) in &adjacency[node] {
                if seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        cluster.sort();
        clusters.push(cluster);
    }

    if clusters.len() > 1 {
        clusters.sort();
        return Err(TopologyError::disconnected(clusters));
    }
    Ok(())
}
