//! Coordinate-system resolution: absolute placement of any instance by
//! walking its parent-csys chain.
//!
//! The walk is iterative with a visited set and a hop bound, so a
//! malformed or cyclic parent chain fails with [`CsysError`] instead of
//! recursing forever. Resolution is pure: it reads a store snapshot and
//! writes nothing.

use std::collections::HashSet;

use thiserror::Error;
use tracing::trace;

use crate::store::{Record, RecordStore, ORIGIN};

use super::config::SolverConfig;
use super::types::{normalize_degrees, Pose};

/// Errors raised while resolving an instance's csys chain
#[derive(Debug, Error)]
pub enum CsysError {
    /// The parent chain is missing, blank, or cyclic
    #[error("csys chain of '{instance}' is broken: {reason}")]
    Chain { instance: String, reason: String },

    /// The named output csys does not exist on the parent
    #[error("instance '{instance}' attaches to output csys '{outputcsys}' which '{parent}' does not expose")]
    UnknownOutputCsys {
        instance: String,
        parent: String,
        outputcsys: String,
    },
}

impl CsysError {
    fn chain(instance: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Chain {
            instance: instance.into(),
            reason: reason.into(),
        }
    }

    fn unknown_outputcsys(
        instance: impl Into<String>,
        parent: impl Into<String>,
        outputcsys: impl Into<String>,
    ) -> Self {
        Self::UnknownOutputCsys {
            instance: instance.into(),
            parent: parent.into(),
            outputcsys: outputcsys.into(),
        }
    }
}

/// Resolve the absolute (x, y, rotation) of any instance by composing
/// its parent-csys chain from the global root down.
///
/// Per link, the parent's named output csys is resolved first: its
/// offset is expressed in the parent's own frame, so it is rotated by
/// the accumulated angle before being added, and its rotation joins the
/// accumulated angle. The link's own translate_x/translate_y are then
/// added unrotated and rotate_csys added, with `absolute_rotation`
/// replacing the accumulated angle when present.
pub fn resolve_instance<S: RecordStore>(
    store: &S,
    name: &str,
    config: &SolverConfig,
) -> Result<Pose, CsysError> {
    let chain = collect_chain(store, name, config)?;

    let mut pose = Pose::origin();
    for record in &chain {
        let placement = record.placement();

        let outputcsys = placement.parent_csys_outputcsys.as_str();
        if outputcsys != ORIGIN {
            let parent_name = placement.parent_csys_instance.as_str();
            let anchor = lookup_outputcsys(store, record, parent_name, outputcsys)?;
            let offset = anchor.offset_point().rotated_deg(pose.rotation);
            pose.x += offset.x;
            pose.y += offset.y;
            pose.rotation += anchor.rotation;
        }

        pose.x += placement.translate_x;
        pose.y += placement.translate_y;
        pose.rotation += placement.rotate_csys;
        if let Some(absolute) = placement.absolute_rotation {
            pose.rotation = absolute;
        }
    }

    pose.rotation = normalize_degrees(pose.rotation);
    trace!(instance = name, x = pose.x, y = pose.y, rotation = pose.rotation, "resolved instance");
    Ok(pose)
}

/// Walk parent references from the target up to the root marker,
/// returning the visited records ordered root → target.
fn collect_chain<'a, S: RecordStore>(
    store: &'a S,
    name: &str,
    config: &SolverConfig,
) -> Result<Vec<&'a Record>, CsysError> {
    let mut chain: Vec<&Record> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut current = name.to_string();

    loop {
        if chain.len() >= config.max_chain_depth {
            return Err(CsysError::chain(
                name,
                format!(
                    "exceeded {} hops without reaching '{ORIGIN}' (cyclic parent references?)",
                    config.max_chain_depth
                ),
            ));
        }
        if !seen.insert(current.clone()) {
            return Err(CsysError::chain(
                name,
                format!("parent references loop back through '{current}'"),
            ));
        }
        let record = store
            .get(&current)
            .ok_or_else(|| CsysError::chain(name, format!("instance '{current}' does not exist")))?;
        chain.push(record);

        let parent = record.placement().parent_csys_instance.as_str();
        if parent.is_empty() {
            return Err(CsysError::chain(
                name,
                format!("instance '{current}' has a blank parent csys reference"),
            ));
        }
        if parent == ORIGIN {
            break;
        }
        current = parent.to_string();
    }

    chain.reverse();
    Ok(chain)
}

fn lookup_outputcsys<'a, S: RecordStore>(
    store: &'a S,
    record: &Record,
    parent_name: &str,
    outputcsys: &str,
) -> Result<&'a crate::store::OutputCsys, CsysError> {
    if parent_name == ORIGIN {
        // The root frame exposes nothing but its own origin
        return Err(CsysError::unknown_outputcsys(
            record.name(),
            parent_name,
            outputcsys,
        ));
    }
    let parent = store.get(parent_name).ok_or_else(|| {
        CsysError::chain(
            record.name(),
            format!("parent '{parent_name}' disappeared during resolution"),
        )
    })?;
    parent.csys_children().get(outputcsys).ok_or_else(|| {
        CsysError::unknown_outputcsys(record.name(), parent_name, outputcsys)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        InstanceRecord, MemoryStore, NodeRecord, OutputCsys, Record, SegmentRecord,
    };

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn solved_node(name: &str, x: f64, y: f64, orientation: f64) -> NodeRecord {
        let mut node = NodeRecord::new(name);
        node.placement.translate_x = x;
        node.placement.translate_y = y;
        node.placement.absolute_rotation = Some(orientation);
        node
    }

    #[test]
    fn test_root_instance_resolves_to_its_translate() {
        let mut instance = InstanceRecord::new("C1", "connector");
        instance.placement.translate_x = 4.0;
        instance.placement.translate_y = -2.0;
        instance.placement.rotate_csys = 15.0;
        let store = MemoryStore::with_records([Record::Instance(instance)]);

        let pose = resolve_instance(&store, "C1", &SolverConfig::default()).unwrap();
        assert!(approx_eq(pose.x, 4.0));
        assert!(approx_eq(pose.y, -2.0));
        assert!(approx_eq(pose.rotation, 15.0));
    }

    #[test]
    fn test_flagnote_on_polar_anchor() {
        // X1 solved to (3, 4) rotated 30°, exposing anchor1 at polar
        // (2, 0°). F attaches there with no local offset, so it lands
        // at X1 plus the anchor offset rotated into X1's frame.
        let mut x1 = solved_node("X1", 3.0, 4.0, 30.0);
        x1.csys_children
            .insert("anchor1".to_string(), OutputCsys::polar(2.0, 0.0, 0.0));
        let mut f = InstanceRecord::new("F", "flagnote");
        f.placement.parent_csys_instance = "X1".to_string();
        f.placement.parent_csys_outputcsys = "anchor1".to_string();
        let store = MemoryStore::with_records([Record::Node(x1), Record::Instance(f)]);

        let pose = resolve_instance(&store, "F", &SolverConfig::default()).unwrap();
        let expected_x = 3.0 + 2.0 * 30f64.to_radians().cos();
        let expected_y = 4.0 + 2.0 * 30f64.to_radians().sin();
        assert!(approx_eq(pose.x, expected_x), "x: expected {}, got {}", expected_x, pose.x);
        assert!(approx_eq(pose.y, expected_y), "y: expected {}, got {}", expected_y, pose.y);
        assert!(approx_eq(pose.rotation, 30.0));
    }

    #[test]
    fn test_cartesian_anchor_rotates_with_parent() {
        // Anchor at (0, 1) on a parent rotated 90° lands at (-1, 0)
        // relative to the parent
        let mut parent = solved_node("X1", 0.0, 0.0, 90.0);
        parent
            .csys_children
            .insert("top".to_string(), OutputCsys::cartesian(0.0, 1.0, 0.0));
        let mut child = InstanceRecord::new("F", "flagnote");
        child.placement.parent_csys_instance = "X1".to_string();
        child.placement.parent_csys_outputcsys = "top".to_string();
        let store = MemoryStore::with_records([Record::Node(parent), Record::Instance(child)]);

        let pose = resolve_instance(&store, "F", &SolverConfig::default()).unwrap();
        assert!(approx_eq(pose.x, -1.0), "x: expected -1.0, got {}", pose.x);
        assert!(approx_eq(pose.y, 0.0), "y: expected 0.0, got {}", pose.y);
    }

    #[test]
    fn test_output_csys_rotation_joins_the_chain() {
        let mut parent = solved_node("X1", 0.0, 0.0, 0.0);
        parent
            .csys_children
            .insert("spin".to_string(), OutputCsys::cartesian(1.0, 0.0, 45.0));
        let mut child = InstanceRecord::new("F", "flagnote");
        child.placement.parent_csys_instance = "X1".to_string();
        child.placement.parent_csys_outputcsys = "spin".to_string();
        let store = MemoryStore::with_records([Record::Node(parent), Record::Instance(child)]);

        let pose = resolve_instance(&store, "F", &SolverConfig::default()).unwrap();
        assert!(approx_eq(pose.rotation, 45.0));
    }

    #[test]
    fn test_local_translate_is_applied_unrotated() {
        // Parent rotated 90°; the link's own translate is added as-is,
        // not rotated into the parent frame
        let parent = solved_node("X1", 10.0, 0.0, 90.0);
        let mut child = InstanceRecord::new("F", "flagnote");
        child.placement.parent_csys_instance = "X1".to_string();
        child.placement.translate_x = 1.0;
        let store = MemoryStore::with_records([Record::Node(parent), Record::Instance(child)]);

        let pose = resolve_instance(&store, "F", &SolverConfig::default()).unwrap();
        assert!(approx_eq(pose.x, 11.0));
        assert!(approx_eq(pose.y, 0.0));
        assert!(approx_eq(pose.rotation, 90.0));
    }

    #[test]
    fn test_segment_resolves_at_its_end_a_node() {
        let n0 = solved_node("N0", 2.0, 3.0, 0.0);
        let seg = SegmentRecord::new("S1", "N0", "N1", 10.0, 45.0);
        let store = MemoryStore::with_records([Record::Node(n0), Record::Segment(seg)]);

        let pose = resolve_instance(&store, "S1", &SolverConfig::default()).unwrap();
        assert!(approx_eq(pose.x, 2.0));
        assert!(approx_eq(pose.y, 3.0));
        // Segment orientation is authoritative, not inherited from N0
        assert!(approx_eq(pose.rotation, 45.0));
    }

    #[test]
    fn test_missing_parent_fails() {
        let mut child = InstanceRecord::new("F", "flagnote");
        child.placement.parent_csys_instance = "GHOST".to_string();
        let store = MemoryStore::with_records([Record::Instance(child)]);

        let err = resolve_instance(&store, "F", &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, CsysError::Chain { .. }));
        assert!(err.to_string().contains("GHOST"));
    }

    #[test]
    fn test_blank_parent_fails() {
        let mut child = InstanceRecord::new("F", "flagnote");
        child.placement.parent_csys_instance = String::new();
        let store = MemoryStore::with_records([Record::Instance(child)]);

        let err = resolve_instance(&store, "F", &SolverConfig::default()).unwrap_err();
        assert!(err.to_string().contains("blank"));
    }

    #[test]
    fn test_cyclic_chain_fails() {
        let mut a = InstanceRecord::new("A", "connector");
        a.placement.parent_csys_instance = "B".to_string();
        let mut b = InstanceRecord::new("B", "connector");
        b.placement.parent_csys_instance = "A".to_string();
        let store = MemoryStore::with_records([Record::Instance(a), Record::Instance(b)]);

        let err = resolve_instance(&store, "A", &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, CsysError::Chain { .. }));
    }

    #[test]
    fn test_depth_bound_fails_before_walking_forever() {
        // A long but legitimate chain still trips the guard when it
        // exceeds the configured bound
        let mut records = Vec::new();
        let mut root = InstanceRecord::new("I0", "bracket");
        root.placement.parent_csys_instance = ORIGIN.to_string();
        records.push(Record::Instance(root));
        for i in 1..10 {
            let mut inst = InstanceRecord::new(format!("I{i}"), "bracket");
            inst.placement.parent_csys_instance = format!("I{}", i - 1);
            records.push(Record::Instance(inst));
        }
        let store = MemoryStore::with_records(records);
        let config = SolverConfig::default().with_max_chain_depth(5);

        let err = resolve_instance(&store, "I9", &config).unwrap_err();
        assert!(err.to_string().contains("5 hops"));
    }

    #[test]
    fn test_unknown_output_csys_fails() {
        let parent = solved_node("X1", 0.0, 0.0, 0.0);
        let mut child = InstanceRecord::new("F", "flagnote");
        child.placement.parent_csys_instance = "X1".to_string();
        child.placement.parent_csys_outputcsys = "nope".to_string();
        let store = MemoryStore::with_records([Record::Node(parent), Record::Instance(child)]);

        let err = resolve_instance(&store, "F", &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, CsysError::UnknownOutputCsys { .. }));
    }

    #[test]
    fn test_output_csys_on_root_fails() {
        let mut child = InstanceRecord::new("F", "flagnote");
        child.placement.parent_csys_outputcsys = "anchor1".to_string();
        let store = MemoryStore::with_records([Record::Instance(child)]);

        let err = resolve_instance(&store, "F", &SolverConfig::default()).unwrap_err();
        assert!(matches!(err, CsysError::UnknownOutputCsys { .. }));
    }
}
