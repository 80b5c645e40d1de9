//! Formboard - geometry resolution core for wiring-harness drawings
//!
//! This library maintains typed records for every instance in a harness
//! (connectors, cables, flagnotes, segments, nodes) and derives 2D
//! drawing geometry for them: the formboard graph of routing segments
//! is validated and solved into absolute node coordinates, and any
//! instance's placement is resolved by composing its chain of
//! parent-relative coordinate systems.
//!
//! Table I/O, SVG generation, BOM assembly and UI concerns live in
//! other tools; they talk to this core through the [`store::RecordStore`]
//! seam and [`geometry::resolve_instance`].
//!
//! # Example
//!
//! ```rust
//! use formboard::{solve, MemoryStore, RecordStore, SolveOptions};
//!
//! let mut store = MemoryStore::new();
//! solve(&mut store, &SolveOptions::new(["P1", "P2"])).unwrap();
//!
//! // Both anchors now exist as solved node records joined by a segment
//! assert!(store.get("P1").is_some());
//! assert!(store.get("P2").is_some());
//! ```

pub mod geometry;
pub mod store;

pub use geometry::{
    ensure_topology, propagate, resolve_instance, validate, BuildContext, ConfigError, CsysError,
    Point, Pose, SolverConfig, TopologyError,
};
pub use store::{
    FieldValue, Fields, InstanceRecord, MemoryStore, NodeRecord, OutputCsys, Record, RecordStore,
    SegmentRecord, StoreError, ORIGIN,
};

use thiserror::Error;
use tracing::debug;

/// Errors that can abort a solve pass
#[derive(Debug, Error)]
pub enum SolveError {
    /// The segment/node graph could not be built or is not a tree
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// A csys chain could not be resolved
    #[error("csys error: {0}")]
    Csys(#[from] CsysError),
}

/// Options for one solve pass over a record store snapshot
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Declared anchor names the topology must cover
    pub anchors: Vec<String>,
    /// Origin node pinned at (0, 0); defaults to the end-A anchor of
    /// the first declared segment
    pub origin: Option<String>,
    /// Seed for placeholder geometry on auto-generated segments
    pub seed: u64,
    /// Solver configuration
    pub config: SolverConfig,
}

impl SolveOptions {
    pub fn new<I, T>(anchors: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            anchors: anchors.into_iter().map(Into::into).collect(),
            origin: None,
            seed: 0,
            config: SolverConfig::default(),
        }
    }

    /// Pin the coordinate origin to a specific anchor
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Seed the placeholder-geometry rng
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the solver configuration
    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }
}

/// Run one full geometry pass against a record store snapshot:
/// topology build, tree validation, then coordinate propagation.
///
/// The pass is atomic with respect to derived fields: node coordinates
/// are only written back once the whole solve has succeeded. On any
/// error nothing downstream should treat the derived fields as valid.
pub fn solve<S: RecordStore>(store: &mut S, options: &SolveOptions) -> Result<(), SolveError> {
    let mut ctx = BuildContext::new(options.seed);
    ensure_topology(store, &options.anchors, &mut ctx, &options.config)?;
    validate(store, &options.anchors)?;
    propagate(store, options.origin.as_deref(), &options.config)?;
    debug!(anchors = options.anchors.len(), "solve pass complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_two_anchor_store() {
        let mut store = MemoryStore::new();
        solve(&mut store, &SolveOptions::new(["P1", "P2"])).unwrap();

        let p1 = store.get("P1").unwrap().as_node().unwrap();
        assert_eq!(p1.position(), Point::new(0.0, 0.0));
        let p2 = store.get("P2").unwrap().as_node().unwrap();
        assert!(p2.position().x > 0.0);
        assert_eq!(p2.position().y, 0.0);
    }

    #[test]
    fn test_solve_insufficient_anchors() {
        let mut store = MemoryStore::new();
        let err = solve(&mut store, &SolveOptions::new(["P1"])).unwrap_err();
        assert!(matches!(
            err,
            SolveError::Topology(TopologyError::InsufficientTopology { .. })
        ));
    }

    #[test]
    fn test_solved_nodes_are_csys_resolvable() {
        let mut store = MemoryStore::new();
        let options = SolveOptions::new(["P1", "P2"]).with_seed(3);
        solve(&mut store, &options).unwrap();

        let pose = resolve_instance(&store, "P2", &options.config).unwrap();
        let node = store.get("P2").unwrap().as_node().unwrap();
        assert_eq!(pose.x, node.position().x);
        assert_eq!(pose.y, node.position().y);
    }
}
