//! Geometry resolution core for the formboard
//!
//! This module owns everything with real invariants in the harness
//! tool: the segment/node topology (builder + validator), the
//! coordinate propagator that solves the tree into absolute node
//! coordinates, and the csys resolver that places arbitrary instances
//! on the master layout.

pub mod builder;
pub mod config;
pub mod csys;
pub mod error;
pub mod propagator;
pub mod types;
pub mod validator;

pub use builder::ensure_topology;
pub use config::{ConfigError, SolverConfig};
pub use csys::{resolve_instance, CsysError};
pub use error::TopologyError;
pub use propagator::propagate;
pub use types::{BuildContext, Point, Pose};
pub use validator::validate;
