//! Error types for the formboard topology passes

use thiserror::Error;

/// Errors raised while building or validating the segment/node graph.
///
/// All of these abort the current solve pass; none are retried. The
/// orchestration layer decides whether to prompt for a topology fix
/// and re-run.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Fewer than two anchors declared; no segment can be formed
    #[error("cannot build a topology from {count} declared anchor(s); at least two are required")]
    InsufficientTopology { count: usize },

    /// The segment graph contains a loop; closed routing topologies
    /// are not supported
    #[error("routing topology has a cycle: segment '{segment}' closes a loop between '{node_a}' and '{node_b}'")]
    CycleDetected {
        segment: String,
        node_a: String,
        node_b: String,
    },

    /// More than one connected component in the segment graph
    #[error("routing topology is disconnected into {} clusters: {}", clusters.len(), format_clusters(clusters))]
    Disconnected { clusters: Vec<Vec<String>> },

    /// A declared anchor has no incident segment
    #[error("declared anchor '{anchor}' has no incident segment")]
    DanglingAnchor { anchor: String },

    /// A node name in the segment graph is already taken by a record
    /// of another kind
    #[error("cannot solve node '{name}': the name is taken by a '{item_type}' record")]
    NameCollision { name: String, item_type: String },
}

impl TopologyError {
    pub fn insufficient(count: usize) -> Self {
        Self::InsufficientTopology { count }
    }

    pub fn cycle(
        segment: impl Into<String>,
        node_a: impl Into<String>,
        node_b: impl Into<String>,
    ) -> Self {
        Self::CycleDetected {
            segment: segment.into(),
            node_a: node_a.into(),
            node_b: node_b.into(),
        }
    }

    pub fn disconnected(clusters: Vec<Vec<String>>) -> Self {
        Self::Disconnected { clusters }
    }

    pub fn dangling(anchor: impl Into<String>) -> Self {
        Self::DanglingAnchor {
            anchor: anchor.into(),
        }
    }

    pub fn collision(name: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self::NameCollision {
            name: name.into(),
            item_type: item_type.into(),
        }
    }
}

fn format_clusters(clusters: &[Vec<String>]) -> String {
    clusters
        .iter()
        .map(|c| format!("[{}]", c.join(", ")))
        .collect::<Vec<_>>()
        .join(" ")
}
