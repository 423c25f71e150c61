//! Pathfinders over the precomputed edge tables.
//!
//! Two routers share the same snap/reconstruct/endpoint-override contract:
//! [`DijkstraRouter`] runs uniform-cost search over the directional
//! [`crate::cost::EdgeCostTable`]; [`NaiveRouter`] runs A* with a Euclidean
//! heuristic over the collision-free [`crate::cost::ValidEdgeSet`].
//!
//! Both capture periodic exploration snapshots for visualizing the search.

use std::cmp::Ordering;

use glam::DVec3;
use serde::Serialize;

mod dijkstra;
mod naive;

pub use dijkstra::DijkstraRouter;
pub use naive::NaiveRouter;

/// Capture an exploration frame every this many pops by default.
pub const DEFAULT_CAPTURE_INTERVAL: usize = 20;

/// Snapshot of search state for visualization.
#[derive(Clone, Debug, Serialize)]
pub struct ExplorationFrame {
  pub step: usize,
  pub current_node_id: u32,
  pub current_position: DVec3,
  pub visited_ids: Vec<u32>,
  pub frontier_ids: Vec<u32>,
  /// Best-known path from the start to the current node.
  pub current_best_path: Vec<DVec3>,
  pub current_cost: f64,
}

/// Result of a routing query.
#[derive(Clone, Debug, Serialize)]
pub struct PathResult {
  pub success: bool,
  /// Waypoints from the caller's exact start to the caller's exact end.
  pub waypoints: Vec<DVec3>,
  /// Lattice node ids along the path (snapped endpoints).
  pub node_ids: Vec<u32>,
  pub total_cost: f64,
  pub nodes_explored: usize,
  pub frames: Vec<ExplorationFrame>,
}

impl PathResult {
  pub(crate) fn failure(nodes_explored: usize, frames: Vec<ExplorationFrame>) -> Self {
    Self {
      success: false,
      waypoints: Vec::new(),
      node_ids: Vec::new(),
      total_cost: f64::INFINITY,
      nodes_explored,
      frames,
    }
  }

  /// Total Euclidean length of the waypoint polyline.
  pub fn path_length(&self) -> f64 {
    self
      .waypoints
      .windows(2)
      .map(|w| (w[1] - w[0]).length())
      .sum()
  }
}

/// Total-order f64 wrapper for priority queue keys.
///
/// Costs are finite and non-negative by construction; `total_cmp` keeps the
/// ordering well-defined regardless.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct FloatOrd(pub f64);

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for FloatOrd {
  fn cmp(&self, other: &Self) -> Ordering {
    self.0.total_cmp(&other.0)
  }
}

/// Sentinel for "no predecessor" in the dense predecessor array.
pub(crate) const NO_PREDECESSOR: u32 = u32::MAX;

/// Reconstruct the node-id chain from predecessor links, root first.
pub(crate) fn reconstruct_ids(previous: &[u32], end_id: u32) -> Vec<u32> {
  let mut ids = Vec::new();
  let mut current = end_id;
  loop {
    ids.push(current);
    let prev = previous[current as usize];
    if prev == NO_PREDECESSOR {
      break;
    }
    current = prev;
  }
  ids.reverse();
  ids
}
