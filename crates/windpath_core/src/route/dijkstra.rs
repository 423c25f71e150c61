//! Uniform-cost search over precomputed wind-aware edge costs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use glam::DVec3;
use tracing::debug;

use super::{
  reconstruct_ids, ExplorationFrame, FloatOrd, PathResult, DEFAULT_CAPTURE_INTERVAL,
  NO_PREDECESSOR,
};
use crate::cost::EdgeCostTable;
use crate::grid::Grid3D;

/// Dijkstra router over the directional [`EdgeCostTable`].
pub struct DijkstraRouter<'a> {
  grid: &'a Grid3D,
  costs: &'a EdgeCostTable,
  capture_interval: usize,
}

impl<'a> DijkstraRouter<'a> {
  pub fn new(grid: &'a Grid3D, costs: &'a EdgeCostTable) -> Self {
    Self {
      grid,
      costs,
      capture_interval: DEFAULT_CAPTURE_INTERVAL,
    }
  }

  pub fn with_capture_interval(mut self, interval: usize) -> Self {
    self.capture_interval = interval.max(1);
    self
  }

  /// Find the minimum-cost path between two world positions.
  ///
  /// Both endpoints snap to the nearest valid lattice node; if either snap
  /// fails (no valid node within the search radius) the result is a failure
  /// with nothing explored. On success the first and last waypoints are the
  /// caller's exact positions, not the snapped lattice positions.
  pub fn find_path(&self, start: DVec3, end: DVec3, capture: bool) -> PathResult {
    let start_node = self.grid.node_at_position(start, true);
    let end_node = self.grid.node_at_position(end, true);
    if !start_node.is_valid || !end_node.is_valid {
      return PathResult::failure(0, Vec::new());
    }

    let mut result = self.search(start_node.id, end_node.id, capture);
    if result.success {
      // Exact endpoint override: callers get their requested positions back
      if let Some(first) = result.waypoints.first_mut() {
        *first = start;
      }
      if let Some(last) = result.waypoints.last_mut() {
        *last = end;
      }
    }
    result
  }

  fn search(&self, start_id: u32, end_id: u32, capture: bool) -> PathResult {
    let node_count = self.grid.node_count();
    let mut dist = vec![f64::INFINITY; node_count];
    let mut previous = vec![NO_PREDECESSOR; node_count];
    let mut visited = vec![false; node_count];
    let mut visited_ids: Vec<u32> = Vec::new();
    let mut frames = Vec::new();
    let mut step = 0usize;

    // Min-heap on (cost, node id); equal costs pop in id order
    let mut heap: BinaryHeap<Reverse<(FloatOrd, u32)>> = BinaryHeap::new();
    dist[start_id as usize] = 0.0;
    heap.push(Reverse((FloatOrd(0.0), start_id)));

    while let Some(Reverse((FloatOrd(current_cost), current_id))) = heap.pop() {
      if visited[current_id as usize] {
        continue;
      }
      visited[current_id as usize] = true;
      visited_ids.push(current_id);

      if capture && step % self.capture_interval == 0 {
        frames.push(self.capture_frame(
          step,
          current_id,
          current_cost,
          &visited_ids,
          &visited,
          &heap,
          &previous,
        ));
      }
      step += 1;

      if current_id == end_id {
        if capture {
          frames.push(self.capture_frame(
            step,
            current_id,
            current_cost,
            &visited_ids,
            &visited,
            &heap,
            &previous,
          ));
        }

        let node_ids = reconstruct_ids(&previous, end_id);
        let waypoints = node_ids
          .iter()
          .map(|&id| self.grid.node(id).position)
          .collect();
        debug!(
          cost = current_cost,
          explored = visited_ids.len(),
          "dijkstra reached goal"
        );
        return PathResult {
          success: true,
          waypoints,
          node_ids,
          total_cost: current_cost,
          nodes_explored: visited_ids.len(),
          frames,
        };
      }

      for (neighbor_id, edge_cost) in self.costs.edges_from(current_id) {
        if visited[neighbor_id as usize] {
          continue;
        }
        let new_cost = current_cost + edge_cost;
        if new_cost < dist[neighbor_id as usize] {
          dist[neighbor_id as usize] = new_cost;
          previous[neighbor_id as usize] = current_id;
          heap.push(Reverse((FloatOrd(new_cost), neighbor_id)));
        }
      }
    }

    debug!(explored = visited_ids.len(), "dijkstra exhausted queue");
    PathResult::failure(visited_ids.len(), frames)
  }

  #[allow(clippy::too_many_arguments)]
  fn capture_frame(
    &self,
    step: usize,
    current_id: u32,
    current_cost: f64,
    visited_ids: &[u32],
    visited: &[bool],
    heap: &BinaryHeap<Reverse<(FloatOrd, u32)>>,
    previous: &[u32],
  ) -> ExplorationFrame {
    let mut frontier_ids: Vec<u32> = heap
      .iter()
      .map(|Reverse((_, id))| *id)
      .filter(|&id| !visited[id as usize])
      .collect();
    frontier_ids.sort_unstable();
    frontier_ids.dedup();

    let current_best_path = reconstruct_ids(previous, current_id)
      .iter()
      .map(|&id| self.grid.node(id).position)
      .collect();

    ExplorationFrame {
      step,
      current_node_id: current_id,
      current_position: self.grid.node(current_id).position,
      visited_ids: visited_ids.to_vec(),
      frontier_ids,
      current_best_path,
      current_cost,
    }
  }
}
