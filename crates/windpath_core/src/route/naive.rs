//! Distance-only A* baseline.
//!
//! Finds the geometrically shortest collision-free path, ignoring wind.
//! Serves as the comparison route that shows what wind-aware planning buys.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use glam::DVec3;
use tracing::debug;

use super::{
  reconstruct_ids, ExplorationFrame, FloatOrd, PathResult, DEFAULT_CAPTURE_INTERVAL,
  NO_PREDECESSOR,
};
use crate::cost::ValidEdgeSet;
use crate::grid::Grid3D;

/// A* router over the collision-free [`ValidEdgeSet`].
pub struct NaiveRouter<'a> {
  grid: &'a Grid3D,
  edges: &'a ValidEdgeSet,
  capture_interval: usize,
}

impl<'a> NaiveRouter<'a> {
  pub fn new(grid: &'a Grid3D, edges: &'a ValidEdgeSet) -> Self {
    Self {
      grid,
      edges,
      capture_interval: DEFAULT_CAPTURE_INTERVAL,
    }
  }

  pub fn with_capture_interval(mut self, interval: usize) -> Self {
    self.capture_interval = interval.max(1);
    self
  }

  /// Find the shortest path between two world positions.
  ///
  /// Same snap, reconstruction and exact-endpoint rules as the Dijkstra
  /// router. The heuristic is Euclidean distance to the goal (admissible on
  /// the lattice), with ties broken by accumulated distance then node id.
  pub fn find_path(&self, start: DVec3, end: DVec3, capture: bool) -> PathResult {
    let start_node = self.grid.node_at_position(start, true);
    let end_node = self.grid.node_at_position(end, true);
    if !start_node.is_valid || !end_node.is_valid {
      return PathResult::failure(0, Vec::new());
    }

    let mut result = self.search(start_node.id, end_node.id, capture);
    if result.success {
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
    let end_position = self.grid.node(end_id).position;
    let heuristic = |id: u32| (end_position - self.grid.node(id).position).length();

    let mut g_scores = vec![f64::INFINITY; node_count];
    let mut previous = vec![NO_PREDECESSOR; node_count];
    let mut visited = vec![false; node_count];
    let mut visited_ids: Vec<u32> = Vec::new();
    let mut frames = Vec::new();
    let mut step = 0usize;

    // Min-heap on (f, g, node id)
    let mut heap: BinaryHeap<Reverse<(FloatOrd, FloatOrd, u32)>> = BinaryHeap::new();
    g_scores[start_id as usize] = 0.0;
    heap.push(Reverse((FloatOrd(heuristic(start_id)), FloatOrd(0.0), start_id)));

    while let Some(Reverse((_, FloatOrd(g_score), current_id))) = heap.pop() {
      if visited[current_id as usize] {
        continue;
      }
      visited[current_id as usize] = true;
      visited_ids.push(current_id);

      if capture && step % self.capture_interval == 0 {
        frames.push(self.capture_frame(step, current_id, g_score, &visited_ids, &visited, &heap, &previous));
      }
      step += 1;

      if current_id == end_id {
        if capture {
          frames.push(self.capture_frame(
            step,
            current_id,
            g_score,
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
          distance = g_score,
          explored = visited_ids.len(),
          "a-star reached goal"
        );
        return PathResult {
          success: true,
          waypoints,
          node_ids,
          total_cost: g_score,
          nodes_explored: visited_ids.len(),
          frames,
        };
      }

      let current_position = self.grid.node(current_id).position;
      for neighbor in self.grid.neighbors(self.grid.node(current_id)) {
        if visited[neighbor.id as usize] {
          continue;
        }
        if !self.edges.contains(current_id, neighbor.id) {
          continue;
        }

        let tentative_g = g_score + (neighbor.position - current_position).length();
        if tentative_g < g_scores[neighbor.id as usize] {
          g_scores[neighbor.id as usize] = tentative_g;
          previous[neighbor.id as usize] = current_id;
          let f = tentative_g + heuristic(neighbor.id);
          heap.push(Reverse((FloatOrd(f), FloatOrd(tentative_g), neighbor.id)));
        }
      }
    }

    debug!(explored = visited_ids.len(), "a-star exhausted queue");
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
    heap: &BinaryHeap<Reverse<(FloatOrd, FloatOrd, u32)>>,
    previous: &[u32],
  ) -> ExplorationFrame {
    let mut frontier_ids: Vec<u32> = heap
      .iter()
      .map(|Reverse((_, _, id))| *id)
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

#[cfg(test)]
#[path = "route_test.rs"]
mod route_test;
