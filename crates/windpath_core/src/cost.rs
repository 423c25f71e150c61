//! Directional edge costs over the routing lattice.
//!
//! Each edge cost is a weighted sum of named components (distance, headwind,
//! turbulence), clamped to non-negative so Dijkstra stays correct even when a
//! tailwind makes the headwind term negative. Costs are direction-dependent:
//! `cost(u, v)` and `cost(v, u)` generally differ, and both directions are
//! stored.
//!
//! Precomputation is the hot path: all candidate lattice edges are gated
//! through the voxel grid's batched collision filter in chunks of ~100k, and
//! the surviving edges get their wind lookups batched through the KD-tree.
//! The resulting table is a CSR-style adjacency keyed by dense node id.

use std::time::Instant;

use glam::DVec3;
use tracing::info;

use crate::grid::Grid3D;
use crate::math::EPSILON;
use crate::voxel::VoxelGrid;
use crate::wind::WindField;

/// Default tailwind benefit scale for the headwind component.
pub const DEFAULT_TAILWIND_BENEFIT: f64 = 0.5;

/// Default turbulence threshold below which the turbulence component is zero.
pub const DEFAULT_TURBULENCE_THRESHOLD: f64 = 0.2;

/// Default exponent applied to turbulence excess.
pub const DEFAULT_TURBULENCE_EXPONENT: f64 = 2.0;

/// Edge batch size for collision gating and wind lookups.
pub const EDGE_CHUNK_SIZE: usize = 100_000;

// =============================================================================
// Cost components
// =============================================================================

/// A single named cost term. The set is closed and chosen at construction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CostComponent {
  /// Euclidean edge length.
  Distance,
  /// Headwind penalty / tailwind reward from the wind at the edge midpoint.
  Headwind { tailwind_benefit: f64 },
  /// Turbulence excess over a threshold, raised to an exponent.
  Turbulence { threshold: f64, exponent: f64 },
}

impl CostComponent {
  /// Evaluate this component for one edge.
  pub fn compute(&self, start: DVec3, end: DVec3, wind: &WindField, distance: f64) -> f64 {
    if distance < EPSILON {
      return 0.0;
    }
    match *self {
      CostComponent::Distance => distance,
      CostComponent::Headwind { tailwind_benefit } => {
        let direction = (end - start) / distance;
        let w = wind.wind_at((start + end) * 0.5);
        headwind_term(w, direction, distance, tailwind_benefit)
      }
      CostComponent::Turbulence { threshold, exponent } => {
        let t_start = wind.turbulence_at(start);
        let t_end = wind.turbulence_at(end);
        let t_mid = wind.turbulence_at((start + end) * 0.5);
        turbulence_term(t_start.max(t_end).max(t_mid), distance, threshold, exponent)
      }
    }
  }
}

#[inline]
fn headwind_term(wind: DVec3, direction: DVec3, distance: f64, tailwind_benefit: f64) -> f64 {
  let alignment = wind.dot(direction);
  if alignment < 0.0 {
    // Headwind: positive penalty scaled by how far we fight it
    -alignment * distance
  } else {
    // Tailwind: negative contribution, recovered by the final clamp
    -tailwind_benefit * alignment * distance
  }
}

#[inline]
fn turbulence_term(turbulence: f64, distance: f64, threshold: f64, exponent: f64) -> f64 {
  let excess = (turbulence - threshold).max(0.0);
  excess.powf(exponent) * distance
}

// =============================================================================
// Weight presets
// =============================================================================

/// Weights applied to the (distance, headwind, turbulence) components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightConfig {
  pub distance: f64,
  pub headwind: f64,
  pub turbulence: f64,
}

impl WeightConfig {
  pub fn speed_priority() -> Self {
    Self {
      distance: 0.3,
      headwind: 0.6,
      turbulence: 0.1,
    }
  }

  pub fn safety_priority() -> Self {
    Self {
      distance: 0.2,
      headwind: 0.2,
      turbulence: 0.6,
    }
  }

  pub fn balanced() -> Self {
    Self {
      distance: 0.34,
      headwind: 0.33,
      turbulence: 0.33,
    }
  }

  pub fn distance_only() -> Self {
    Self {
      distance: 1.0,
      headwind: 0.0,
      turbulence: 0.0,
    }
  }

  /// Look up a preset by name.
  pub fn preset(name: &str) -> Option<Self> {
    match name {
      "speed_priority" => Some(Self::speed_priority()),
      "safety_priority" => Some(Self::safety_priority()),
      "balanced" => Some(Self::balanced()),
      "distance_only" => Some(Self::distance_only()),
      _ => None,
    }
  }
}

impl Default for WeightConfig {
  fn default() -> Self {
    Self::speed_priority()
  }
}

// =============================================================================
// Edge tables (CSR adjacency keyed by dense node id)
// =============================================================================

/// Directed edge costs: `(from, to) -> cost >= 0`. Absent keys mean no edge.
pub struct EdgeCostTable {
  offsets: Vec<u32>,
  targets: Vec<u32>,
  costs: Vec<f64>,
}

impl EdgeCostTable {
  /// Build from an unsorted directed edge list.
  pub fn from_edges(node_count: usize, mut edges: Vec<(u32, u32, f64)>) -> Self {
    edges.sort_unstable_by_key(|&(from, to, _)| (from, to));

    let mut offsets = vec![0u32; node_count + 1];
    for &(from, _, _) in &edges {
      offsets[from as usize + 1] += 1;
    }
    for i in 0..node_count {
      offsets[i + 1] += offsets[i];
    }

    let targets = edges.iter().map(|&(_, to, _)| to).collect();
    let costs = edges.iter().map(|&(_, _, c)| c).collect();
    Self {
      offsets,
      targets,
      costs,
    }
  }

  /// Number of directed edges stored.
  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  #[inline]
  fn range_of(&self, from: u32) -> std::ops::Range<usize> {
    self.offsets[from as usize] as usize..self.offsets[from as usize + 1] as usize
  }

  /// Cost of the directed edge `from -> to`, if it exists.
  #[inline]
  pub fn cost(&self, from: u32, to: u32) -> Option<f64> {
    let range = self.range_of(from);
    let slice = &self.targets[range.clone()];
    slice
      .binary_search(&to)
      .ok()
      .map(|i| self.costs[range.start + i])
  }

  /// All outgoing edges of `from` as `(to, cost)` pairs.
  pub fn edges_from(&self, from: u32) -> impl Iterator<Item = (u32, f64)> + '_ {
    let range = self.range_of(from);
    self.targets[range.clone()]
      .iter()
      .zip(&self.costs[range])
      .map(|(&to, &cost)| (to, cost))
  }
}

/// Collision-free directed edge pairs for the distance-only router.
pub struct ValidEdgeSet {
  offsets: Vec<u32>,
  targets: Vec<u32>,
}

impl ValidEdgeSet {
  pub fn from_edges(node_count: usize, mut edges: Vec<(u32, u32)>) -> Self {
    edges.sort_unstable();

    let mut offsets = vec![0u32; node_count + 1];
    for &(from, _) in &edges {
      offsets[from as usize + 1] += 1;
    }
    for i in 0..node_count {
      offsets[i + 1] += offsets[i];
    }
    let targets = edges.iter().map(|&(_, to)| to).collect();
    Self { offsets, targets }
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }

  /// Is the directed edge `from -> to` collision-free?
  #[inline]
  pub fn contains(&self, from: u32, to: u32) -> bool {
    let range =
      self.offsets[from as usize] as usize..self.offsets[from as usize + 1] as usize;
    self.targets[range].binary_search(&to).is_ok()
  }
}

// =============================================================================
// Calculator
// =============================================================================

/// Weighted cost components plus the batched precomputation pass.
pub struct CostCalculator {
  components: Vec<(f64, CostComponent)>,
}

impl CostCalculator {
  /// Standard component set with the given weights and default parameters.
  pub fn new(weights: WeightConfig) -> Self {
    Self {
      components: vec![
        (weights.distance, CostComponent::Distance),
        (
          weights.headwind,
          CostComponent::Headwind {
            tailwind_benefit: DEFAULT_TAILWIND_BENEFIT,
          },
        ),
        (
          weights.turbulence,
          CostComponent::Turbulence {
            threshold: DEFAULT_TURBULENCE_THRESHOLD,
            exponent: DEFAULT_TURBULENCE_EXPONENT,
          },
        ),
      ],
    }
  }

  /// Custom component set; weights pair with their components.
  pub fn with_components(components: Vec<(f64, CostComponent)>) -> Self {
    Self { components }
  }

  /// Single-edge cost: weighted component sum, clamped to non-negative.
  pub fn edge_cost(&self, start: DVec3, end: DVec3, wind: &WindField) -> f64 {
    let distance = (end - start).length();
    let total: f64 = self
      .components
      .iter()
      .filter(|(w, _)| *w != 0.0)
      .map(|(w, c)| w * c.compute(start, end, wind, distance))
      .sum();
    total.max(0.0)
  }

  /// Precompute the full directional edge-cost table.
  ///
  /// Enumerates neighbor pairs between valid nodes, gates them through the
  /// voxel grid in `EDGE_CHUNK_SIZE` batches, then evaluates the enabled
  /// components with batched wind lookups. Memory scales with the surviving
  /// edge count.
  pub fn precompute(
    &self,
    grid: &Grid3D,
    voxel: &VoxelGrid,
    wind: &WindField,
  ) -> EdgeCostTable {
    let started = Instant::now();
    let (pairs, starts, ends) = collect_candidate_edges(grid);
    info!(candidates = pairs.len(), "collected candidate edges");

    let (pairs, starts, ends) = filter_collisions(grid, voxel, pairs, starts, ends);
    info!(survivors = pairs.len(), "collision gating done");

    let distances: Vec<f64> = starts
      .iter()
      .zip(&ends)
      .map(|(&s, &e)| (e - s).length())
      .collect();

    let mut totals = vec![0.0f64; pairs.len()];
    for &(weight, component) in &self.components {
      if weight == 0.0 {
        continue;
      }
      let values = batch_component(component, &starts, &ends, &distances, wind);
      for (total, value) in totals.iter_mut().zip(values) {
        *total += weight * value;
      }
    }

    let edges: Vec<(u32, u32, f64)> = pairs
      .iter()
      .zip(totals)
      .map(|(&(from, to), total)| (from, to, total.max(0.0)))
      .collect();

    let table = EdgeCostTable::from_edges(grid.node_count(), edges);
    info!(
      edges = table.len(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "edge cost table ready"
    );
    table
  }

  /// Precompute the collision-free edge set (no wind costs).
  pub fn precompute_valid_edges(grid: &Grid3D, voxel: &VoxelGrid) -> ValidEdgeSet {
    let started = Instant::now();
    let (pairs, starts, ends) = collect_candidate_edges(grid);
    let (pairs, _, _) = filter_collisions(grid, voxel, pairs, starts, ends);

    let set = ValidEdgeSet::from_edges(grid.node_count(), pairs);
    info!(
      edges = set.len(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "valid edge set ready"
    );
    set
  }
}

/// All directed neighbor pairs with both endpoints valid.
fn collect_candidate_edges(grid: &Grid3D) -> (Vec<(u32, u32)>, Vec<DVec3>, Vec<DVec3>) {
  let mut pairs = Vec::new();
  let mut starts = Vec::new();
  let mut ends = Vec::new();

  for node in grid.valid_nodes() {
    for neighbor in grid.neighbors(node) {
      pairs.push((node.id, neighbor.id));
      starts.push(node.position);
      ends.push(neighbor.position);
    }
  }
  (pairs, starts, ends)
}

/// Keep only collision-free edges, checked in chunks.
fn filter_collisions(
  grid: &Grid3D,
  voxel: &VoxelGrid,
  pairs: Vec<(u32, u32)>,
  starts: Vec<DVec3>,
  ends: Vec<DVec3>,
) -> (Vec<(u32, u32)>, Vec<DVec3>, Vec<DVec3>) {
  let world = grid.bounds();
  let mut keep_pairs = Vec::with_capacity(pairs.len());
  let mut keep_starts = Vec::with_capacity(pairs.len());
  let mut keep_ends = Vec::with_capacity(pairs.len());

  let mut offset = 0;
  while offset < pairs.len() {
    let end = (offset + EDGE_CHUNK_SIZE).min(pairs.len());
    let valid = voxel.edges_valid_batch(&starts[offset..end], &ends[offset..end], &world);
    for (i, ok) in valid.into_iter().enumerate() {
      if ok {
        keep_pairs.push(pairs[offset + i]);
        keep_starts.push(starts[offset + i]);
        keep_ends.push(ends[offset + i]);
      }
    }
    offset = end;
  }
  (keep_pairs, keep_starts, keep_ends)
}

/// Evaluate one component over all edges with batched wind lookups.
fn batch_component(
  component: CostComponent,
  starts: &[DVec3],
  ends: &[DVec3],
  distances: &[f64],
  wind: &WindField,
) -> Vec<f64> {
  match component {
    CostComponent::Distance => distances.to_vec(),
    CostComponent::Headwind { tailwind_benefit } => {
      let midpoints: Vec<DVec3> = starts
        .iter()
        .zip(ends)
        .map(|(&s, &e)| (s + e) * 0.5)
        .collect();
      let winds = wind.wind_batch(&midpoints);
      starts
        .iter()
        .zip(ends)
        .zip(distances)
        .zip(winds)
        .map(|(((&s, &e), &dist), w)| {
          if dist < EPSILON {
            0.0
          } else {
            headwind_term(w, (e - s) / dist, dist, tailwind_benefit)
          }
        })
        .collect()
    }
    CostComponent::Turbulence { threshold, exponent } => {
      let midpoints: Vec<DVec3> = starts
        .iter()
        .zip(ends)
        .map(|(&s, &e)| (s + e) * 0.5)
        .collect();
      let t_start = wind.turbulence_batch(starts);
      let t_end = wind.turbulence_batch(ends);
      let t_mid = wind.turbulence_batch(&midpoints);
      distances
        .iter()
        .enumerate()
        .map(|(i, &dist)| {
          let t = t_start[i].max(t_end[i]).max(t_mid[i]);
          turbulence_term(t, dist, threshold, exponent)
        })
        .collect()
    }
  }
}

#[cfg(test)]
#[path = "cost_test.rs"]
mod cost_test;
