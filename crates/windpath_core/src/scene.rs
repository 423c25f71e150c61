//! Per-session shared routing state.
//!
//! A [`Scene`] bundles everything a session reads: the obstacle mesh and its
//! voxelization, the wind field, the lattice with validity flags, and the two
//! precomputed edge tables. Construction runs the cost-table and
//! valid-edge-set passes as two parallel tasks; they share only read-only
//! inputs. After `build` returns the whole bundle is immutable and can be
//! shared across sessions behind an `Arc` without synchronization.

use std::time::Instant;

use glam::DVec3;
use tracing::info;

use crate::cost::{CostCalculator, EdgeCostTable, ValidEdgeSet, WeightConfig};
use crate::error::CoreError;
use crate::grid::Grid3D;
use crate::math::Aabb;
use crate::mesh::{Triangle, TriangleMesh};
use crate::voxel::VoxelGrid;
use crate::wind::WindField;

/// Construction parameters for a [`Scene`].
#[derive(Clone, Copy, Debug)]
pub struct SceneConfig {
  /// Routing volume (world coordinates, Y-up).
  pub bounds: Aabb,
  /// Lattice node spacing (m).
  pub grid_resolution: f64,
  /// Voxel edge length for the occupancy grid (m).
  pub voxel_size: f64,
  /// Spatial hash cell size for the triangle mesh (m).
  pub mesh_cell_size: f64,
  /// Cost component weights.
  pub weights: WeightConfig,
}

impl Default for SceneConfig {
  fn default() -> Self {
    Self {
      bounds: Aabb::new(DVec3::ZERO, DVec3::new(200.0, 80.0, 200.0)),
      grid_resolution: 10.0,
      voxel_size: VoxelGrid::DEFAULT_VOXEL_SIZE,
      mesh_cell_size: TriangleMesh::DEFAULT_CELL_SIZE,
      weights: WeightConfig::default(),
    }
  }
}

/// Immutable scene state shared by routers and simulators.
pub struct Scene {
  pub config: SceneConfig,
  pub mesh: TriangleMesh,
  pub voxel: VoxelGrid,
  pub wind: WindField,
  pub grid: Grid3D,
  pub cost_table: EdgeCostTable,
  pub valid_edges: ValidEdgeSet,
}

impl Scene {
  /// Assemble a scene from raw geometry and a wind field.
  ///
  /// Steps: build the mesh spatial hash, voxelize, derive lattice validity
  /// from voxel occupancy, then precompute the wind-aware cost table and the
  /// collision-free edge set in parallel.
  pub fn build(
    config: SceneConfig,
    triangles: Vec<Triangle>,
    wind: WindField,
  ) -> Result<Self, CoreError> {
    let started = Instant::now();

    let mesh = TriangleMesh::new(triangles, config.mesh_cell_size);
    let voxel = VoxelGrid::from_mesh(&mesh, config.voxel_size);

    let mut grid = Grid3D::new(config.bounds, config.grid_resolution);
    let occupied: Vec<u32> = grid
      .valid_nodes()
      .filter(|n| voxel.point_occupied(n.position))
      .map(|n| n.id)
      .collect();
    for id in &occupied {
      grid.set_valid(*id, false);
    }
    info!(
      nodes = grid.node_count(),
      invalid = occupied.len(),
      "derived lattice validity from voxel occupancy"
    );

    let calculator = CostCalculator::new(config.weights);
    let (cost_table, valid_edges) = rayon::join(
      || calculator.precompute(&grid, &voxel, &wind),
      || CostCalculator::precompute_valid_edges(&grid, &voxel),
    );

    info!(
      triangles = mesh.len(),
      wind_samples = wind.len(),
      cost_edges = cost_table.len(),
      valid_edges = valid_edges.len(),
      elapsed_ms = started.elapsed().as_millis() as u64,
      "scene ready"
    );

    Ok(Self {
      config,
      mesh,
      voxel,
      wind,
      grid,
      cost_table,
      valid_edges,
    })
  }

  /// Validate a start/end position for routing.
  ///
  /// The position must be inside the scene bounds and must not sit inside
  /// geometry. The voxel grid is authoritative; the mesh parity test adds a
  /// reject for points inside closed surfaces whose hollow interior the
  /// voxelization does not cover.
  pub fn validate_position(&self, position: DVec3, label: &str) -> Result<(), CoreError> {
    if !self.config.bounds.contains_point(position) {
      return Err(CoreError::InvalidInput(format!(
        "{label} position [{:.1}, {:.1}, {:.1}] is outside the scene bounds",
        position.x, position.y, position.z
      )));
    }
    if self.voxel.point_occupied(position) || self.mesh.point_inside(position) {
      return Err(CoreError::InvalidInput(format!(
        "{label} position [{:.1}, {:.1}, {:.1}] is inside an obstacle",
        position.x, position.y, position.z
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mesh::box_triangles;

  fn boxed_scene() -> Scene {
    let config = SceneConfig {
      bounds: Aabb::new(DVec3::ZERO, DVec3::splat(100.0)),
      ..SceneConfig::default()
    };
    let triangles = box_triangles(DVec3::new(40.0, 0.0, 40.0), DVec3::new(60.0, 40.0, 60.0));
    let wind = WindField::new(
      vec![DVec3::splat(50.0)],
      vec![DVec3::new(8.0, 0.0, 3.0)],
      None,
    )
    .unwrap();
    Scene::build(config, triangles, wind).unwrap()
  }

  #[test]
  fn build_invalidates_occupied_nodes() {
    let scene = boxed_scene();
    assert!(scene.grid.valid_node_count() < scene.grid.node_count());
    assert!(!scene.cost_table.is_empty());
    assert!(!scene.valid_edges.is_empty());
  }

  #[test]
  fn validate_rejects_out_of_bounds() {
    let scene = boxed_scene();
    let err = scene
      .validate_position(DVec3::new(-5.0, 50.0, 50.0), "start")
      .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
  }

  #[test]
  fn validate_rejects_inside_mesh() {
    let scene = boxed_scene();
    // Hollow interior of the box: caught by the mesh parity test
    let err = scene
      .validate_position(DVec3::new(50.0, 20.0, 50.0), "start")
      .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
    // Wall voxel: caught by the occupancy grid
    let err = scene
      .validate_position(DVec3::new(41.0, 20.0, 50.0), "end")
      .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)));
  }

  #[test]
  fn validate_accepts_open_air() {
    let scene = boxed_scene();
    scene
      .validate_position(DVec3::new(10.0, 20.0, 50.0), "start")
      .unwrap();
    scene
      .validate_position(DVec3::new(50.0, 70.0, 50.0), "end")
      .unwrap();
  }
}
