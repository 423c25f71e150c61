//! Conservative voxelization of the obstacle mesh.
//!
//! Every voxel overlapping any triangle's AABB is marked occupied, so
//! occupancy never under-reports: a clear voxel query is trustworthy, an
//! occupied one may be a false positive. This grid is the authority for all
//! routing validity checks; the mesh parity test is only a heuristic.
//!
//! The batch segment query is the hot path of edge-cost precomputation and
//! runs data-parallel over edge chunks.

use glam::DVec3;
use rayon::prelude::*;
use tracing::info;

use crate::math::{Aabb, EPSILON};
use crate::mesh::TriangleMesh;

/// Dense boolean occupancy grid over the mesh bounds.
///
/// Linear layout is x-major: `ix * ny * nz + iy * nz + iz`.
pub struct VoxelGrid {
  voxel_size: f64,
  bounds: Aabb,
  nx: usize,
  ny: usize,
  nz: usize,
  occupied: Vec<bool>,
}

impl VoxelGrid {
  /// Default voxel edge length in meters.
  pub const DEFAULT_VOXEL_SIZE: f64 = 5.0;

  /// Samples per edge used by the batched segment query.
  pub const DEFAULT_SAMPLES_PER_EDGE: usize = 5;

  /// Voxelize a mesh: mark every voxel overlapping a triangle AABB.
  pub fn from_mesh(mesh: &TriangleMesh, voxel_size: f64) -> Self {
    let bounds = mesh.bounds();
    let size = bounds.size();
    let nx = ((size.x / voxel_size).ceil() as usize).max(1);
    let ny = ((size.y / voxel_size).ceil() as usize).max(1);
    let nz = ((size.z / voxel_size).ceil() as usize).max(1);

    let mut grid = Self {
      voxel_size,
      bounds,
      nx,
      ny,
      nz,
      occupied: vec![false; nx * ny * nz],
    };

    for tri in mesh.triangles() {
      let aabb = tri.aabb();
      let (ix0, iy0, iz0) = grid.clamped_voxel(aabb.min);
      let (ix1, iy1, iz1) = grid.clamped_voxel(aabb.max);
      for ix in ix0..=ix1 {
        for iy in iy0..=iy1 {
          for iz in iz0..=iz1 {
            grid.occupied[ix * ny * nz + iy * nz + iz] = true;
          }
        }
      }
    }

    let occupied_count = grid.occupied.iter().filter(|&&o| o).count();
    info!(
      nx, ny, nz,
      occupied = occupied_count,
      total = nx * ny * nz,
      "voxelized mesh"
    );
    grid
  }

  pub fn voxel_size(&self) -> f64 {
    self.voxel_size
  }

  pub fn bounds(&self) -> Aabb {
    self.bounds
  }

  pub fn dims(&self) -> (usize, usize, usize) {
    (self.nx, self.ny, self.nz)
  }

  pub fn occupied_count(&self) -> usize {
    self.occupied.iter().filter(|&&o| o).count()
  }

  /// Voxel indices of a position, clamped into the grid.
  #[inline]
  fn clamped_voxel(&self, pos: DVec3) -> (usize, usize, usize) {
    let rel = (pos - self.bounds.min) / self.voxel_size;
    (
      (rel.x as usize).min(self.nx - 1),
      (rel.y as usize).min(self.ny - 1),
      (rel.z as usize).min(self.nz - 1),
    )
  }

  /// O(1) occupancy lookup. Positions outside the grid are never occupied.
  #[inline]
  pub fn point_occupied(&self, point: DVec3) -> bool {
    if !self.bounds.contains_point(point) {
      return false;
    }
    let (ix, iy, iz) = self.clamped_voxel(point);
    self.occupied[ix * self.ny * self.nz + iy * self.nz + iz]
  }

  /// Does the segment pass through any occupied voxel?
  ///
  /// Marches sample points spaced at half a voxel; a zero-length segment
  /// degenerates to a point lookup.
  pub fn segment_intersects(&self, p0: DVec3, p1: DVec3) -> bool {
    if self.fast_clear(p0, p1) {
      return false;
    }

    let dir = p1 - p0;
    let len = dir.length();
    if len < EPSILON {
      return self.point_occupied(p0);
    }

    let num_steps = ((len / (self.voxel_size * 0.5)) as usize + 1).max(2);
    for i in 0..num_steps {
      let t = i as f64 / (num_steps - 1) as f64;
      if self.point_occupied(p0 + dir * t) {
        return true;
      }
    }
    false
  }

  /// Fast reject: segments entirely above the roofline or entirely outside
  /// the horizontal extent of the grid are definitively clear.
  #[inline]
  fn fast_clear(&self, p0: DVec3, p1: DVec3) -> bool {
    let pad = self.voxel_size;
    if p0.y.min(p1.y) > self.bounds.max.y + pad {
      return true;
    }
    p0.x.max(p1.x) < self.bounds.min.x - pad
      || p0.x.min(p1.x) > self.bounds.max.x + pad
      || p0.z.max(p1.z) < self.bounds.min.z - pad
      || p0.z.min(p1.z) > self.bounds.max.z + pad
  }

  /// Batched segment occlusion: `out[i]` is true when segment `i` passes
  /// through an occupied voxel.
  ///
  /// Each surviving segment is sampled at `samples_per_edge` uniform
  /// parameters in `[0, 1]`; out-of-bounds samples cannot collide.
  pub fn segments_intersect_batch(
    &self,
    starts: &[DVec3],
    ends: &[DVec3],
    samples_per_edge: usize,
  ) -> Vec<bool> {
    debug_assert_eq!(starts.len(), ends.len());
    let samples = samples_per_edge.max(2);

    starts
      .par_iter()
      .zip(ends.par_iter())
      .map(|(&p0, &p1)| {
        if self.fast_clear(p0, p1) {
          return false;
        }
        let dir = p1 - p0;
        (0..samples).any(|i| {
          let t = i as f64 / (samples - 1) as f64;
          self.point_occupied(p0 + dir * t)
        })
      })
      .collect()
  }

  /// Batched edge validity: collision-free and both endpoints inside
  /// `world_bounds` (the routing volume, which contains the mesh).
  pub fn edges_valid_batch(
    &self,
    starts: &[DVec3],
    ends: &[DVec3],
    world_bounds: &Aabb,
  ) -> Vec<bool> {
    let occluded = self.segments_intersect_batch(starts, ends, Self::DEFAULT_SAMPLES_PER_EDGE);
    starts
      .iter()
      .zip(ends.iter())
      .zip(occluded)
      .map(|((&p0, &p1), hit)| {
        !hit && world_bounds.contains_point(p0) && world_bounds.contains_point(p1)
      })
      .collect()
  }
}

#[cfg(test)]
#[path = "voxel_test.rs"]
mod voxel_test;
