//! Triangle mesh with a uniform spatial hash for segment queries.
//!
//! The hash maps integer cell coordinates to the indices of triangles whose
//! AABB overlaps that cell, so a segment test only runs Möller–Trumbore on
//! triangles near the segment. The parity-based [`TriangleMesh::point_inside`]
//! is a heuristic only: it mislabels points exactly on a face or rays grazing
//! an edge. Routing validity is always re-derived from the conservative
//! [`crate::voxel::VoxelGrid`].

use std::collections::{HashMap, HashSet};

use glam::DVec3;
use tracing::debug;

use crate::math::{Aabb, EPSILON};

/// A single triangle in world coordinates (Y-up), with its normal.
#[derive(Clone, Copy, Debug)]
pub struct Triangle {
  pub v0: DVec3,
  pub v1: DVec3,
  pub v2: DVec3,
  pub normal: DVec3,
}

impl Triangle {
  pub fn new(v0: DVec3, v1: DVec3, v2: DVec3, normal: DVec3) -> Self {
    Self { v0, v1, v2, normal }
  }

  /// Axis-aligned bounds of the three vertices.
  #[inline]
  pub fn aabb(&self) -> Aabb {
    Aabb {
      min: self.v0.min(self.v1).min(self.v2),
      max: self.v0.max(self.v1).max(self.v2),
    }
  }
}

/// Immutable triangle collection with precomputed bounds and spatial hash.
///
/// Invariant: every triangle's AABB is registered in every hash cell it
/// overlaps, so cell lookups never miss a nearby triangle.
pub struct TriangleMesh {
  triangles: Vec<Triangle>,
  bounds: Aabb,
  cell_size: f64,
  cells: HashMap<(i32, i32, i32), Vec<u32>>,
}

impl TriangleMesh {
  /// Default spatial hash cell size in meters.
  pub const DEFAULT_CELL_SIZE: f64 = 20.0;

  pub fn new(triangles: Vec<Triangle>, cell_size: f64) -> Self {
    let mut bounds = Aabb::empty();
    for tri in &triangles {
      bounds.encapsulate(tri.v0);
      bounds.encapsulate(tri.v1);
      bounds.encapsulate(tri.v2);
    }
    if !bounds.is_valid() {
      bounds = Aabb {
        min: DVec3::ZERO,
        max: DVec3::ZERO,
      };
    }

    let mut mesh = Self {
      triangles,
      bounds,
      cell_size,
      cells: HashMap::new(),
    };
    mesh.build_spatial_hash();
    debug!(
      triangles = mesh.triangles.len(),
      cells = mesh.cells.len(),
      "built mesh spatial hash"
    );
    mesh
  }

  /// Build a mesh with the default 20 m hash cells.
  pub fn with_default_cells(triangles: Vec<Triangle>) -> Self {
    Self::new(triangles, Self::DEFAULT_CELL_SIZE)
  }

  fn build_spatial_hash(&mut self) {
    for (i, tri) in self.triangles.iter().enumerate() {
      let aabb = tri.aabb();
      let min_cell = self.cell_of(aabb.min);
      let max_cell = self.cell_of(aabb.max);
      for cx in min_cell.0..=max_cell.0 {
        for cy in min_cell.1..=max_cell.1 {
          for cz in min_cell.2..=max_cell.2 {
            self.cells.entry((cx, cy, cz)).or_default().push(i as u32);
          }
        }
      }
    }
  }

  #[inline]
  fn cell_of(&self, pos: DVec3) -> (i32, i32, i32) {
    let rel = (pos - self.bounds.min) / self.cell_size;
    (
      rel.x.floor() as i32,
      rel.y.floor() as i32,
      rel.z.floor() as i32,
    )
  }

  pub fn is_empty(&self) -> bool {
    self.triangles.is_empty()
  }

  pub fn len(&self) -> usize {
    self.triangles.len()
  }

  pub fn triangles(&self) -> &[Triangle] {
    &self.triangles
  }

  pub fn bounds(&self) -> Aabb {
    self.bounds
  }

  pub fn cell_size(&self) -> f64 {
    self.cell_size
  }

  /// Does the segment `p0..p1` cross any triangle?
  ///
  /// Candidate triangles come from hash cells sampled along the segment
  /// (every `cell_size` units, at least two samples) plus their 26 neighbors.
  /// A zero-length segment degenerates to [`Self::point_inside`].
  pub fn segment_intersects(&self, p0: DVec3, p1: DVec3) -> bool {
    if self.triangles.is_empty() {
      return false;
    }

    let dir = p1 - p0;
    let len = dir.length();
    if len < EPSILON {
      return self.point_inside(p0);
    }

    let num_samples = (len / self.cell_size) as usize + 1;
    let num_samples = num_samples.max(2);

    let mut candidates: HashSet<u32> = HashSet::new();
    for i in 0..num_samples {
      let t = i as f64 / (num_samples - 1) as f64;
      let cell = self.cell_of(p0 + dir * t);
      for dx in -1..=1 {
        for dy in -1..=1 {
          for dz in -1..=1 {
            if let Some(indices) = self.cells.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz)) {
              candidates.extend(indices.iter().copied());
            }
          }
        }
      }
    }

    candidates
      .iter()
      .any(|&i| ray_triangle_intersect(p0, dir, len, &self.triangles[i as usize]))
  }

  /// Parity ray cast along +X: odd intersection count means inside.
  ///
  /// Known to be brittle on faces and grazing edges; used only as an initial
  /// validity heuristic and as a secondary reject during input validation.
  pub fn point_inside(&self, point: DVec3) -> bool {
    if self.triangles.is_empty() {
      return false;
    }

    let ray_dir = DVec3::X;
    let max_t = self.bounds.max.x - point.x + 100.0;

    // Candidate cells: march +X from the point's cell, with a one-cell
    // apron in Y and Z.
    let cell = self.cell_of(point);
    let last_cx = ((self.bounds.max.x - self.bounds.min.x) / self.cell_size) as i32 + 1;

    let mut candidates: HashSet<u32> = HashSet::new();
    for cx in cell.0..=last_cx {
      for dy in -1..=1 {
        for dz in -1..=1 {
          if let Some(indices) = self.cells.get(&(cx, cell.1 + dy, cell.2 + dz)) {
            candidates.extend(indices.iter().copied());
          }
        }
      }
    }

    let hits = candidates
      .iter()
      .filter(|&&i| ray_triangle_intersect(point, ray_dir, max_t, &self.triangles[i as usize]))
      .count();
    hits % 2 == 1
  }
}

/// Möller–Trumbore ray/triangle test, restricted to `t` in `[0, max_t]`.
fn ray_triangle_intersect(origin: DVec3, dir: DVec3, max_t: f64, tri: &Triangle) -> bool {
  let edge1 = tri.v1 - tri.v0;
  let edge2 = tri.v2 - tri.v0;

  let h = dir.cross(edge2);
  let a = edge1.dot(h);
  if a.abs() < EPSILON {
    return false; // ray parallel to triangle plane
  }

  let f = 1.0 / a;
  let s = origin - tri.v0;
  let u = f * s.dot(h);
  if !(0.0..=1.0).contains(&u) {
    return false;
  }

  let q = s.cross(edge1);
  let v = f * dir.dot(q);
  if v < 0.0 || u + v > 1.0 {
    return false;
  }

  let t = f * edge2.dot(q);
  (0.0..=max_t).contains(&t)
}

/// Triangulate an axis-aligned box into 12 triangles with outward normals.
///
/// Convenience for tests and mock scenes; a real city comes from an STL
/// loader.
pub fn box_triangles(min: DVec3, max: DVec3) -> Vec<Triangle> {
  let corners = [
    DVec3::new(min.x, min.y, min.z),
    DVec3::new(max.x, min.y, min.z),
    DVec3::new(max.x, max.y, min.z),
    DVec3::new(min.x, max.y, min.z),
    DVec3::new(min.x, min.y, max.z),
    DVec3::new(max.x, min.y, max.z),
    DVec3::new(max.x, max.y, max.z),
    DVec3::new(min.x, max.y, max.z),
  ];

  // Each face: (4 corner indices, outward normal)
  let faces: [([usize; 4], DVec3); 6] = [
    ([0, 3, 2, 1], DVec3::NEG_Z),
    ([4, 5, 6, 7], DVec3::Z),
    ([0, 1, 5, 4], DVec3::NEG_Y),
    ([3, 7, 6, 2], DVec3::Y),
    ([0, 4, 7, 3], DVec3::NEG_X),
    ([1, 2, 6, 5], DVec3::X),
  ];

  let mut triangles = Vec::with_capacity(12);
  for (idx, normal) in faces {
    let [a, b, c, d] = idx;
    triangles.push(Triangle::new(corners[a], corners[b], corners[c], normal));
    triangles.push(Triangle::new(corners[a], corners[c], corners[d], normal));
  }
  triangles
}

#[cfg(test)]
#[path = "mesh_test.rs"]
mod mesh_test;
