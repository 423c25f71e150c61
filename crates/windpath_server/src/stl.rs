//! Binary STL loading.
//!
//! Format: 80-byte header, u32 triangle count, then 50 bytes per triangle
//! (normal, three vertices as little-endian f32 triples, u16 attribute).
//!
//! STL city exports are Z-up; the routing core is Y-up, so vertices pass
//! through `(x, y, z) -> (x, z, -y)` — the same rotation the visualization
//! client applies, keeping paths aligned with the rendered terrain. Optional
//! post-transforms center the mesh horizontally and drop its lowest point to
//! y = 0.

use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::DVec3;
use tracing::info;
use windpath_core::mesh::Triangle;

const HEADER_LEN: usize = 80;
const TRIANGLE_RECORD_LEN: usize = 50;

/// Loader post-processing options.
#[derive(Clone, Copy, Debug)]
pub struct StlOptions {
  /// Rotate from Z-up into the core's Y-up frame.
  pub convert_coords: bool,
  /// Translate so the horizontal AABB centroid sits at x = z = 0.
  pub center_horizontal: bool,
  /// Translate so the lowest point sits at y = 0.
  pub ground_at_zero: bool,
}

impl Default for StlOptions {
  fn default() -> Self {
    Self {
      convert_coords: true,
      center_horizontal: true,
      ground_at_zero: true,
    }
  }
}

/// Z-up to Y-up: `(x, y, z) -> (x, z, -y)`.
#[inline]
fn to_y_up(v: DVec3) -> DVec3 {
  DVec3::new(v.x, v.z, -v.y)
}

/// Load a binary STL file into core triangles.
pub fn load_binary_stl(path: &Path, options: StlOptions) -> Result<Vec<Triangle>> {
  let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
  if bytes.len() < HEADER_LEN + 4 {
    bail!("{}: too short for a binary STL", path.display());
  }

  let count = u32::from_le_bytes(
    bytes[HEADER_LEN..HEADER_LEN + 4]
      .try_into()
      .expect("4-byte slice"),
  ) as usize;

  let body = &bytes[HEADER_LEN + 4..];
  if body.len() < count * TRIANGLE_RECORD_LEN {
    bail!(
      "{}: header declares {} triangles but payload holds {}",
      path.display(),
      count,
      body.len() / TRIANGLE_RECORD_LEN
    );
  }

  let mut triangles = Vec::with_capacity(count);
  for record in body.chunks_exact(TRIANGLE_RECORD_LEN).take(count) {
    let mut vectors = [DVec3::ZERO; 4];
    for (i, v) in vectors.iter_mut().enumerate() {
      let offset = i * 12;
      let x = f32::from_le_bytes(record[offset..offset + 4].try_into().expect("f32"));
      let y = f32::from_le_bytes(record[offset + 4..offset + 8].try_into().expect("f32"));
      let z = f32::from_le_bytes(record[offset + 8..offset + 12].try_into().expect("f32"));
      *v = DVec3::new(x as f64, y as f64, z as f64);
    }
    let [normal, v0, v1, v2] = if options.convert_coords {
      [
        to_y_up(vectors[0]),
        to_y_up(vectors[1]),
        to_y_up(vectors[2]),
        to_y_up(vectors[3]),
      ]
    } else {
      vectors
    };
    triangles.push(Triangle::new(v0, v1, v2, normal));
  }

  apply_offsets(&mut triangles, options);
  info!(
    path = %path.display(),
    triangles = triangles.len(),
    "loaded binary STL"
  );
  Ok(triangles)
}

fn apply_offsets(triangles: &mut [Triangle], options: StlOptions) {
  if triangles.is_empty() || (!options.center_horizontal && !options.ground_at_zero) {
    return;
  }

  let mut min = DVec3::splat(f64::INFINITY);
  let mut max = DVec3::splat(f64::NEG_INFINITY);
  for tri in triangles.iter() {
    for v in [tri.v0, tri.v1, tri.v2] {
      min = min.min(v);
      max = max.max(v);
    }
  }

  let mut offset = DVec3::ZERO;
  if options.center_horizontal {
    let center = (min + max) * 0.5;
    offset.x = -center.x;
    offset.z = -center.z;
  }
  if options.ground_at_zero {
    offset.y = -min.y;
  }
  if offset == DVec3::ZERO {
    return;
  }

  for tri in triangles.iter_mut() {
    tri.v0 += offset;
    tri.v1 += offset;
    tri.v2 += offset;
  }
}
