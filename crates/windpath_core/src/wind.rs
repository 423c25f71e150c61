//! Point-sampled wind field with nearest-neighbor lookup.
//!
//! Samples are scattered 3D positions each carrying a velocity vector and an
//! optional turbulence scalar. Queries return the nearest stored sample with
//! no interpolation, so the field is well-defined everywhere, including
//! outside the sample hull.

use glam::DVec3;
use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use rayon::prelude::*;
use tracing::info;

use crate::error::CoreError;
use crate::math::Aabb;

/// Immutable wind field over scattered samples.
#[derive(Debug)]
pub struct WindField {
  positions: Vec<DVec3>,
  velocities: Vec<DVec3>,
  turbulence: Vec<f64>,
  tree: KdTree<f64, usize, [f64; 3]>,
  bounds: Aabb,
}

impl WindField {
  /// Build a field from parallel position/velocity arrays.
  ///
  /// Turbulence defaults to zero everywhere when not supplied. Zero samples
  /// are rejected: nearest-neighbor lookup would be undefined.
  pub fn new(
    positions: Vec<DVec3>,
    velocities: Vec<DVec3>,
    turbulence: Option<Vec<f64>>,
  ) -> Result<Self, CoreError> {
    if positions.is_empty() {
      return Err(CoreError::WindFieldEmpty);
    }
    if positions.len() != velocities.len() {
      return Err(CoreError::MismatchedInput(format!(
        "{} positions vs {} velocities",
        positions.len(),
        velocities.len()
      )));
    }
    let turbulence = match turbulence {
      Some(t) if t.len() != positions.len() => {
        return Err(CoreError::MismatchedInput(format!(
          "{} positions vs {} turbulence samples",
          positions.len(),
          t.len()
        )));
      }
      Some(t) => t,
      None => vec![0.0; positions.len()],
    };

    let mut tree = KdTree::new(3);
    let mut bounds = Aabb::empty();
    for (i, &p) in positions.iter().enumerate() {
      tree
        .add([p.x, p.y, p.z], i)
        .map_err(|e| CoreError::MismatchedInput(format!("non-finite sample position: {e:?}")))?;
      bounds.encapsulate(p);
    }

    info!(samples = positions.len(), "built wind field KD-tree");

    Ok(Self {
      positions,
      velocities,
      turbulence,
      tree,
      bounds,
    })
  }

  /// Number of samples.
  pub fn len(&self) -> usize {
    self.positions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }

  /// Component-wise min/max of sample positions.
  pub fn bounds(&self) -> Aabb {
    self.bounds
  }

  pub fn positions(&self) -> &[DVec3] {
    &self.positions
  }

  pub fn velocities(&self) -> &[DVec3] {
    &self.velocities
  }

  pub fn turbulence(&self) -> &[f64] {
    &self.turbulence
  }

  #[inline]
  fn nearest_index(&self, point: DVec3) -> usize {
    // The field is never empty, so a nearest sample always exists; a failed
    // query (non-finite input) falls back to the first sample.
    self
      .tree
      .nearest(&[point.x, point.y, point.z], 1, &squared_euclidean)
      .ok()
      .and_then(|found| found.first().map(|&(_, &i)| i))
      .unwrap_or(0)
  }

  /// Wind vector at the nearest sample.
  #[inline]
  pub fn wind_at(&self, point: DVec3) -> DVec3 {
    self.velocities[self.nearest_index(point)]
  }

  /// Turbulence scalar at the nearest sample (zero unless supplied).
  #[inline]
  pub fn turbulence_at(&self, point: DVec3) -> f64 {
    self.turbulence[self.nearest_index(point)]
  }

  /// Wind and turbulence in one lookup.
  #[inline]
  pub fn wind_and_turbulence_at(&self, point: DVec3) -> (DVec3, f64) {
    let i = self.nearest_index(point);
    (self.velocities[i], self.turbulence[i])
  }

  /// Batched wind lookup, parallel over query points.
  pub fn wind_batch(&self, points: &[DVec3]) -> Vec<DVec3> {
    points.par_iter().map(|&p| self.wind_at(p)).collect()
  }

  /// Batched turbulence lookup, parallel over query points.
  pub fn turbulence_batch(&self, points: &[DVec3]) -> Vec<f64> {
    points.par_iter().map(|&p| self.turbulence_at(p)).collect()
  }
}
