//! Shared math primitives for world-space geometry.

use glam::DVec3;

/// Absolute tolerance for position/direction comparisons.
pub const EPSILON: f64 = 1e-9;

/// Component-wise equality within [`EPSILON`].
#[inline]
pub fn approx_eq(a: DVec3, b: DVec3) -> bool {
  (a.x - b.x).abs() < EPSILON && (a.y - b.y).abs() < EPSILON && (a.z - b.z).abs() < EPSILON
}

/// Unit vector toward `to`, or `None` when the points coincide.
#[inline]
pub fn direction_to(from: DVec3, to: DVec3) -> Option<DVec3> {
  let diff = to - from;
  let mag = diff.length();
  if mag < EPSILON {
    None
  } else {
    Some(diff / mag)
  }
}

/// Double-precision axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (inclusive).
  pub max: DVec3,
}

impl Aabb {
  /// Create a new AABB from min and max corners.
  ///
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// Create an AABB with inverted extents, ready for encapsulation.
  pub fn empty() -> Self {
    Self {
      min: DVec3::splat(f64::INFINITY),
      max: DVec3::splat(f64::NEG_INFINITY),
    }
  }

  /// Expand to include a point.
  #[inline]
  pub fn encapsulate(&mut self, point: DVec3) {
    self.min = self.min.min(point);
    self.max = self.max.max(point);
  }

  /// True once at least one point has been encapsulated.
  #[inline]
  pub fn is_valid(&self) -> bool {
    self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
  }

  /// Check if this AABB overlaps another (shared boundary counts).
  #[inline]
  pub fn overlaps(&self, other: &Aabb) -> bool {
    self.min.x <= other.max.x
      && self.max.x >= other.min.x
      && self.min.y <= other.max.y
      && self.max.y >= other.min.y
      && self.min.z <= other.max.z
      && self.max.z >= other.min.z
  }

  /// Check if this AABB contains a point (boundary counts).
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.x >= self.min.x
      && point.x <= self.max.x
      && point.y >= self.min.y
      && point.y <= self.max.y
      && point.z >= self.min.z
      && point.z <= self.max.z
  }

  /// Size of the AABB (max - min).
  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  /// Center of the AABB.
  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }
}

impl Default for Aabb {
  fn default() -> Self {
    Self::empty()
  }
}
