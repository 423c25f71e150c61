//! Cubic-spline resampling of discrete waypoint paths.
//!
//! Lattice paths are jagged; the smoother fits one natural cubic spline per
//! axis over a chord-length parameterization and resamples it densely. The
//! endpoints are preserved exactly so the exact-start/exact-end contract of
//! the routers survives smoothing.

use glam::DVec3;

use crate::math::EPSILON;

/// Natural cubic spline through `(t, y)` knots.
///
/// Second derivatives come from the standard tridiagonal system with natural
/// boundary conditions (zero curvature at both ends).
struct NaturalCubicSpline {
  t: Vec<f64>,
  y: Vec<f64>,
  second: Vec<f64>,
}

impl NaturalCubicSpline {
  fn fit(t: &[f64], y: &[f64]) -> Self {
    let n = t.len();
    debug_assert!(n >= 2 && y.len() == n);

    let mut second = vec![0.0; n];
    if n > 2 {
      // Thomas algorithm over the interior knots
      let mut sub = vec![0.0; n];
      let mut diag = vec![0.0; n];
      let mut sup = vec![0.0; n];
      let mut rhs = vec![0.0; n];

      for i in 1..n - 1 {
        let h0 = t[i] - t[i - 1];
        let h1 = t[i + 1] - t[i];
        sub[i] = h0;
        diag[i] = 2.0 * (h0 + h1);
        sup[i] = h1;
        rhs[i] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
      }

      for i in 2..n - 1 {
        let w = sub[i] / diag[i - 1];
        diag[i] -= w * sup[i - 1];
        rhs[i] -= w * rhs[i - 1];
      }

      second[n - 2] = rhs[n - 2] / diag[n - 2];
      for i in (1..n - 2).rev() {
        second[i] = (rhs[i] - sup[i] * second[i + 1]) / diag[i];
      }
    }

    Self {
      t: t.to_vec(),
      y: y.to_vec(),
      second,
    }
  }

  fn eval(&self, x: f64) -> f64 {
    let n = self.t.len();
    // Clamp into the knot range, then locate the segment
    if x <= self.t[0] {
      return self.y[0];
    }
    if x >= self.t[n - 1] {
      return self.y[n - 1];
    }
    let mut i = match self.t.binary_search_by(|probe| probe.total_cmp(&x)) {
      Ok(exact) => return self.y[exact],
      Err(insertion) => insertion,
    };
    i = i.max(1);

    let h = self.t[i] - self.t[i - 1];
    let a = (self.t[i] - x) / h;
    let b = (x - self.t[i - 1]) / h;
    a * self.y[i - 1]
      + b * self.y[i]
      + ((a * a * a - a) * self.second[i - 1] + (b * b * b - b) * self.second[i]) * h * h / 6.0
  }
}

/// Resamples waypoint lists into smooth curves.
#[derive(Clone, Copy, Debug)]
pub struct PathSmoother {
  points_per_segment: usize,
}

impl PathSmoother {
  pub fn new(points_per_segment: usize) -> Self {
    Self {
      points_per_segment: points_per_segment.max(1),
    }
  }

  /// Smooth with the default output density:
  /// `(len - 1) * points_per_segment + 1` points.
  pub fn smooth(&self, path: &[DVec3]) -> Vec<DVec3> {
    if path.len() < 2 {
      return path.to_vec();
    }
    let num_points = (path.len() - 1) * self.points_per_segment + 1;
    self.smooth_n(path, num_points)
  }

  /// Smooth to an explicit number of output points.
  pub fn smooth_n(&self, path: &[DVec3], num_points: usize) -> Vec<DVec3> {
    if path.len() < 2 {
      return path.to_vec();
    }
    if path.len() == 2 {
      return linear_interpolate(path[0], path[1], num_points);
    }

    let t = chord_length_parameter(path);
    let xs: Vec<f64> = path.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = path.iter().map(|p| p.y).collect();
    let zs: Vec<f64> = path.iter().map(|p| p.z).collect();

    let spline_x = NaturalCubicSpline::fit(&t, &xs);
    let spline_y = NaturalCubicSpline::fit(&t, &ys);
    let spline_z = NaturalCubicSpline::fit(&t, &zs);

    let num_points = num_points.max(2);
    let mut out = Vec::with_capacity(num_points);
    for i in 0..num_points {
      let u = i as f64 / (num_points - 1) as f64;
      out.push(DVec3::new(spline_x.eval(u), spline_y.eval(u), spline_z.eval(u)));
    }

    // Exact endpoints survive smoothing
    out[0] = path[0];
    let last = out.len() - 1;
    out[last] = path[path.len() - 1];
    out
  }

  /// Resample to approximately uniform spacing.
  pub fn resample(&self, path: &[DVec3], target_spacing: f64) -> Vec<DVec3> {
    if path.len() < 2 {
      return path.to_vec();
    }
    let total: f64 = path.windows(2).map(|w| (w[1] - w[0]).length()).sum();
    let num_points = ((total / target_spacing) as usize + 1).max(2);
    self.smooth_n(path, num_points)
  }
}

impl Default for PathSmoother {
  fn default() -> Self {
    Self::new(5)
  }
}

/// Cumulative chord length normalized to `[0, 1]`.
fn chord_length_parameter(path: &[DVec3]) -> Vec<f64> {
  let mut t = Vec::with_capacity(path.len());
  t.push(0.0);
  let mut acc = 0.0;
  for w in path.windows(2) {
    acc += (w[1] - w[0]).length();
    t.push(acc);
  }
  if acc > EPSILON {
    for v in &mut t {
      *v /= acc;
    }
  } else {
    // Coincident points: fall back to uniform parameterization
    for (i, v) in t.iter_mut().enumerate() {
      *v = i as f64 / (path.len() - 1) as f64;
    }
  }
  t
}

fn linear_interpolate(start: DVec3, end: DVec3, num_points: usize) -> Vec<DVec3> {
  let num_points = num_points.max(2);
  (0..num_points)
    .map(|i| {
      let t = i as f64 / (num_points - 1) as f64;
      start + (end - start) * t
    })
    .collect()
}
