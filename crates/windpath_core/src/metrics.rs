//! Route performance metrics.
//!
//! Per-segment estimates of flight time, energy and risk over a waypoint
//! path, using the wind field at segment midpoints. These power the
//! `simulation_end` / `complete` payloads that let a client compare the
//! naive and wind-aware routes.

use glam::DVec3;
use serde::Serialize;

use crate::math::EPSILON;
use crate::wind::WindField;

/// Drone performance model used for metric estimation.
#[derive(Clone, Copy, Debug)]
pub struct DroneParams {
  /// Speed through the air (m/s).
  pub base_airspeed: f64,
  /// Minimum forward progress regardless of headwind (m/s).
  pub min_ground_speed: f64,
  /// Hover/cruise power draw (W).
  pub base_power: f64,
  /// Additional draw per m/s of headwind (W).
  pub headwind_power_factor: f64,
  /// Additional draw for turbulence stabilization (W).
  pub turbulence_power_factor: f64,
  /// Turbulence above this level is dangerous.
  pub max_safe_turbulence: f64,
  /// Wind speed above this level is dangerous (m/s).
  pub max_safe_wind_speed: f64,
  /// Turbulence level that counts as a distinct zone crossing.
  pub turbulence_zone_threshold: f64,
  /// Exponential factor for turbulence risk.
  pub turbulence_risk_factor: f64,
  /// Exponential factor for wind-speed risk.
  pub wind_risk_factor: f64,
  /// Per-point risk accumulation scale.
  pub point_risk_scale: f64,
}

impl Default for DroneParams {
  fn default() -> Self {
    Self {
      base_airspeed: 15.0,
      min_ground_speed: 1.0,
      base_power: 100.0,
      headwind_power_factor: 15.0,
      turbulence_power_factor: 50.0,
      max_safe_turbulence: 0.3,
      max_safe_wind_speed: 20.0,
      turbulence_zone_threshold: 0.5,
      turbulence_risk_factor: 5.0,
      wind_risk_factor: 0.5,
      point_risk_scale: 0.001,
    }
  }
}

/// Head-to-head comparison of two routes (first relative to second).
///
/// Ratios above 1 mean the second route wins on that axis; the `*_saved`
/// fields are plain differences (first minus second).
#[derive(Clone, Debug, Default, Serialize)]
pub struct RouteComparison {
  pub distance_ratio: f64,
  pub time_ratio: f64,
  pub energy_ratio: f64,
  pub crash_risk_ratio: f64,
  pub time_saved_seconds: f64,
  pub energy_saved_wh: f64,
  pub crash_risk_reduction_pct: f64,
}

impl RouteComparison {
  /// Compare two already-computed metric sets.
  pub fn between(first: &RouteMetrics, second: &RouteMetrics) -> Self {
    Self {
      distance_ratio: safe_ratio(first.total_distance, second.total_distance),
      time_ratio: safe_ratio(first.total_flight_time, second.total_flight_time),
      energy_ratio: safe_ratio(first.energy_consumption, second.energy_consumption),
      crash_risk_ratio: safe_ratio(first.crash_probability, second.crash_probability),
      time_saved_seconds: first.total_flight_time - second.total_flight_time,
      energy_saved_wh: first.energy_consumption - second.energy_consumption,
      crash_risk_reduction_pct: first.crash_probability - second.crash_probability,
    }
  }
}

/// Ratio with a zero-denominator guard: equal-and-zero compares as 1.
fn safe_ratio(a: f64, b: f64) -> f64 {
  if b == 0.0 {
    if a > 0.0 {
      f64::INFINITY
    } else {
      1.0
    }
  } else {
    a / b
  }
}

/// Aggregate metrics for one route.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RouteMetrics {
  pub total_distance: f64,
  pub total_flight_time: f64,
  pub average_ground_speed: f64,
  /// Watt-hours.
  pub energy_consumption: f64,
  pub average_power: f64,
  /// Percentage in [0, 100].
  pub crash_probability: f64,
  pub max_turbulence_encountered: f64,
  pub max_wind_speed_encountered: f64,
  pub turbulence_zones_crossed: usize,
  pub path_points: usize,
  pub headwind_segments: usize,
  pub tailwind_segments: usize,
}

/// Computes [`RouteMetrics`] for waypoint paths.
pub struct MetricsCalculator<'a> {
  wind_field: &'a WindField,
  params: DroneParams,
}

impl<'a> MetricsCalculator<'a> {
  pub fn new(wind_field: &'a WindField) -> Self {
    Self {
      wind_field,
      params: DroneParams::default(),
    }
  }

  pub fn with_params(wind_field: &'a WindField, params: DroneParams) -> Self {
    Self { wind_field, params }
  }

  /// Segment-by-segment metric accumulation over a path.
  pub fn calculate(&self, path: &[DVec3]) -> RouteMetrics {
    let mut metrics = RouteMetrics {
      path_points: path.len(),
      ..RouteMetrics::default()
    };
    if path.len() < 2 {
      return metrics;
    }

    let mut total_time = 0.0;
    let mut total_energy_ws = 0.0;
    let mut crash_survival = 1.0;
    let mut in_turbulence_zone = false;

    for segment in path.windows(2) {
      let (start, end) = (segment[0], segment[1]);
      let delta = end - start;
      let distance = delta.length();
      if distance < 1e-6 {
        continue;
      }
      let direction = delta / distance;
      metrics.total_distance += distance;

      let midpoint = (start + end) * 0.5;
      let (wind, turbulence) = self.wind_field.wind_and_turbulence_at(midpoint);
      let wind_speed = wind.length();
      metrics.max_wind_speed_encountered = metrics.max_wind_speed_encountered.max(wind_speed);
      metrics.max_turbulence_encountered = metrics.max_turbulence_encountered.max(turbulence);

      // Positive alignment is tailwind, negative is headwind
      let wind_alignment = wind.dot(direction);
      if wind_alignment < 0.0 {
        metrics.headwind_segments += 1;
      } else {
        metrics.tailwind_segments += 1;
      }

      let ground_speed =
        (self.params.base_airspeed + wind_alignment).max(self.params.min_ground_speed);
      let segment_time = distance / ground_speed;
      total_time += segment_time;

      let headwind = (-wind_alignment).max(0.0);
      let segment_power = self.params.base_power
        + headwind * self.params.headwind_power_factor
        + turbulence * self.params.turbulence_power_factor;
      total_energy_ws += segment_power * segment_time;

      crash_survival *= 1.0 - self.point_risk(turbulence, wind_speed);

      if turbulence > self.params.turbulence_zone_threshold {
        if !in_turbulence_zone {
          metrics.turbulence_zones_crossed += 1;
          in_turbulence_zone = true;
        }
      } else {
        in_turbulence_zone = false;
      }
    }

    metrics.total_flight_time = total_time;
    metrics.energy_consumption = total_energy_ws / 3600.0;
    if total_time > EPSILON {
      metrics.average_ground_speed = metrics.total_distance / total_time;
      metrics.average_power = total_energy_ws / total_time;
    }
    metrics.crash_probability = (1.0 - crash_survival) * 100.0;
    metrics
  }

  /// Compare two paths head to head (first relative to second).
  pub fn compare(&self, path_a: &[DVec3], path_b: &[DVec3]) -> RouteComparison {
    RouteComparison::between(&self.calculate(path_a), &self.calculate(path_b))
  }

  /// Exponential risk contribution of one sample point.
  fn point_risk(&self, turbulence: f64, wind_speed: f64) -> f64 {
    let turb_risk = if turbulence > self.params.max_safe_turbulence {
      let excess = turbulence - self.params.max_safe_turbulence;
      1.0 - (-self.params.turbulence_risk_factor * excess).exp()
    } else {
      0.0
    };

    let wind_risk = if wind_speed > self.params.max_safe_wind_speed {
      let excess = wind_speed - self.params.max_safe_wind_speed;
      1.0 - (-self.params.wind_risk_factor * excess).exp()
    } else {
      0.0
    };

    // Independent risks combine multiplicatively
    let point_risk = 1.0 - (1.0 - turb_risk) * (1.0 - wind_risk);
    point_risk * self.params.point_risk_scale
  }
}
