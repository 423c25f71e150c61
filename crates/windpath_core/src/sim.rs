//! Closed-loop drone flight simulation through the wind field.
//!
//! The simulator is a waypoint follower with wind compensation: it crabs into
//! perpendicular wind, boosts airspeed against headwinds to hold a minimum
//! groundspeed, limits turn rate, and reports a unitless effort level per
//! frame. It is an explicit stepper so a session can interleave two flights
//! frame-by-frame; `simulate()` runs one flight to completion.
//!
//! Numerical trouble is recovered locally: NaN positions revert, near-zero
//! movement triggers an anti-stall nudge (0.5 m toward the final waypoint,
//! kept verbatim from observed behavior even though it is aggressive relative
//! to `timestep * ground_velocity`), and degenerate directions fall back
//! along a fixed chain.

use glam::DVec3;
use serde::Serialize;

use crate::math::EPSILON;
use crate::wind::WindField;

/// Waypoint-advance iterations allowed within a single step.
const MAX_WAYPOINT_SKIPS: usize = 100;

/// Movement below this magnitude counts as a stall.
const STALL_DISTANCE: f64 = 0.05;

/// Displacement applied by the anti-stall guard.
const STALL_NUDGE: f64 = 0.5;

/// Tunable flight model parameters.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FlightParams {
  /// Cruise speed through the air (m/s).
  pub base_airspeed: f64,
  /// Upper bound for dynamic airspeed boosting (m/s).
  pub max_boost_airspeed: f64,
  /// Groundspeed the boost tries to maintain (m/s).
  pub min_desired_groundspeed: f64,
  /// Heading slew limit (degrees per second).
  pub max_turn_rate_deg: f64,
  /// Distance at which a waypoint counts as reached (m).
  pub waypoint_threshold: f64,
  /// Simulation step (s).
  pub timestep: f64,
  /// Hard wall-clock limit on one flight (s).
  pub max_time: f64,
  /// Groundspeed floor enforced after wind addition (m/s).
  pub min_groundspeed_floor: f64,
  /// Maximum crab angle into the wind (degrees).
  pub max_crab_angle_deg: f64,
}

impl Default for FlightParams {
  fn default() -> Self {
    Self {
      base_airspeed: 15.0,
      max_boost_airspeed: 200.0,
      min_desired_groundspeed: 15.0,
      max_turn_rate_deg: 360.0,
      waypoint_threshold: 5.0,
      timestep: 0.1,
      max_time: 600.0,
      min_groundspeed_floor: 10.0,
      max_crab_angle_deg: 30.0,
    }
  }
}

/// Mutable drone state, owned exclusively by one simulator.
#[derive(Clone, Copy, Debug)]
pub struct DroneState {
  pub position: DVec3,
  pub velocity: DVec3,
  /// Unit nose direction.
  pub heading: DVec3,
  pub airspeed: f64,
  pub target_waypoint_index: usize,
}

/// One timestep of flight data for visualization.
#[derive(Clone, Debug, Serialize)]
pub struct FlightFrame {
  pub time: f64,
  pub position: DVec3,
  pub velocity: DVec3,
  pub heading: DVec3,
  pub wind: DVec3,
  /// Wind component perpendicular to the desired track.
  pub drift: DVec3,
  /// Crab correction currently applied (direction * sin of crab angle).
  pub correction: DVec3,
  /// Unitless exertion in [0, 1].
  pub effort: f64,
  pub airspeed: f64,
  pub groundspeed: f64,
  pub waypoint_index: usize,
  pub distance_to_waypoint: f64,
}

/// Aggregate statistics over one flight.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FlightSummary {
  pub total_time: f64,
  pub total_distance: f64,
  pub average_groundspeed: f64,
  pub average_effort: f64,
  pub max_effort: f64,
  pub completed: bool,
  pub waypoints_reached: usize,
  pub frame_count: usize,
}

/// What a single step produced.
#[derive(Debug)]
pub enum StepOutcome {
  /// One more frame of flight.
  Frame(Box<FlightFrame>),
  /// Final waypoint consumed.
  Reached,
  /// `max_time` elapsed before the path completed.
  Timeout,
}

/// State machine for one flight along a waypoint list.
pub struct FlightSimulator<'a> {
  wind_field: &'a WindField,
  params: FlightParams,
  waypoints: Vec<DVec3>,
  state: DroneState,
  time: f64,
  total_distance: f64,
  total_effort: f64,
  max_effort: f64,
  frames_emitted: usize,
}

impl<'a> FlightSimulator<'a> {
  /// Create a simulator positioned at the first waypoint.
  ///
  /// Fewer than two waypoints yields a flight that terminates immediately
  /// without completing.
  pub fn new(wind_field: &'a WindField, params: FlightParams, waypoints: Vec<DVec3>) -> Self {
    let position = waypoints.first().copied().unwrap_or(DVec3::ZERO);
    let heading = waypoints
      .get(1)
      .and_then(|&second| crate::math::direction_to(position, second))
      .unwrap_or(DVec3::X);

    let state = DroneState {
      position,
      velocity: DVec3::ZERO,
      heading,
      airspeed: params.base_airspeed,
      target_waypoint_index: 1,
    };

    Self {
      wind_field,
      params,
      waypoints,
      state,
      time: 0.0,
      total_distance: 0.0,
      total_effort: 0.0,
      max_effort: 0.0,
      frames_emitted: 0,
    }
  }

  pub fn state(&self) -> &DroneState {
    &self.state
  }

  pub fn waypoint_count(&self) -> usize {
    self.waypoints.len()
  }

  /// Advance one timestep.
  ///
  /// Every call either emits a frame and advances time by `timestep`, or
  /// terminates with `Reached`/`Timeout`, so a flight runs at most
  /// `ceil(max_time / timestep)` steps.
  pub fn step(&mut self) -> StepOutcome {
    if self.waypoints.len() < 2 || self.state.target_waypoint_index >= self.waypoints.len() {
      return StepOutcome::Reached;
    }
    if self.time >= self.params.max_time {
      return StepOutcome::Timeout;
    }

    let wind = self.wind_field.wind_at(self.state.position);

    // Consume any waypoints already inside the threshold, bounded so a
    // pathological path cannot spin forever.
    let mut skips = 0;
    while self.state.target_waypoint_index < self.waypoints.len() && skips < MAX_WAYPOINT_SKIPS {
      let target = self.waypoints[self.state.target_waypoint_index];
      if (target - self.state.position).length() < self.params.waypoint_threshold {
        self.state.target_waypoint_index += 1;
        skips += 1;
      } else {
        break;
      }
    }
    if self.state.target_waypoint_index >= self.waypoints.len() {
      return StepOutcome::Reached;
    }

    let target = self.waypoints[self.state.target_waypoint_index];
    let distance_to_waypoint = (target - self.state.position).length();
    let desired = self.desired_direction(target);

    // Dynamic airspeed: boost into headwinds to hold groundspeed
    let headwind_component = -wind.dot(desired);
    let required = headwind_component + self.params.min_desired_groundspeed;
    self.state.airspeed = required.clamp(self.params.base_airspeed, self.params.max_boost_airspeed);

    // Crab into the perpendicular wind component
    let (corrected_heading, correction) = self.crab_heading(desired, wind);

    // Turn-rate-limited heading update
    let max_turn = (self.params.max_turn_rate_deg * self.params.timestep).to_radians();
    self.state.heading = turn_toward(self.state.heading, corrected_heading, max_turn);

    let air_velocity = self.state.heading * self.state.airspeed;
    let mut ground_velocity = air_velocity + wind;
    let mut groundspeed = ground_velocity.length();
    if groundspeed < self.params.min_groundspeed_floor {
      ground_velocity = desired * self.params.min_groundspeed_floor;
      groundspeed = self.params.min_groundspeed_floor;
    }

    let drift = wind - wind.dot(desired) * desired;
    let effort = self.compute_effort(wind, correction);

    let frame = FlightFrame {
      time: self.time,
      position: self.state.position,
      velocity: ground_velocity,
      heading: self.state.heading,
      wind,
      drift,
      correction,
      effort,
      airspeed: self.state.airspeed,
      groundspeed,
      waypoint_index: self.state.target_waypoint_index,
      distance_to_waypoint,
    };

    // Integrate, with NaN revert and anti-stall guard
    let previous = self.state.position;
    let mut next = previous + ground_velocity * self.params.timestep;
    if !next.is_finite() {
      next = previous;
    }
    if (next - previous).length() < STALL_DISTANCE {
      if let Some(dir) = self
        .waypoints
        .last()
        .and_then(|&last| crate::math::direction_to(previous, last))
      {
        next = previous + dir * STALL_NUDGE;
        self.state.heading = dir;
      }
    }
    self.total_distance += (next - previous).length();
    self.state.position = next;
    self.state.velocity = ground_velocity;

    self.total_effort += effort;
    self.max_effort = self.max_effort.max(effort);
    self.frames_emitted += 1;
    self.time += self.params.timestep;

    StepOutcome::Frame(Box::new(frame))
  }

  /// Run the whole flight, collecting every frame.
  pub fn simulate(mut self) -> (Vec<FlightFrame>, FlightSummary) {
    let mut frames = Vec::new();
    loop {
      match self.step() {
        StepOutcome::Frame(frame) => frames.push(*frame),
        StepOutcome::Reached | StepOutcome::Timeout => break,
      }
    }
    let summary = self.summary();
    (frames, summary)
  }

  /// Aggregate statistics for the flight so far.
  pub fn summary(&self) -> FlightSummary {
    FlightSummary {
      total_time: self.time,
      total_distance: self.total_distance,
      average_groundspeed: self.total_distance / self.time.max(0.1),
      average_effort: self.total_effort / self.frames_emitted.max(1) as f64,
      max_effort: self.max_effort,
      completed: self.waypoints.len() >= 2
        && self.state.target_waypoint_index >= self.waypoints.len(),
      waypoints_reached: self.state.target_waypoint_index,
      frame_count: self.frames_emitted,
    }
  }

  /// Unit direction toward the target with the degenerate-case fallback
  /// chain: current heading, then direction to the final waypoint, then -X.
  fn desired_direction(&self, target: DVec3) -> DVec3 {
    crate::math::direction_to(self.state.position, target)
      .or_else(|| {
        let h = self.state.heading;
        (h.length() > EPSILON).then(|| h.normalize())
      })
      .or_else(|| {
        self
          .waypoints
          .last()
          .and_then(|&last| crate::math::direction_to(self.state.position, last))
      })
      .unwrap_or(DVec3::NEG_X)
  }

  /// Heading that counters the perpendicular wind component, clamped to the
  /// maximum crab angle.
  fn crab_heading(&self, desired: DVec3, wind: DVec3) -> (DVec3, DVec3) {
    let wind_parallel = desired * wind.dot(desired);
    let wind_perpendicular = wind - wind_parallel;
    let perp_speed = wind_perpendicular.length();

    if perp_speed < 0.1 {
      return (desired, DVec3::ZERO);
    }

    let max_sin = self.params.max_crab_angle_deg.to_radians().sin();
    let sin_crab = (perp_speed / self.state.airspeed).min(max_sin);
    let crab_angle = sin_crab.asin();
    let correction_dir = -wind_perpendicular / perp_speed;

    let corrected = (desired * crab_angle.cos() + correction_dir * sin_crab).normalize();
    (corrected, correction_dir * sin_crab)
  }

  /// Effort in [0, 1]: baseline + headwind + crab correction + boost.
  fn compute_effort(&self, wind: DVec3, correction: DVec3) -> f64 {
    let headwind = (-wind.dot(self.state.heading)).max(0.0);
    let boost_range = self.params.max_boost_airspeed - self.params.base_airspeed;
    let boost = ((self.state.airspeed - self.params.base_airspeed) / boost_range).max(0.0);

    let effort = 0.1
      + 0.3 * headwind / self.params.base_airspeed
      + 0.2 * correction.length().min(1.0)
      + 0.4 * boost;
    effort.clamp(0.0, 1.0)
  }
}

/// Rotate `current` toward `target` by at most `max_angle` radians.
///
/// A near-180° turn makes the interpolation collapse to zero; symmetry is
/// broken with a perpendicular formed against world-up (world-right when the
/// heading is vertical).
fn turn_toward(current: DVec3, target: DVec3, max_angle: f64) -> DVec3 {
  let dot = current.dot(target).clamp(-1.0, 1.0);
  let angle = dot.acos();

  if angle < 1e-6 {
    return target;
  }
  if angle <= max_angle {
    return target;
  }

  let t = max_angle / angle;
  let blended = current * (1.0 - t) + target * t;
  if blended.length() < EPSILON {
    // Opposite headings: rotate toward a perpendicular instead
    let mut axis = current.cross(DVec3::Y);
    if axis.length() < EPSILON {
      axis = current.cross(DVec3::X);
    }
    let perpendicular = axis.normalize().cross(current).normalize();
    let pivot = current * (1.0 - t) + perpendicular * t;
    return pivot.normalize();
  }
  blended.normalize()
}

#[cfg(test)]
#[path = "sim_test.rs"]
mod sim_test;
