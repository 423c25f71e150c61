//! Mock scene and wind generation for demos and tests.
//!
//! Produces a seeded random set of box buildings plus a lattice of wind
//! samples with CFD-flavored effects: wind strengthens with altitude, dies
//! inside buildings, and leaves a slower, more turbulent wake downwind of
//! each building.

use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;
use windpath_core::math::Aabb;
use windpath_core::mesh::{box_triangles, Triangle};

/// Generator knobs.
#[derive(Clone, Copy, Debug)]
pub struct MockSceneConfig {
  /// World volume (Y-up).
  pub bounds: Aabb,
  pub num_buildings: usize,
  /// Building footprint/height minimums `(x, y, z)`.
  pub min_size: DVec3,
  /// Building footprint/height maximums `(x, y, z)`.
  pub max_size: DVec3,
  /// Keep-out margin from the scene edges.
  pub margin: f64,
  /// Wind sample spacing (m).
  pub wind_resolution: f64,
  /// Ground-level wind vector.
  pub base_wind: DVec3,
  /// Wind speed increase per meter of altitude.
  pub altitude_factor: f64,
  pub seed: u64,
}

impl Default for MockSceneConfig {
  fn default() -> Self {
    Self {
      bounds: Aabb::new(DVec3::ZERO, DVec3::new(200.0, 80.0, 200.0)),
      num_buildings: 4,
      min_size: DVec3::new(20.0, 30.0, 20.0),
      max_size: DVec3::new(50.0, 70.0, 50.0),
      margin: 10.0,
      wind_resolution: 10.0,
      base_wind: DVec3::new(8.0, 0.0, 3.0),
      altitude_factor: 0.005,
      seed: 42,
    }
  }
}

/// Generated scene inputs ready for `Scene::build` and `WindField::new`.
pub struct MockScene {
  pub triangles: Vec<Triangle>,
  pub buildings: Vec<Aabb>,
  pub wind_positions: Vec<DVec3>,
  pub wind_velocities: Vec<DVec3>,
  pub turbulence: Vec<f64>,
}

/// Generate buildings and a wind sample lattice.
pub fn generate(config: &MockSceneConfig) -> MockScene {
  let mut rng = StdRng::seed_from_u64(config.seed);
  let buildings = place_buildings(&mut rng, config);

  let mut triangles = Vec::with_capacity(buildings.len() * 12);
  for b in &buildings {
    triangles.extend(box_triangles(b.min, b.max));
  }

  let (wind_positions, wind_velocities, turbulence) = sample_wind(config, &buildings);
  info!(
    buildings = buildings.len(),
    wind_samples = wind_positions.len(),
    "generated mock scene"
  );

  MockScene {
    triangles,
    buildings,
    wind_positions,
    wind_velocities,
    turbulence,
  }
}

/// Drop non-overlapping boxes on the ground plane.
fn place_buildings(rng: &mut StdRng, config: &MockSceneConfig) -> Vec<Aabb> {
  let bounds = config.bounds;
  let mut buildings: Vec<Aabb> = Vec::new();
  let mut attempts = 0;

  while buildings.len() < config.num_buildings && attempts < config.num_buildings * 20 {
    attempts += 1;

    let width = rng.gen_range(config.min_size.x..=config.max_size.x);
    let height = rng.gen_range(config.min_size.y..=config.max_size.y);
    let depth = rng.gen_range(config.min_size.z..=config.max_size.z);

    let max_x = bounds.max.x - config.margin - width;
    let max_z = bounds.max.z - config.margin - depth;
    if max_x <= bounds.min.x + config.margin || max_z <= bounds.min.z + config.margin {
      break;
    }
    let x = rng.gen_range(bounds.min.x + config.margin..=max_x);
    let z = rng.gen_range(bounds.min.z + config.margin..=max_z);

    let candidate = Aabb::new(
      DVec3::new(x, 0.0, z),
      DVec3::new(x + width, height.min(bounds.max.y), z + depth),
    );
    if buildings.iter().any(|b| b.overlaps(&candidate)) {
      continue;
    }
    buildings.push(candidate);
  }
  buildings
}

/// Wind lattice with altitude scaling and building wake effects.
fn sample_wind(
  config: &MockSceneConfig,
  buildings: &[Aabb],
) -> (Vec<DVec3>, Vec<DVec3>, Vec<f64>) {
  let bounds = config.bounds;
  let res = config.wind_resolution;
  let size = bounds.size();
  let nx = ((size.x / res) as usize + 1).max(2);
  let ny = ((size.y / res) as usize + 1).max(2);
  let nz = ((size.z / res) as usize + 1).max(2);

  let wind_dir_horizontal = {
    let horizontal = DVec3::new(config.base_wind.x, 0.0, config.base_wind.z);
    if horizontal.length() > 0.1 {
      horizontal.normalize()
    } else {
      DVec3::X
    }
  };

  let mut positions = Vec::with_capacity(nx * ny * nz);
  let mut velocities = Vec::with_capacity(nx * ny * nz);
  let mut turbulence = Vec::with_capacity(nx * ny * nz);

  for ix in 0..nx {
    for iy in 0..ny {
      for iz in 0..nz {
        let pos = bounds.min
          + DVec3::new(ix as f64 * res, iy as f64 * res, iz as f64 * res);

        let mut wind = config.base_wind * (1.0 + pos.y * config.altitude_factor);
        let mut turb: f64 = 0.05;

        for building in buildings {
          if building.contains_point(pos) {
            wind = DVec3::ZERO;
            turb = 0.0;
            break;
          }
          let (wake, near_edge) = building_influence(pos, building, wind_dir_horizontal);
          if wake {
            wind *= 0.4;
            turb = turb.max(0.6);
          } else if near_edge {
            turb = turb.max(0.3);
          }
        }

        positions.push(pos);
        velocities.push(wind);
        turbulence.push(turb.min(1.0));
      }
    }
  }

  (positions, velocities, turbulence)
}

/// Classify a sample relative to one building: in its wake, or near its
/// edges. The wake extends downwind for one building-length and only below
/// roof height.
fn building_influence(pos: DVec3, building: &Aabb, wind_dir: DVec3) -> (bool, bool) {
  let center = building.center();
  let size = building.size();

  if pos.y > building.max.y + 5.0 {
    return (false, false);
  }

  let offset = DVec3::new(pos.x - center.x, 0.0, pos.z - center.z);
  let downwind = offset.dot(wind_dir);
  let lateral = (offset - wind_dir * downwind).length();
  let half_span = 0.5 * size.x.max(size.z);
  let wake_length = size.x.max(size.z);

  let in_wake = downwind > half_span && downwind < half_span + wake_length && lateral < half_span;
  if in_wake {
    return (true, false);
  }

  let expanded = Aabb::new(
    building.min - DVec3::splat(10.0),
    building.max + DVec3::splat(10.0),
  );
  (false, expanded.contains_point(pos))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generation_is_seed_deterministic() {
    let config = MockSceneConfig::default();
    let a = generate(&config);
    let b = generate(&config);
    assert_eq!(a.buildings.len(), b.buildings.len());
    for (x, y) in a.buildings.iter().zip(&b.buildings) {
      assert_eq!(x.min, y.min);
      assert_eq!(x.max, y.max);
    }
    assert_eq!(a.wind_velocities, b.wind_velocities);
  }

  #[test]
  fn buildings_stay_inside_margins_and_apart() {
    let config = MockSceneConfig::default();
    let scene = generate(&config);
    assert!(!scene.buildings.is_empty());

    for (i, b) in scene.buildings.iter().enumerate() {
      assert!(b.min.x >= config.bounds.min.x + config.margin);
      assert!(b.max.x <= config.bounds.max.x - config.margin);
      assert!(b.min.z >= config.bounds.min.z + config.margin);
      assert!(b.max.z <= config.bounds.max.z - config.margin);
      assert_eq!(b.min.y, 0.0);
      for other in &scene.buildings[i + 1..] {
        assert!(!b.overlaps(other));
      }
    }
  }

  #[test]
  fn twelve_triangles_per_building() {
    let scene = generate(&MockSceneConfig::default());
    assert_eq!(scene.triangles.len(), scene.buildings.len() * 12);
  }

  #[test]
  fn wind_strengthens_with_altitude_in_open_air() {
    let config = MockSceneConfig {
      num_buildings: 0,
      ..MockSceneConfig::default()
    };
    let scene = generate(&config);

    let ground = scene
      .wind_positions
      .iter()
      .position(|p| p.y == 0.0)
      .unwrap();
    let aloft = scene
      .wind_positions
      .iter()
      .position(|p| p.y == 80.0)
      .unwrap();
    assert!(
      scene.wind_velocities[aloft].length() > scene.wind_velocities[ground].length()
    );
  }

  #[test]
  fn wind_dies_inside_buildings() {
    let scene = generate(&MockSceneConfig::default());
    let interior: Vec<usize> = scene
      .wind_positions
      .iter()
      .enumerate()
      .filter(|(_, p)| scene.buildings.iter().any(|b| b.contains_point(**p)))
      .map(|(i, _)| i)
      .collect();
    assert!(!interior.is_empty());
    for i in interior {
      assert_eq!(scene.wind_velocities[i], DVec3::ZERO);
    }
  }

  #[test]
  fn wakes_are_turbulent() {
    let scene = generate(&MockSceneConfig::default());
    assert!(scene.turbulence.iter().any(|&t| t >= 0.6));
  }
}
