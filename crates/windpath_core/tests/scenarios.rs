//! End-to-end routing scenarios over small seeded worlds.

use glam::DVec3;
use windpath_core::cost::{CostCalculator, WeightConfig};
use windpath_core::grid::Grid3D;
use windpath_core::math::Aabb;
use windpath_core::mesh::{box_triangles, TriangleMesh};
use windpath_core::route::{DijkstraRouter, NaiveRouter};
use windpath_core::scene::{Scene, SceneConfig};
use windpath_core::sim::{FlightParams, FlightSimulator};
use windpath_core::voxel::VoxelGrid;
use windpath_core::wind::WindField;

fn scene_with(
  triangles: Vec<windpath_core::mesh::Triangle>,
  wind_positions: Vec<DVec3>,
  wind_velocities: Vec<DVec3>,
  weights: WeightConfig,
) -> Scene {
  let config = SceneConfig {
    bounds: Aabb::new(DVec3::ZERO, DVec3::splat(100.0)),
    grid_resolution: 10.0,
    weights,
    ..SceneConfig::default()
  };
  let wind = WindField::new(wind_positions, wind_velocities, None).unwrap();
  Scene::build(config, triangles, wind).unwrap()
}

/// Scenario A: empty scene with a uniform-ish wind field.
#[test]
fn empty_scene_with_wind_routes_monotonically() {
  let scene = scene_with(
    Vec::new(),
    vec![DVec3::new(0.0, 50.0, 0.0), DVec3::new(100.0, 50.0, 0.0)],
    vec![DVec3::new(8.0, 0.0, 3.0), DVec3::new(8.0, 0.0, 3.0)],
    WeightConfig::speed_priority(),
  );

  let start = DVec3::new(5.0, 50.0, 5.0);
  let end = DVec3::new(95.0, 50.0, 95.0);

  let optimized = DijkstraRouter::new(&scene.grid, &scene.cost_table).find_path(start, end, false);
  let naive = NaiveRouter::new(&scene.grid, &scene.valid_edges).find_path(start, end, false);

  assert!(optimized.success);
  assert!(naive.success);
  assert_eq!(optimized.waypoints[0], start);
  assert_eq!(*optimized.waypoints.last().unwrap(), end);

  // Both routes move between 26-neighbors one lattice step at a time and
  // never fight the wind in x; the distance-optimal route is monotone in z
  // as well (any z backtrack would lengthen it)
  for result in [&optimized, &naive] {
    for pair in result.node_ids.windows(2) {
      let a = scene.grid.node(pair[0]).index;
      let b = scene.grid.node(pair[1]).index;
      assert!(b.0 >= a.0, "x went backwards");
      let step = (b.0 as i64 - a.0 as i64)
        .abs()
        .max((b.1 as i64 - a.1 as i64).abs())
        .max((b.2 as i64 - a.2 as i64).abs());
      assert_eq!(step, 1, "path must move between 26-neighbors");
    }
  }
  for pair in naive.node_ids.windows(2) {
    let a = scene.grid.node(pair[0]).index;
    let b = scene.grid.node(pair[1]).index;
    assert!(b.2 >= a.2, "naive route backtracked in z");
  }
}

/// Scenario B: one box building forces a detour.
#[test]
fn single_box_obstacle_forces_detour() {
  let triangles = box_triangles(DVec3::new(40.0, 0.0, 40.0), DVec3::new(60.0, 40.0, 60.0));
  let scene = scene_with(
    triangles,
    vec![DVec3::new(50.0, 50.0, 50.0)],
    vec![DVec3::ZERO],
    WeightConfig::distance_only(),
  );

  let start = DVec3::new(10.0, 20.0, 50.0);
  let end = DVec3::new(90.0, 20.0, 50.0);

  let optimized = DijkstraRouter::new(&scene.grid, &scene.cost_table).find_path(start, end, false);
  let naive = NaiveRouter::new(&scene.grid, &scene.valid_edges).find_path(start, end, false);
  assert!(optimized.success && naive.success);

  // The straight line is blocked; the shortest detour lands in (80, 120)
  assert!(naive.total_cost > 80.0);
  assert!(naive.total_cost < 120.0);

  // Both endpoints lie exactly on lattice nodes here, so the reported cost
  // is exactly the waypoint polyline length
  assert!((naive.path_length() - naive.total_cost).abs() < 1e-9);

  // Zero wind and a pure-distance weighting: both searches agree
  assert!((optimized.total_cost - naive.total_cost).abs() < 1e-6);

  // No lattice segment of either path crosses an occupied voxel
  for result in [&optimized, &naive] {
    let positions: Vec<DVec3> = result
      .node_ids
      .iter()
      .map(|&id| scene.grid.node(id).position)
      .collect();
    let starts = positions[..positions.len() - 1].to_vec();
    let ends = positions[1..].to_vec();
    let hits = scene.voxel.segments_intersect_batch(&starts, &ends, 5);
    assert!(hits.iter().all(|&hit| !hit));
  }
}

/// Scenario B continued: a balanced preset scales the same geometry by its
/// distance weight.
#[test]
fn balanced_preset_scales_distance_cost() {
  let triangles = box_triangles(DVec3::new(40.0, 0.0, 40.0), DVec3::new(60.0, 40.0, 60.0));
  let scene = scene_with(
    triangles,
    vec![DVec3::new(50.0, 50.0, 50.0)],
    vec![DVec3::ZERO],
    WeightConfig::balanced(),
  );

  let start = DVec3::new(10.0, 20.0, 50.0);
  let end = DVec3::new(90.0, 20.0, 50.0);
  let optimized = DijkstraRouter::new(&scene.grid, &scene.cost_table).find_path(start, end, false);
  let naive = NaiveRouter::new(&scene.grid, &scene.valid_edges).find_path(start, end, false);
  assert!(optimized.success && naive.success);

  // Calm air leaves only the weighted distance term
  assert!((optimized.total_cost - 0.34 * naive.total_cost).abs() < 1e-6);
}

/// Scenario C: headwind asymmetry between a query and its reverse.
#[test]
fn upwind_route_costs_more_than_downwind() {
  let scene = scene_with(
    Vec::new(),
    vec![DVec3::new(50.0, 50.0, 50.0)],
    vec![DVec3::new(10.0, 0.0, 0.0)],
    WeightConfig::speed_priority(),
  );
  let router = DijkstraRouter::new(&scene.grid, &scene.cost_table);

  let a = DVec3::new(10.0, 20.0, 50.0);
  let b = DVec3::new(90.0, 20.0, 50.0);
  let downwind = router.find_path(a, b, false);
  let upwind = router.find_path(b, a, false);
  assert!(downwind.success && upwind.success);
  assert!(downwind.total_cost < upwind.total_cost);

  // Dijkstra optimality: the naive route rescored under the wind-aware
  // table can never beat the optimized route
  let naive = NaiveRouter::new(&scene.grid, &scene.valid_edges).find_path(a, b, false);
  assert!(naive.success);
  let naive_rescored: f64 = naive
    .node_ids
    .windows(2)
    .map(|w| scene.cost_table.cost(w[0], w[1]).unwrap())
    .sum();
  assert!(downwind.total_cost <= naive_rescored + 1e-9);
}

/// Scenario D: a start position inside the mesh is rejected up front.
#[test]
fn start_inside_mesh_is_invalid_input() {
  let triangles = box_triangles(DVec3::new(40.0, 0.0, 40.0), DVec3::new(60.0, 40.0, 60.0));
  let scene = scene_with(
    triangles,
    vec![DVec3::new(50.0, 50.0, 50.0)],
    vec![DVec3::ZERO],
    WeightConfig::speed_priority(),
  );

  // Hollow interior (mesh parity) and wall voxel (occupancy) both reject
  for inside in [DVec3::new(50.0, 20.0, 50.0), DVec3::new(41.0, 20.0, 50.0)] {
    let err = scene.validate_position(inside, "start").unwrap_err();
    assert!(matches!(
      err,
      windpath_core::error::CoreError::InvalidInput(_)
    ));
  }
}

/// Scenario E: a goal sealed inside walls yields a no-path result after a
/// real search.
#[test]
fn unreachable_goal_fails_with_exploration() {
  // Enclosure whose shell seals its interior from the rest of the world
  let triangles = box_triangles(DVec3::new(60.0, 0.0, 60.0), DVec3::new(100.0, 100.0, 100.0));
  let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(100.0));
  let mesh = TriangleMesh::with_default_cells(triangles);
  let voxel = VoxelGrid::from_mesh(&mesh, 5.0);
  let mut grid = Grid3D::new(bounds, 10.0);
  let occupied: Vec<u32> = grid
    .valid_nodes()
    .filter(|n| voxel.point_occupied(n.position))
    .map(|n| n.id)
    .collect();
  for id in occupied {
    grid.set_valid(id, false);
  }

  let wind = WindField::new(vec![DVec3::splat(50.0)], vec![DVec3::ZERO], None).unwrap();
  let calc = CostCalculator::new(WeightConfig::speed_priority());
  let table = calc.precompute(&grid, &voxel, &wind);
  let edges = CostCalculator::precompute_valid_edges(&grid, &voxel);

  let start = DVec3::new(10.0, 20.0, 10.0);
  let end = DVec3::new(80.0, 50.0, 80.0);

  let optimized = DijkstraRouter::new(&grid, &table).find_path(start, end, false);
  let naive = NaiveRouter::new(&grid, &edges).find_path(start, end, false);
  for result in [optimized, naive] {
    assert!(!result.success);
    assert!(result.nodes_explored > 0);
    assert!(result.waypoints.is_empty());
  }
}

/// Scenario F: with-wind vs against-wind flights over the same 200 m leg.
#[test]
fn tailwind_flight_finishes_sooner_than_headwind() {
  let wind = WindField::new(
    vec![DVec3::new(100.0, 50.0, 0.0)],
    vec![DVec3::new(15.0, 0.0, 0.0)],
    None,
  )
  .unwrap();
  let params = FlightParams::default();

  let forward = vec![DVec3::new(0.0, 50.0, 0.0), DVec3::new(200.0, 50.0, 0.0)];
  let backward = vec![DVec3::new(200.0, 50.0, 0.0), DVec3::new(0.0, 50.0, 0.0)];

  let (with_frames, with_summary) = FlightSimulator::new(&wind, params, forward).simulate();
  let (against_frames, against_summary) = FlightSimulator::new(&wind, params, backward).simulate();

  assert!(with_summary.completed && against_summary.completed);
  assert!(with_frames.len() < against_frames.len());

  // Fighting 15 m/s of wind requires boosting past cruise airspeed
  assert!(against_frames
    .iter()
    .any(|f| f.airspeed > params.base_airspeed + 1.0));
  assert!(against_summary.average_effort > with_summary.average_effort);
}
