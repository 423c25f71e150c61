use glam::DVec3;

use crate::cost::{CostCalculator, WeightConfig};
use crate::grid::Grid3D;
use crate::math::Aabb;
use crate::mesh::{box_triangles, TriangleMesh};
use crate::route::{DijkstraRouter, NaiveRouter};
use crate::voxel::VoxelGrid;
use crate::wind::WindField;

struct Fixture {
  grid: Grid3D,
  voxel: VoxelGrid,
  wind: WindField,
}

fn open_world(wind_velocity: DVec3) -> Fixture {
  let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(100.0));
  let mesh = TriangleMesh::with_default_cells(Vec::new());
  Fixture {
    grid: Grid3D::new(bounds, 10.0),
    voxel: VoxelGrid::from_mesh(&mesh, 5.0),
    wind: WindField::new(vec![DVec3::splat(50.0)], vec![wind_velocity], None).unwrap(),
  }
}

fn boxed_world() -> Fixture {
  let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(100.0));
  let mesh = TriangleMesh::with_default_cells(box_triangles(
    DVec3::new(40.0, 0.0, 40.0),
    DVec3::new(60.0, 40.0, 60.0),
  ));
  let voxel = VoxelGrid::from_mesh(&mesh, 5.0);
  let mut grid = Grid3D::new(bounds, 10.0);
  // Routing validity comes from voxel occupancy
  let invalid: Vec<u32> = grid
    .valid_nodes()
    .filter(|n| voxel.point_occupied(n.position))
    .map(|n| n.id)
    .collect();
  for id in invalid {
    grid.set_valid(id, false);
  }
  Fixture {
    grid,
    voxel,
    wind: WindField::new(vec![DVec3::splat(50.0)], vec![DVec3::ZERO], None).unwrap(),
  }
}

#[test]
fn dijkstra_finds_straight_path_without_wind() {
  let fx = open_world(DVec3::ZERO);
  let calc = CostCalculator::new(WeightConfig::distance_only());
  let table = calc.precompute(&fx.grid, &fx.voxel, &fx.wind);
  let router = DijkstraRouter::new(&fx.grid, &table);

  let start = DVec3::new(5.0, 50.0, 50.0);
  let end = DVec3::new(95.0, 50.0, 50.0);
  let result = router.find_path(start, end, false);
  assert!(result.success);
  assert!(result.nodes_explored > 0);
  // Exact endpoints, not snapped lattice positions
  assert_eq!(result.waypoints[0], start);
  assert_eq!(*result.waypoints.last().unwrap(), end);
}

#[test]
fn dijkstra_total_cost_matches_stored_edges() {
  let fx = open_world(DVec3::new(6.0, 0.0, 2.0));
  let calc = CostCalculator::new(WeightConfig::speed_priority());
  let table = calc.precompute(&fx.grid, &fx.voxel, &fx.wind);
  let router = DijkstraRouter::new(&fx.grid, &table);

  let result = router.find_path(
    DVec3::new(10.0, 50.0, 10.0),
    DVec3::new(90.0, 50.0, 90.0),
    false,
  );
  assert!(result.success);

  let summed: f64 = result
    .node_ids
    .windows(2)
    .map(|w| table.cost(w[0], w[1]).unwrap())
    .sum();
  assert!((summed - result.total_cost).abs() < 1e-6);
}

#[test]
fn headwind_makes_reverse_query_costlier() {
  let fx = open_world(DVec3::new(10.0, 0.0, 0.0));
  let calc = CostCalculator::new(WeightConfig::speed_priority());
  let table = calc.precompute(&fx.grid, &fx.voxel, &fx.wind);
  let router = DijkstraRouter::new(&fx.grid, &table);

  let a = DVec3::new(10.0, 20.0, 50.0);
  let b = DVec3::new(90.0, 20.0, 50.0);
  let downwind = router.find_path(a, b, false);
  let upwind = router.find_path(b, a, false);
  assert!(downwind.success && upwind.success);
  assert!(downwind.total_cost < upwind.total_cost);
}

#[test]
fn capture_records_frames_and_final_state() {
  let fx = open_world(DVec3::ZERO);
  let calc = CostCalculator::new(WeightConfig::distance_only());
  let table = calc.precompute(&fx.grid, &fx.voxel, &fx.wind);
  let router = DijkstraRouter::new(&fx.grid, &table).with_capture_interval(10);

  let result = router.find_path(
    DVec3::new(5.0, 50.0, 5.0),
    DVec3::new(95.0, 50.0, 95.0),
    true,
  );
  assert!(result.success);
  assert!(result.frames.len() >= 2);

  let last = result.frames.last().unwrap();
  assert_eq!(last.current_node_id, *result.node_ids.last().unwrap());
  // Snapshots grow monotonically
  for pair in result.frames.windows(2) {
    assert!(pair[0].visited_ids.len() <= pair[1].visited_ids.len());
    assert!(pair[0].step < pair[1].step);
  }
}

#[test]
fn astar_matches_straight_line_distance_in_open_space() {
  let fx = open_world(DVec3::ZERO);
  let edges = CostCalculator::precompute_valid_edges(&fx.grid, &fx.voxel);
  let router = NaiveRouter::new(&fx.grid, &edges);

  // Axis-aligned: lattice path length equals straight-line distance
  let result = router.find_path(
    DVec3::new(10.0, 50.0, 50.0),
    DVec3::new(90.0, 50.0, 50.0),
    false,
  );
  assert!(result.success);
  assert!((result.total_cost - 80.0).abs() < 1e-9);
}

#[test]
fn both_routers_detour_around_obstacle() {
  let fx = boxed_world();
  let calc = CostCalculator::new(WeightConfig::balanced());
  let table = calc.precompute(&fx.grid, &fx.voxel, &fx.wind);
  let edges = CostCalculator::precompute_valid_edges(&fx.grid, &fx.voxel);

  let start = DVec3::new(10.0, 20.0, 50.0);
  let end = DVec3::new(90.0, 20.0, 50.0);

  let optimal = DijkstraRouter::new(&fx.grid, &table).find_path(start, end, false);
  let naive = NaiveRouter::new(&fx.grid, &edges).find_path(start, end, false);
  assert!(optimal.success && naive.success);

  // A detour is strictly longer than the blocked straight line
  assert!(naive.total_cost > 80.0);
  assert!(naive.total_cost < 120.0);

  // No waypoint sits inside the obstacle shell
  for result in [&optimal, &naive] {
    for w in &result.waypoints {
      assert!(!fx.voxel.point_occupied(*w));
    }
  }
}

#[test]
fn no_path_reports_exploration() {
  // Wall the end position off completely
  let bounds = Aabb::new(DVec3::ZERO, DVec3::splat(100.0));
  let mesh = TriangleMesh::with_default_cells(box_triangles(
    DVec3::new(60.0, 0.0, 60.0),
    DVec3::new(100.0, 100.0, 100.0),
  ));
  let voxel = VoxelGrid::from_mesh(&mesh, 5.0);
  let mut grid = Grid3D::new(bounds, 10.0);
  let invalid: Vec<u32> = grid
    .valid_nodes()
    .filter(|n| voxel.point_occupied(n.position))
    .map(|n| n.id)
    .collect();
  for id in invalid {
    grid.set_valid(id, false);
  }

  let edges = CostCalculator::precompute_valid_edges(&grid, &voxel);
  let router = NaiveRouter::new(&grid, &edges);

  // The goal node sits in the hollow interior: reachable snap target exists
  // but every edge into it crosses shell voxels.
  let result = router.find_path(
    DVec3::new(10.0, 20.0, 10.0),
    DVec3::new(80.0, 50.0, 80.0),
    false,
  );
  assert!(!result.success);
  assert!(result.nodes_explored > 0);
  assert!(result.waypoints.is_empty());
}
