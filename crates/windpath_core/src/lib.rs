//! windpath_core - wind-aware drone routing over urban geometry
//!
//! This crate computes drone flight paths through a 3D city under a spatially
//! varying wind field and simulates the resulting flights as time-sequenced
//! kinematic frames. It is transport-agnostic: the [`session::Session`]
//! orchestrator speaks a JSON-like message protocol over any async sink.
//!
//! # Pipeline
//!
//! 1. Triangle mesh → [`mesh::TriangleMesh`] (spatial hash) and
//!    [`voxel::VoxelGrid`] (conservative occupancy).
//! 2. Scattered wind samples → [`wind::WindField`] (nearest-neighbor KD-tree).
//! 3. [`grid::Grid3D`] lattice + [`cost::CostCalculator`] → directional
//!    [`cost::EdgeCostTable`] and collision-free [`cost::ValidEdgeSet`].
//! 4. [`route::DijkstraRouter`] (wind-aware) and [`route::NaiveRouter`]
//!    (distance-only A*) produce waypoint paths.
//! 5. [`sim::FlightSimulator`] flies each path with crab-angle wind
//!    compensation, emitting one [`sim::FlightFrame`] per timestep.
//!
//! # Coordinate convention
//!
//! Y is up; X and Z span the horizontal plane. Loaders convert Z-up sources
//! with `(x, y, z) -> (x, z, -y)` before anything reaches this crate.

pub mod math;
pub use math::{approx_eq, Aabb, EPSILON};

pub mod error;
pub use error::CoreError;

// Geometry and spatial indexing
pub mod mesh;
pub use mesh::{Triangle, TriangleMesh};

pub mod voxel;
pub use voxel::VoxelGrid;

// Wind field with nearest-neighbor lookup
pub mod wind;
pub use wind::WindField;

// 26-connected routing lattice
pub mod grid;
pub use grid::{Grid3D, GridNode};

// Directional edge costs
pub mod cost;
pub use cost::{CostCalculator, EdgeCostTable, ValidEdgeSet, WeightConfig};

// Pathfinders
pub mod route;
pub use route::{DijkstraRouter, ExplorationFrame, NaiveRouter, PathResult};

// Closed-loop flight simulation
pub mod sim;
pub use sim::{FlightFrame, FlightParams, FlightSimulator, FlightSummary};

// Path post-processing and route metrics
pub mod smooth;
pub use smooth::PathSmoother;

pub mod metrics;
pub use metrics::{DroneParams, MetricsCalculator, RouteComparison, RouteMetrics};

// Per-session shared state and orchestration
pub mod scene;
pub use scene::{Scene, SceneConfig};

pub mod protocol;
pub use protocol::{ClientMessage, RouteKind, RouteLabel, ServerMessage};

pub mod session;
pub use session::Session;
