//! windpath-server: wind-aware drone routing over WebSocket.
//!
//! Loads a city mesh from binary STL (or generates a mock city), builds the
//! shared routing scene, and serves the session protocol on `/ws`. All CLI
//! flags map 1:1 onto core constructor parameters.
//!
//! ```text
//! windpath-server --port 8765                 # mock city, default bounds
//! windpath-server --scene city.stl --preset safety_priority
//! ```

mod mock;
mod stl;
mod ws;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use glam::DVec3;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use windpath_core::cost::WeightConfig;
use windpath_core::math::Aabb;
use windpath_core::mesh::TriangleMesh;
use windpath_core::scene::{Scene, SceneConfig};
use windpath_core::sim::FlightParams;
use windpath_core::wind::WindField;

use crate::ws::AppState;

#[derive(Parser, Debug)]
#[command(name = "windpath-server", about = "Wind-aware drone routing server")]
struct Args {
  /// Binary STL scene file; a mock city is generated when omitted.
  #[arg(long)]
  scene: Option<PathBuf>,

  /// Routing volume maximum corner as "x,y,z" (Y is up). Minimum is the
  /// origin. Defaults to the mesh extent (STL) or 200,80,200 (mock).
  #[arg(long)]
  bounds_max: Option<String>,

  /// Lattice node spacing in meters.
  #[arg(long, default_value_t = 10.0)]
  grid_resolution: f64,

  /// Wind sample spacing in meters (mock wind).
  #[arg(long, default_value_t = 10.0)]
  wind_resolution: f64,

  /// Voxel size for the occupancy grid in meters.
  #[arg(long, default_value_t = 5.0)]
  voxel_size: f64,

  /// Spatial hash cell size for mesh collision queries in meters.
  /// Defaults to the mesh default (20 m).
  #[arg(long)]
  cell_size: Option<f64>,

  /// Cost weight preset: speed_priority, safety_priority, balanced,
  /// distance_only.
  #[arg(long, default_value = "speed_priority")]
  preset: String,

  /// Pause between streamed frames in milliseconds.
  #[arg(long, default_value_t = 50)]
  frame_delay_ms: u64,

  /// Drone cruise airspeed in m/s.
  #[arg(long, default_value_t = 15.0)]
  airspeed: f64,

  /// Ground-level wind as "vx,vy,vz" (mock wind).
  #[arg(long, default_value = "8.0,0.0,3.0")]
  base_wind: String,

  /// Number of mock buildings.
  #[arg(long, default_value_t = 4)]
  buildings: usize,

  /// Mock generator seed.
  #[arg(long, default_value_t = 42)]
  seed: u64,

  #[arg(long, default_value = "127.0.0.1")]
  host: String,

  #[arg(long, default_value_t = 8765)]
  port: u16,
}

fn parse_vec3(raw: &str) -> Result<DVec3> {
  let parts: Vec<f64> = raw
    .split(',')
    .map(|p| p.trim().parse::<f64>())
    .collect::<std::result::Result<_, _>>()
    .with_context(|| format!("parsing \"{raw}\" as x,y,z"))?;
  if parts.len() != 3 {
    return Err(anyhow!("expected three comma-separated numbers, got \"{raw}\""));
  }
  Ok(DVec3::new(parts[0], parts[1], parts[2]))
}

fn build_scene(args: &Args) -> Result<Arc<Scene>> {
  let weights = WeightConfig::preset(&args.preset)
    .ok_or_else(|| anyhow!("unknown weight preset \"{}\"", args.preset))?;
  let base_wind = parse_vec3(&args.base_wind)?;

  let (triangles, bounds, wind) = match &args.scene {
    Some(path) => {
      let triangles = stl::load_binary_stl(path, stl::StlOptions::default())?;

      // Routing volume: mesh extent plus flight headroom, unless overridden
      let mut mesh_bounds = Aabb::new(DVec3::ZERO, DVec3::ONE);
      if !triangles.is_empty() {
        let mut min = DVec3::splat(f64::INFINITY);
        let mut max = DVec3::splat(f64::NEG_INFINITY);
        for tri in &triangles {
          for v in [tri.v0, tri.v1, tri.v2] {
            min = min.min(v);
            max = max.max(v);
          }
        }
        mesh_bounds = Aabb::new(min, max);
      }
      let bounds = match &args.bounds_max {
        Some(raw) => Aabb::new(DVec3::ZERO, parse_vec3(raw)?),
        None => Aabb::new(
          mesh_bounds.min - DVec3::new(20.0, 0.0, 20.0),
          mesh_bounds.max + DVec3::new(20.0, 50.0, 20.0),
        ),
      };

      let mock = mock::generate(&mock::MockSceneConfig {
        bounds,
        num_buildings: 0,
        wind_resolution: args.wind_resolution,
        base_wind,
        seed: args.seed,
        ..mock::MockSceneConfig::default()
      });
      let wind = WindField::new(mock.wind_positions, mock.wind_velocities, Some(mock.turbulence))?;
      (triangles, bounds, wind)
    }
    None => {
      let bounds = match &args.bounds_max {
        Some(raw) => Aabb::new(DVec3::ZERO, parse_vec3(raw)?),
        None => Aabb::new(DVec3::ZERO, DVec3::new(200.0, 80.0, 200.0)),
      };
      let mock = mock::generate(&mock::MockSceneConfig {
        bounds,
        num_buildings: args.buildings,
        wind_resolution: args.wind_resolution,
        base_wind,
        seed: args.seed,
        ..mock::MockSceneConfig::default()
      });
      let wind = WindField::new(mock.wind_positions, mock.wind_velocities, Some(mock.turbulence))?;
      (mock.triangles, bounds, wind)
    }
  };

  let config = SceneConfig {
    bounds,
    grid_resolution: args.grid_resolution,
    voxel_size: args.voxel_size,
    mesh_cell_size: args.cell_size.unwrap_or(TriangleMesh::DEFAULT_CELL_SIZE),
    weights,
  };
  Ok(Arc::new(Scene::build(config, triangles, wind)?))
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let scene = build_scene(&args)?;

  let state = AppState {
    scene,
    flight_params: FlightParams {
      base_airspeed: args.airspeed,
      ..FlightParams::default()
    },
    frame_delay: Duration::from_millis(args.frame_delay_ms),
  };

  let app = Router::new()
    .route("/ws", get(ws::ws_handler))
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http())
    .with_state(state);

  let addr: SocketAddr = format!("{}:{}", args.host, args.port)
    .parse()
    .with_context(|| format!("binding address {}:{}", args.host, args.port))?;
  info!(%addr, "serving ws://{addr}/ws");

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      tokio::signal::ctrl_c().await.ok();
      info!("shutting down");
    })
    .await?;
  Ok(())
}
