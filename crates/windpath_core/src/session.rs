//! Session orchestration: one client, one message loop.
//!
//! A [`Session`] owns a read-only [`Scene`] handle and an outbound message
//! channel. It answers scene/wind queries directly and, for `start`
//! requests, runs both routers, smooths the waypoints, and streams the two
//! flights as cooperatively interleaved steppers: step `k` of both routes is
//! emitted before step `k + 1` of either, with a `frame_delay` pause between
//! steps. Dropping the receiving end cancels the session at the next
//! suspension point.
//!
//! Ordering guarantees within a session: scene info precedes paths, paths
//! precede frames, per-route frame times are monotone, and each route's
//! `simulation_end` follows its last frame; `complete` is always last.

use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::metrics::{MetricsCalculator, RouteMetrics};
use crate::protocol::{
  BoundsInfo, ClientMessage, FullSceneInfo, MetricsByRoute, PathsInfo, RouteKind, RouteLabel,
  SceneInfo, ServerMessage, WindFieldInfo,
};
use crate::route::{DijkstraRouter, NaiveRouter};
use crate::scene::Scene;
use crate::sim::{FlightParams, FlightSimulator, StepOutcome};
use crate::smooth::PathSmoother;

/// One client session over an abstract message transport.
pub struct Session {
  scene: Arc<Scene>,
  flight_params: FlightParams,
  smoother: PathSmoother,
  frame_delay: Duration,
  out: mpsc::Sender<ServerMessage>,
}

impl Session {
  pub fn new(scene: Arc<Scene>, out: mpsc::Sender<ServerMessage>) -> Self {
    Self {
      scene,
      flight_params: FlightParams::default(),
      smoother: PathSmoother::default(),
      frame_delay: Duration::from_millis(50),
      out,
    }
  }

  pub fn with_frame_delay(mut self, frame_delay: Duration) -> Self {
    self.frame_delay = frame_delay;
    self
  }

  pub fn with_flight_params(mut self, params: FlightParams) -> Self {
    self.flight_params = params;
    self
  }

  pub fn with_smoother(mut self, smoother: PathSmoother) -> Self {
    self.smoother = smoother;
    self
  }

  /// Dispatch one client message. Returns false once the client is gone.
  pub async fn handle(&self, message: ClientMessage) -> bool {
    match message {
      ClientMessage::Ping => self.send(ServerMessage::Pong).await,
      ClientMessage::GetScene => {
        self
          .send(ServerMessage::Scene {
            data: self.scene_info(),
          })
          .await
      }
      ClientMessage::GetWindField { downsample } => {
        self
          .send(ServerMessage::WindField {
            data: self.wind_field_info(downsample.unwrap_or(1)),
          })
          .await
      }
      ClientMessage::GetAll { downsample } => {
        self
          .send(ServerMessage::FullScene {
            data: FullSceneInfo {
              scene: self.scene_info(),
              wind_field: self.wind_field_info(downsample.unwrap_or(1)),
            },
          })
          .await
      }
      ClientMessage::Start {
        start,
        end,
        route_type,
      } => {
        let start = DVec3::from_array(start);
        let end = DVec3::from_array(end);
        self.run_routes(start, end, route_type).await
      }
    }
  }

  async fn send(&self, message: ServerMessage) -> bool {
    self.out.send(message).await.is_ok()
  }

  async fn send_error(&self, message: String) -> bool {
    warn!(error = %message, "session error");
    self
      .send(ServerMessage::Error { message })
      .await
  }

  fn scene_info(&self) -> SceneInfo {
    let scene = &self.scene;
    let (nx, ny, nz) = scene.grid.dims();
    SceneInfo {
      bounds: BoundsInfo {
        min: scene.config.bounds.min,
        max: scene.config.bounds.max,
      },
      grid_resolution: scene.config.grid_resolution,
      grid_dims: [nx, ny, nz],
      mesh_bounds: BoundsInfo {
        min: scene.mesh.bounds().min,
        max: scene.mesh.bounds().max,
      },
      triangle_count: scene.mesh.len(),
    }
  }

  fn wind_field_info(&self, downsample: usize) -> WindFieldInfo {
    let wind = &self.scene.wind;
    let stride = downsample.max(1);
    WindFieldInfo {
      bounds: BoundsInfo {
        min: wind.bounds().min,
        max: wind.bounds().max,
      },
      downsample: stride,
      points: wind.positions().iter().step_by(stride).copied().collect(),
      velocity: wind.velocities().iter().step_by(stride).copied().collect(),
      turbulence: wind.turbulence().iter().step_by(stride).copied().collect(),
    }
  }

  /// Route, smooth, and stream the requested flights.
  async fn run_routes(&self, start: DVec3, end: DVec3, route_type: RouteKind) -> bool {
    info!(
      start = ?start.to_array(),
      end = ?end.to_array(),
      route_type = ?route_type,
      "starting route session"
    );

    for (position, label) in [(start, "start"), (end, "end")] {
      if let Err(err) = self.scene.validate_position(position, label) {
        return self.send_error(err.to_string()).await;
      }
    }

    let scene = &self.scene;
    let mut paths = PathsInfo::default();
    let mut routes: Vec<(RouteLabel, Vec<DVec3>)> = Vec::new();

    if route_type.includes_naive() {
      let router = NaiveRouter::new(&scene.grid, &scene.valid_edges);
      let result = router.find_path(start, end, false);
      if !result.success {
        return self.send_error("no path found for naive route".into()).await;
      }
      let smoothed = self.smoother.smooth(&result.waypoints);
      paths.naive = Some(smoothed.clone());
      routes.push((RouteLabel::Naive, smoothed));
    }

    if route_type.includes_optimized() {
      let router = DijkstraRouter::new(&scene.grid, &scene.cost_table);
      let result = router.find_path(start, end, false);
      if !result.success {
        return self
          .send_error("no path found for optimized route".into())
          .await;
      }
      let smoothed = self.smoother.smooth(&result.waypoints);
      paths.optimized = Some(smoothed.clone());
      routes.push((RouteLabel::Optimized, smoothed));
    }

    if !self.send(ServerMessage::Paths { data: paths }).await {
      return false;
    }

    self.stream_flights(routes).await
  }

  /// Stream all flights with per-step interleaving.
  async fn stream_flights(&self, routes: Vec<(RouteLabel, Vec<DVec3>)>) -> bool {
    struct ActiveFlight<'a> {
      route: RouteLabel,
      sim: FlightSimulator<'a>,
      metrics: RouteMetrics,
      done: bool,
    }

    let metrics_calc = MetricsCalculator::new(&self.scene.wind);
    let mut flights: Vec<ActiveFlight<'_>> = routes
      .into_iter()
      .map(|(route, waypoints)| ActiveFlight {
        route,
        metrics: metrics_calc.calculate(&waypoints),
        sim: FlightSimulator::new(&self.scene.wind, self.flight_params, waypoints),
        done: false,
      })
      .collect();

    for flight in &flights {
      let started = self
        .send(ServerMessage::SimulationStart {
          route: flight.route,
          waypoint_count: flight.sim.waypoint_count(),
        })
        .await;
      if !started {
        return false;
      }
    }

    // Step every active flight once per tick so the client sees both routes
    // advance in lockstep.
    loop {
      for flight in &mut flights {
        if flight.done {
          continue;
        }
        match flight.sim.step() {
          StepOutcome::Frame(frame) => {
            let sent = self
              .send(ServerMessage::Frame {
                route: flight.route,
                data: *frame,
              })
              .await;
            if !sent {
              return false;
            }
          }
          StepOutcome::Reached | StepOutcome::Timeout => {
            flight.done = true;
            let summary = flight.sim.summary();
            info!(
              route = flight.route.as_str(),
              completed = summary.completed,
              frames = summary.frame_count,
              "simulation finished"
            );
            let sent = self
              .send(ServerMessage::SimulationEnd {
                route: flight.route,
                flight_summary: summary,
                metrics: flight.metrics.clone(),
              })
              .await;
            if !sent {
              return false;
            }
          }
        }
      }

      if flights.iter().all(|f| f.done) {
        break;
      }
      tokio::time::sleep(self.frame_delay).await;
    }

    let mut metrics = MetricsByRoute::default();
    for flight in &flights {
      metrics.insert(flight.route, flight.metrics.clone());
    }
    metrics.finalize_comparison();
    self.send(ServerMessage::Complete { metrics }).await
  }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
