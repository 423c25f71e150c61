//! Session message protocol.
//!
//! JSON objects tagged by `type`, matching what the visualization client
//! speaks. The core stays transport-agnostic: any loop that can decode
//! [`ClientMessage`] and deliver [`ServerMessage`] values in order can host a
//! session.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::metrics::{RouteComparison, RouteMetrics};
use crate::sim::{FlightFrame, FlightSummary};

/// Which route(s) a `start` request wants simulated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
  Naive,
  Optimized,
  #[default]
  Both,
}

impl RouteKind {
  pub fn includes_naive(self) -> bool {
    matches!(self, RouteKind::Naive | RouteKind::Both)
  }

  pub fn includes_optimized(self) -> bool {
    matches!(self, RouteKind::Optimized | RouteKind::Both)
  }
}

/// Label attached to per-route messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteLabel {
  Naive,
  Optimized,
}

impl RouteLabel {
  pub fn as_str(self) -> &'static str {
    match self {
      RouteLabel::Naive => "naive",
      RouteLabel::Optimized => "optimized",
    }
  }
}

/// Messages from the client.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
  /// Request scene geometry info.
  GetScene,
  /// Request the wind field samples, optionally decimated.
  GetWindField {
    #[serde(default)]
    downsample: Option<usize>,
  },
  /// Scene info and wind field in one response.
  GetAll {
    #[serde(default)]
    downsample: Option<usize>,
  },
  /// Route between two positions and stream the flights.
  Start {
    start: [f64; 3],
    end: [f64; 3],
    #[serde(default)]
    route_type: RouteKind,
  },
  Ping,
}

/// World-space min/max pair.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct BoundsInfo {
  pub min: DVec3,
  pub max: DVec3,
}

/// Scene geometry summary.
#[derive(Clone, Debug, Serialize)]
pub struct SceneInfo {
  pub bounds: BoundsInfo,
  pub grid_resolution: f64,
  pub grid_dims: [usize; 3],
  pub mesh_bounds: BoundsInfo,
  pub triangle_count: usize,
}

/// Wind field payload for streamline rendering.
#[derive(Clone, Debug, Serialize)]
pub struct WindFieldInfo {
  pub bounds: BoundsInfo,
  /// Every `downsample`-th sample was kept.
  pub downsample: usize,
  pub points: Vec<DVec3>,
  pub velocity: Vec<DVec3>,
  pub turbulence: Vec<f64>,
}

/// Combined scene + wind response.
#[derive(Clone, Debug, Serialize)]
pub struct FullSceneInfo {
  #[serde(flatten)]
  pub scene: SceneInfo,
  pub wind_field: WindFieldInfo,
}

/// Smoothed waypoint lists per requested route.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PathsInfo {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub naive: Option<Vec<DVec3>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub optimized: Option<Vec<DVec3>>,
}

/// Per-route metric pair for the final summary, with a head-to-head
/// comparison when both routes ran.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MetricsByRoute {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub naive: Option<RouteMetrics>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub optimized: Option<RouteMetrics>,
  /// Naive relative to optimized; ratios above 1 favor the wind-aware route.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub comparison: Option<RouteComparison>,
}

impl MetricsByRoute {
  pub fn insert(&mut self, route: RouteLabel, metrics: RouteMetrics) {
    match route {
      RouteLabel::Naive => self.naive = Some(metrics),
      RouteLabel::Optimized => self.optimized = Some(metrics),
    }
  }

  /// Fill in the comparison once both routes are present.
  pub fn finalize_comparison(&mut self) {
    if let (Some(naive), Some(optimized)) = (&self.naive, &self.optimized) {
      self.comparison = Some(RouteComparison::between(naive, optimized));
    }
  }
}

/// Messages to the client, in session order.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
  Scene {
    data: SceneInfo,
  },
  WindField {
    data: WindFieldInfo,
  },
  FullScene {
    data: FullSceneInfo,
  },
  Paths {
    data: PathsInfo,
  },
  SimulationStart {
    route: RouteLabel,
    waypoint_count: usize,
  },
  Frame {
    route: RouteLabel,
    data: FlightFrame,
  },
  SimulationEnd {
    route: RouteLabel,
    flight_summary: FlightSummary,
    metrics: RouteMetrics,
  },
  Complete {
    metrics: MetricsByRoute,
  },
  Error {
    message: String,
  },
  Pong,
}
