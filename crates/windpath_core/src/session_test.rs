use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use tokio::sync::mpsc;

use super::*;
use crate::math::Aabb;
use crate::mesh::box_triangles;
use crate::scene::{Scene, SceneConfig};
use crate::wind::WindField;

fn test_scene(triangles: Vec<crate::mesh::Triangle>) -> Arc<Scene> {
  let config = SceneConfig {
    bounds: Aabb::new(DVec3::ZERO, DVec3::splat(100.0)),
    ..SceneConfig::default()
  };
  let wind = WindField::new(
    vec![DVec3::new(0.0, 50.0, 0.0), DVec3::new(100.0, 50.0, 0.0)],
    vec![DVec3::new(8.0, 0.0, 3.0), DVec3::new(8.0, 0.0, 3.0)],
    None,
  )
  .unwrap();
  Arc::new(Scene::build(config, triangles, wind).unwrap())
}

fn test_session(scene: Arc<Scene>) -> (Session, mpsc::Receiver<ServerMessage>) {
  let (tx, rx) = mpsc::channel(16384);
  let session = Session::new(scene, tx).with_frame_delay(Duration::ZERO);
  (session, rx)
}

async fn drain(mut rx: mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
  let mut out = Vec::new();
  while let Some(msg) = rx.recv().await {
    out.push(msg);
  }
  out
}

#[tokio::test]
async fn ping_gets_pong() {
  let (session, mut rx) = test_session(test_scene(Vec::new()));
  assert!(session.handle(ClientMessage::Ping).await);
  assert!(matches!(rx.recv().await, Some(ServerMessage::Pong)));
}

#[tokio::test]
async fn scene_query_reports_bounds_and_grid() {
  let (session, mut rx) = test_session(test_scene(Vec::new()));
  session.handle(ClientMessage::GetScene).await;

  match rx.recv().await {
    Some(ServerMessage::Scene { data }) => {
      assert_eq!(data.bounds.min, DVec3::ZERO);
      assert_eq!(data.bounds.max, DVec3::splat(100.0));
      assert_eq!(data.grid_dims, [11, 11, 11]);
      assert_eq!(data.triangle_count, 0);
    }
    other => panic!("unexpected message: {other:?}"),
  }
}

#[tokio::test]
async fn wind_field_query_supports_downsampling() {
  let (session, mut rx) = test_session(test_scene(Vec::new()));
  session
    .handle(ClientMessage::GetWindField {
      downsample: Some(2),
    })
    .await;

  match rx.recv().await {
    Some(ServerMessage::WindField { data }) => {
      assert_eq!(data.downsample, 2);
      assert_eq!(data.points.len(), 1);
      assert_eq!(data.velocity.len(), 1);
    }
    other => panic!("unexpected message: {other:?}"),
  }
}

#[tokio::test]
async fn invalid_start_yields_error_and_no_frames() {
  let triangles = box_triangles(DVec3::new(40.0, 0.0, 40.0), DVec3::new(60.0, 40.0, 60.0));
  let (session, rx) = test_session(test_scene(triangles));

  // Inside the building
  session
    .handle(ClientMessage::Start {
      start: [50.0, 20.0, 50.0],
      end: [90.0, 20.0, 50.0],
      route_type: RouteKind::Both,
    })
    .await;
  drop(session);

  let messages = drain(rx).await;
  assert_eq!(messages.len(), 1);
  assert!(matches!(messages[0], ServerMessage::Error { .. }));
}

#[tokio::test]
async fn out_of_bounds_start_is_rejected() {
  let (session, rx) = test_session(test_scene(Vec::new()));
  session
    .handle(ClientMessage::Start {
      start: [-20.0, 50.0, 50.0],
      end: [90.0, 50.0, 50.0],
      route_type: RouteKind::Naive,
    })
    .await;
  drop(session);

  let messages = drain(rx).await;
  assert_eq!(messages.len(), 1);
  match &messages[0] {
    ServerMessage::Error { message } => assert!(message.contains("outside")),
    other => panic!("unexpected message: {other:?}"),
  }
}

#[tokio::test]
async fn both_routes_stream_in_order_and_interleaved() {
  let (session, rx) = test_session(test_scene(Vec::new()));
  session
    .handle(ClientMessage::Start {
      start: [5.0, 50.0, 5.0],
      end: [95.0, 50.0, 95.0],
      route_type: RouteKind::Both,
    })
    .await;
  drop(session);

  let messages = drain(rx).await;
  assert!(matches!(messages.first(), Some(ServerMessage::Paths { .. })));
  match messages.last() {
    Some(ServerMessage::Complete { metrics }) => {
      // Both routes ran, so the summary carries a head-to-head comparison
      let comparison = metrics.comparison.as_ref().expect("comparison present");
      assert!(comparison.distance_ratio > 0.0);
    }
    other => panic!("unexpected final message: {other:?}"),
  }

  // paths -> simulation_start x2 -> frames -> simulation_end x2 -> complete
  let first_frame = messages
    .iter()
    .position(|m| matches!(m, ServerMessage::Frame { .. }))
    .expect("frames streamed");
  let starts: Vec<usize> = messages
    .iter()
    .enumerate()
    .filter(|(_, m)| matches!(m, ServerMessage::SimulationStart { .. }))
    .map(|(i, _)| i)
    .collect();
  assert_eq!(starts.len(), 2);
  assert!(starts.iter().all(|&i| i < first_frame));

  // Frames interleave per step while both routes are active
  let mut naive_count = 0usize;
  let mut optimized_count = 0usize;
  let mut naive_done = false;
  let mut optimized_done = false;
  for msg in &messages {
    match msg {
      ServerMessage::Frame { route, .. } => {
        match route {
          RouteLabel::Naive => naive_count += 1,
          RouteLabel::Optimized => optimized_count += 1,
        }
        if !naive_done && !optimized_done {
          assert!(naive_count.abs_diff(optimized_count) <= 1, "frames raced");
        }
      }
      ServerMessage::SimulationEnd { route, .. } => match route {
        RouteLabel::Naive => naive_done = true,
        RouteLabel::Optimized => optimized_done = true,
      },
      _ => {}
    }
  }
  assert!(naive_done && optimized_done);
  assert!(naive_count > 0 && optimized_count > 0);

  // Per-route frame times are monotone with a fixed step
  for wanted in [RouteLabel::Naive, RouteLabel::Optimized] {
    let times: Vec<f64> = messages
      .iter()
      .filter_map(|m| match m {
        ServerMessage::Frame { route, data } if *route == wanted => Some(data.time),
        _ => None,
      })
      .collect();
    for pair in times.windows(2) {
      assert!((pair[1] - pair[0] - 0.1).abs() < 1e-9);
    }
  }
}

#[tokio::test]
async fn single_route_request_streams_only_that_route() {
  let (session, rx) = test_session(test_scene(Vec::new()));
  session
    .handle(ClientMessage::Start {
      start: [5.0, 50.0, 5.0],
      end: [95.0, 50.0, 5.0],
      route_type: RouteKind::Optimized,
    })
    .await;
  drop(session);

  let messages = drain(rx).await;
  match &messages[0] {
    ServerMessage::Paths { data } => {
      assert!(data.naive.is_none());
      assert!(data.optimized.is_some());
    }
    other => panic!("unexpected message: {other:?}"),
  }
  assert!(messages.iter().all(|m| !matches!(
    m,
    ServerMessage::Frame {
      route: RouteLabel::Naive,
      ..
    }
  )));
  match messages.last() {
    Some(ServerMessage::Complete { metrics }) => {
      assert!(metrics.naive.is_none());
      assert!(metrics.optimized.is_some());
      // No second route, nothing to compare against
      assert!(metrics.comparison.is_none());
    }
    other => panic!("unexpected message: {other:?}"),
  }
}

#[tokio::test]
async fn dropped_receiver_cancels_session() {
  let (session, rx) = test_session(test_scene(Vec::new()));
  drop(rx);
  // Sends fail, handle reports the session as closed instead of panicking
  assert!(!session.handle(ClientMessage::Ping).await);
  assert!(
    !session
      .handle(ClientMessage::Start {
        start: [5.0, 50.0, 5.0],
        end: [95.0, 50.0, 95.0],
        route_type: RouteKind::Both,
      })
      .await
  );
}
