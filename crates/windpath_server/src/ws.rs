//! WebSocket transport for sessions.
//!
//! Each connection gets its own [`Session`] on a dedicated task. The socket
//! splits into a writer task draining the session's outbound channel and a
//! read loop forwarding decoded client messages in. A disconnect tears both
//! down, which cancels any in-flight simulation at its next suspension
//! point.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use windpath_core::protocol::{ClientMessage, ServerMessage};
use windpath_core::scene::Scene;
use windpath_core::session::Session;
use windpath_core::sim::FlightParams;

/// Shared server state handed to every connection.
#[derive(Clone)]
pub struct AppState {
  pub scene: Arc<Scene>,
  pub flight_params: FlightParams,
  pub frame_delay: Duration,
}

/// `GET /ws` upgrade endpoint.
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
  ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
  info!("client connected");
  let (mut sink, mut stream) = socket.split();

  // Outbound: session -> writer task -> socket.
  // Inbound: read loop -> session task.
  let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(256);
  let (in_tx, mut in_rx) = mpsc::channel::<ClientMessage>(32);
  // Spare sender for protocol-level errors raised by the read loop itself
  let error_tx = out_tx.clone();

  let session = Session::new(state.scene.clone(), out_tx)
    .with_flight_params(state.flight_params)
    .with_frame_delay(state.frame_delay);
  let session_task = tokio::spawn(async move {
    while let Some(message) = in_rx.recv().await {
      if !session.handle(message).await {
        break;
      }
    }
  });

  let writer_task = tokio::spawn(async move {
    while let Some(message) = out_rx.recv().await {
      let text = match serde_json::to_string(&message) {
        Ok(text) => text,
        Err(err) => {
          warn!(error = %err, "failed to encode server message");
          continue;
        }
      };
      if sink.send(Message::Text(text)).await.is_err() {
        break;
      }
    }
  });

  while let Some(received) = stream.next().await {
    match received {
      Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
        Ok(message) => {
          if in_tx.send(message).await.is_err() {
            break;
          }
        }
        Err(err) => {
          debug!(error = %err, "undecodable client message");
          let reply = ServerMessage::Error {
            message: format!("invalid message: {err}"),
          };
          if error_tx.send(reply).await.is_err() {
            break;
          }
        }
      },
      Ok(Message::Close(_)) => break,
      Ok(_) => {} // ignore pings/pongs/binary
      Err(err) => {
        debug!(error = %err, "socket error");
        break;
      }
    }
  }

  // Cancel any in-flight simulation at the next step boundary.
  session_task.abort();
  drop(error_tx);
  writer_task.abort();
  info!("client disconnected");
}
