//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::logic::*;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "devforge_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "devforge_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let out = reply_to_text(&txt, &state);
        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "devforge_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "devforge_backend", "WebSocket disconnected");
}

/// Parse, dispatch, serialize response.
fn reply_to_text(txt: &str, state: &AppState) -> String {
  let reply_msg = match serde_json::from_str::<ClientWsMessage>(txt) {
    Ok(incoming) => {
      debug!(target: "devforge_backend", kind = incoming_kind(&incoming), "WS received");
      handle_client_ws(incoming, state)
    }
    Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
  };

  serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  })
}

fn incoming_kind(msg: &ClientWsMessage) -> &'static str {
  match msg {
    ClientWsMessage::Ping => "ping",
    ClientWsMessage::Execute(_) => "execute",
    ClientWsMessage::Submit(_) => "submit",
  }
}

fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Execute(body) => match execute_submission(state, body) {
      Ok(result) => ServerWsMessage::Evaluation { result },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::Submit(body) => match submit_submission(state, body) {
      Ok(report) => ServerWsMessage::Submission { report },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },
  }
}
