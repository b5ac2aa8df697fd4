//! WebSocket upgrade + message loop. One simulation session lives and dies
//! with its socket: `start_shift` builds the engine, every command is
//! answered with a fresh session snapshot, and the close/teardown path
//! retires the active case.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{to_out, ClientWsMessage, ServerWsMessage};
use crate::session::SessionEngine;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!(target: "shiftsim_backend", "WebSocket upgrade requested");
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    info!(target: "shiftsim_backend", "WebSocket connected");
    let mut engine: Option<SessionEngine> = None;

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(txt) => {
                // Parse, dispatch, serialize response.
                let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
                    Ok(incoming) => {
                        debug!(target: "shiftsim_backend", "WS received: {:?}", &incoming);
                        handle_client_ws(incoming, &state, &mut engine).await
                    }
                    Err(e) => ServerWsMessage::Error {
                        message: format!("Invalid JSON: {}", e),
                    },
                };

                let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
                    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
                });

                if let Err(e) = socket.send(Message::Text(out)).await {
                    error!(target: "shiftsim_backend", error = %e, "WS send error");
                    break;
                }
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    if let Some(mut e) = engine {
        e.exit();
    }
    info!(target: "shiftsim_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, engine))]
async fn handle_client_ws(
    msg: ClientWsMessage,
    state: &Arc<AppState>,
    engine: &mut Option<SessionEngine>,
) -> ServerWsMessage {
    match msg {
        ClientWsMessage::Ping => ServerWsMessage::Pong,

        ClientWsMessage::StartShift { category } => {
            // A second start on the same socket replaces the session.
            if let Some(mut old) = engine.take() {
                old.exit();
            }
            let category = category.unwrap_or_else(|| state.default_category.clone());
            info!(target: "session", %category, "WS start_shift");
            let mut e = SessionEngine::new(
                state.supplier.clone(),
                category,
                state.pricing.clone(),
            );
            e.start().await;
            let reply = session_reply(&e);
            *engine = Some(e);
            reply
        }

        ClientWsMessage::SelectTab { tab } => with_engine(engine, |e| {
            e.select_tab(tab);
        }),

        ClientWsMessage::AskQuestion { index } => with_engine(engine, |e| {
            e.ask_question(index);
        }),

        ClientWsMessage::OrderExam { key } => with_engine(engine, |e| {
            e.order_exam(&key);
        }),

        ClientWsMessage::SubmitDiagnosis { option } => with_engine(engine, |e| {
            e.submit_diagnosis(&option);
        }),

        ClientWsMessage::NextCase | ClientWsMessage::SkipCase => match engine.as_mut() {
            Some(e) => {
                e.advance().await;
                session_reply(e)
            }
            None => no_session(),
        },

        ClientWsMessage::Restart => match engine.as_mut() {
            Some(e) => {
                e.restart().await;
                session_reply(e)
            }
            None => no_session(),
        },
    }
}

fn with_engine(
    engine: &mut Option<SessionEngine>,
    f: impl FnOnce(&mut SessionEngine),
) -> ServerWsMessage {
    match engine.as_mut() {
        Some(e) => {
            f(e);
            session_reply(e)
        }
        None => no_session(),
    }
}

fn session_reply(engine: &SessionEngine) -> ServerWsMessage {
    ServerWsMessage::Session {
        session: to_out(engine.snapshot()),
    }
}

fn no_session() -> ServerWsMessage {
    ServerWsMessage::Error {
        message: "No active session: send start_shift first.".into(),
    }
}
