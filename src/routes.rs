//! REST endpoints and the per-session event WebSocket.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Error, GateError};
use crate::intake::{Answer, FlowEvent, SessionHandle, SessionRegistry};
use crate::vehicles::VehicleDataProvider;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub provider: Arc<VehicleDataProvider>,
}

/// Build the Axum router for the quote flow.
pub fn quote_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/quote", post(start_quote))
        .route("/api/quote/{id}", get(get_quote))
        .route("/api/quote/{id}/answer", post(answer_step))
        .route("/api/quote/{id}/back", post(go_back))
        .route("/api/quote/{id}/vin", post(decode_vin))
        .route("/api/quote/{id}/answers", get(get_answers))
        .route("/api/quote/{id}/catalog/years", get(catalog_years))
        .route("/api/quote/{id}/catalog/{year}/makes", get(catalog_makes))
        .route(
            "/api/quote/{id}/catalog/{year}/{make}/models",
            get(catalog_models),
        )
        .route("/api/vehicles/models", get(live_models))
        .route("/ws/quote/{id}", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::SessionNotFound { .. } => StatusCode::NOT_FOUND,
        Error::Gate(GateError::InvalidZip { .. }) => StatusCode::BAD_REQUEST,
        Error::Gate(GateError::AlreadyStarted) => StatusCode::CONFLICT,
        Error::Engine(EngineError::InvalidState { .. } | EngineError::WrongStep { .. }) => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "Request failed");
    } else {
        debug!(error = %err, "Request rejected");
    }
    (status, Json(serde_json::json!({"error": err.to_string()}))).into_response()
}

async fn lookup(state: &AppState, id: &str) -> Result<SessionHandle, Response> {
    let id = Uuid::parse_str(id).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid session ID"})),
        )
            .into_response()
    })?;
    state.registry.get(id).await.map_err(error_response)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "quote-intake"
    }))
}

// ── Quote flow ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StartRequest {
    zip: String,
}

async fn start_quote(State(state): State<AppState>, Json(body): Json<StartRequest>) -> Response {
    match state.registry.start(&body.zip).await {
        Ok((_, view)) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_quote(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let handle = match lookup(&state, &id).await {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let view = handle.lock().await.view().await;
    Json(view).into_response()
}

async fn answer_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(answer): Json<Answer>,
) -> Response {
    let handle = match lookup(&state, &id).await {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let result = handle.lock().await.answer(answer).await;
    match result {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

async fn go_back(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let handle = match lookup(&state, &id).await {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let result = handle.lock().await.back().await;
    match result {
        Ok(view) => Json(view).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct VinRequest {
    vin: String,
}

async fn decode_vin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<VinRequest>,
) -> Response {
    let handle = match lookup(&state, &id).await {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    match crate::intake::QuoteSession::decode_vin(&handle, &body.vin).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_answers(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let handle = match lookup(&state, &id).await {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    let answers = handle.lock().await.answers().clone();
    Json(answers).into_response()
}

// ── Vehicle data ────────────────────────────────────────────────────────

async fn catalog_years(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if let Err(resp) = lookup(&state, &id).await {
        return resp;
    }
    Json(state.provider.catalog_years().await).into_response()
}

async fn catalog_makes(
    State(state): State<AppState>,
    Path((id, year)): Path<(String, String)>,
) -> Response {
    if let Err(resp) = lookup(&state, &id).await {
        return resp;
    }
    Json(state.provider.catalog_makes(&year).await).into_response()
}

async fn catalog_models(
    State(state): State<AppState>,
    Path((id, year, make)): Path<(String, String, String)>,
) -> Response {
    if let Err(resp) = lookup(&state, &id).await {
        return resp;
    }
    Json(state.provider.catalog_models(&year, &make).await).into_response()
}

#[derive(Deserialize)]
struct ModelsQuery {
    make: String,
    year: String,
}

async fn live_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> impl IntoResponse {
    Json(
        state
            .provider
            .models_for_make_year(&query.make, &query.year)
            .await,
    )
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let handle = match lookup(&state, &id).await {
        Ok(h) => h,
        Err(resp) => return resp,
    };
    info!(session_id = %id, "Event stream connecting");
    ws.on_upgrade(move |socket| handle_socket(socket, handle))
}

/// Current progress and prompt, sent on connect and after a lag.
async fn sync_events(handle: &SessionHandle) -> Vec<FlowEvent> {
    let session = handle.lock().await;
    let mut events = vec![FlowEvent::Progress {
        fraction: session.engine().progress(),
    }];
    if let Some(prompt) = session.prompt().await {
        events.push(FlowEvent::Prompt { prompt });
    }
    events
}

async fn send_event(socket: &mut WebSocket, event: &FlowEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Failed to serialize flow event");
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, handle: SessionHandle) {
    // Subscribe before the sync snapshot so nothing falls in between.
    let mut rx = handle.lock().await.subscribe();

    for event in sync_events(&handle).await {
        if !send_event(&mut socket, &event).await {
            warn!("Failed to send initial sync, client disconnected");
            return;
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Client disconnected during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        warn!(missed = n, "Event stream lagged behind session");
                        for event in sync_events(&handle).await {
                            if !send_event(&mut socket, &event).await {
                                return;
                            }
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("Session event channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Event stream client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("Event stream closed");
}
