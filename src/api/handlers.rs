//! Request handlers for the API endpoints.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::debug;

use super::AppState;
use super::types::ErrorResponse;
use crate::protocol::{
    BatStatus, EmStatus, EsMode, EsStatus, PvStatus, SetModeResult, WifiStatus, parse_set_mode,
};
use crate::sim::types::Snapshot;

/// `GET /state` → 200 + full `Snapshot` JSON
pub async fn get_state(State(sim): State<AppState>) -> Json<Snapshot> {
    Json(sim.get_state())
}

pub async fn get_es_status(State(sim): State<AppState>) -> Json<EsStatus> {
    Json(EsStatus::from(&sim.get_state()))
}

pub async fn get_es_mode(State(sim): State<AppState>) -> Json<EsMode> {
    Json(EsMode::from(&sim.get_state()))
}

pub async fn get_em_status(State(sim): State<AppState>) -> Json<EmStatus> {
    Json(EmStatus::from(&sim.get_state()))
}

pub async fn get_bat_status(State(sim): State<AppState>) -> Json<BatStatus> {
    Json(BatStatus::from(&sim.get_state()))
}

pub async fn get_pv_status(State(sim): State<AppState>) -> Json<PvStatus> {
    Json(PvStatus::from(&sim.get_state()))
}

pub async fn get_wifi_status(State(sim): State<AppState>) -> Json<WifiStatus> {
    Json(WifiStatus::from(&sim.get_state()))
}

/// Applies an `ES.SetMode` config object.
///
/// `POST /es/mode` → 200 + `SetModeResult`
/// malformed JSON or a rejected config → 400 + `ErrorResponse`
pub async fn post_es_mode(
    State(sim): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Json(config) = match body {
        Ok(body) => body,
        Err(rejection) => return ErrorResponse::bad_request(rejection.body_text()),
    };

    let applied = parse_set_mode(&config)
        .map_err(ErrorResponse::from)
        .and_then(|mode| sim.set_mode(mode).map_err(ErrorResponse::from));

    match applied {
        Ok(()) => Json(SetModeResult::ok()).into_response(),
        Err(e) => {
            debug!(error = %e.error, "ES.SetMode rejected");
            e.into_response()
        }
    }
}
