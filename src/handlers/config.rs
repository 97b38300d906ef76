//! Configuration echo endpoint.
//!
//! `GET /api/config` tells the browser client whether the server holds a
//! default API key, so the UI can skip prompting for one. The response
//! carries no secret material and is explicitly safe to expose
//! cross-origin.

use axum::Json;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::config::ServerConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub has_default_api_key: bool,
}

/// Report whether a default upstream credential is configured.
pub fn config_status(config: &ServerConfig) -> Response {
    let status = ConfigStatus {
        has_default_api_key: config.has_default_api_key(),
    };
    (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(status),
    )
        .into_response()
}
