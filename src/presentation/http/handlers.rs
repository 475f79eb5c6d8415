//! Request handlers

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;

use super::error::ApiResult;
use crate::application::use_cases::{TriggerRequest, UpdateCoordinator};
use crate::common::error::MgrError;

/// Header carrying the shared secret
pub const SECRET_TOKEN_HEADER: &str = "x-secret-token";

/// Body of a successful update response
pub const UPDATE_ACCEPTED: &str = "update applied; restart scheduled";

/// GET /healthz
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// POST /update
///
/// Runs the synchronous stages and answers once the restart is scheduled.
/// The pipeline runs on its own task so a client disconnect cannot cancel
/// it halfway and release the sync lock early.
pub async fn update(
    State(coordinator): State<Arc<UpdateCoordinator>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> ApiResult<&'static str> {
    let credential = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut request = TriggerRequest::new(credential);
    if let Some(ConnectInfo(addr)) = connect_info {
        request = request.with_origin(addr.ip().to_string());
    }

    let pipeline = tokio::spawn(async move { coordinator.trigger(request).await });
    let accepted = pipeline.await.map_err(MgrError::from)??;
    accepted.restart.detach();

    Ok(UPDATE_ACCEPTED)
}
