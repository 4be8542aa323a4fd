use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{
        HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
        },
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::{
    config::DeliveryMode,
    delivery,
    error::ApiError,
    metadata::VideoMetadata,
    request::{DownloadQuery, DownloadRequest, FetchInfoQuery, metadata_url},
    state::AppState,
};

#[derive(Debug, Serialize)]
struct InfoResponse {
    success: bool,
    data: VideoMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadUrlResponse {
    success: bool,
    download_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/fetch-info", get(fetch_info).options(preflight))
        .route("/api/download-mp3", get(download_mp3).options(preflight))
        .route("/api/download-url", get(download_url).options(preflight))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("Content-Disposition"),
        ))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| ApiError::validation(rejection.body_text()))
}

async fn fetch_info(
    State(state): State<AppState>,
    query: Result<Query<FetchInfoQuery>, QueryRejection>,
) -> Result<Json<InfoResponse>, ApiError> {
    let url = metadata_url(&parse_query(query)?)?;
    let span = info_span!("fetch_info", request_id = %Uuid::new_v4(), strategy = state.metadata.name());

    let data = state.metadata.resolve(&url).instrument(span).await?;
    Ok(Json(InfoResponse {
        success: true,
        data,
    }))
}

async fn download_mp3(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let request = DownloadRequest::from_query(&parse_query(query)?)?;

    match state.delivery_mode {
        DeliveryMode::Stream => {
            let span = info_span!(
                "download_mp3",
                request_id = %Uuid::new_v4(),
                video_id = %request.video_id,
                source = state.source.name()
            );
            delivery::stream_mp3(&state, request).instrument(span).await
        }
        DeliveryMode::Proxy => respond_with_url(&state, request).await,
    }
}

async fn download_url(
    State(state): State<AppState>,
    query: Result<Query<DownloadQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let request = DownloadRequest::from_query(&parse_query(query)?)?;
    respond_with_url(&state, request).await
}

async fn respond_with_url(state: &AppState, request: DownloadRequest) -> Result<Response, ApiError> {
    let span = info_span!(
        "download_url",
        request_id = %Uuid::new_v4(),
        video_id = %request.video_id,
        source = state.source.name()
    );
    let download_url = delivery::direct_url(state, &request.video_id)
        .instrument(span)
        .await?;

    Ok(Json(DownloadUrlResponse {
        success: true,
        download_url,
    })
    .into_response())
}
