//! Request handlers

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Uri};
use axum::response::{IntoResponse, Json, Response};
use tracing::{debug, warn};

use cyrkensia_core::{catalog, meta, paths, AuthOutcome, Error, HostInfo};

use crate::delivery;
use crate::response::{redirect, ApiError};
use crate::server::AppState;

const FAVICON: &str = "favicon.ico";

/// `GET /` and `GET /hostinfo`
pub async fn hostinfo(State(state): State<AppState>, headers: HeaderMap, uri: Uri) -> Result<Response, ApiError> {
    let root = state.config.root.clone();
    let snapshot = tokio::task::spawn_blocking(move || catalog::build(&root)).await?;
    if !snapshot.issues.is_empty() {
        warn!("{} album(s) skipped while building the catalog", snapshot.issues.len());
    }

    let origin = origin_uri(&state, &headers, &uri);
    let info = HostInfo::compose(&state.config, snapshot, origin);
    let body = serde_json::to_vec(&info).map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_LENGTH, HeaderValue::from(body.len())),
        ],
        body,
    )
        .into_response())
}

/// Absolute URL of this request, without the query string
fn origin_uri(state: &AppState, headers: &HeaderMap, uri: &Uri) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| state.config.listen_addr());
    format!("{}://{}{}", state.scheme(), host, uri.path())
}

/// `GET /{route}`: reserved names first, then directory listing.
/// `/hostinfo` has its own route and never reaches this handler.
pub async fn route(
    State(state): State<AppState>,
    Path(route): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    match route.as_str() {
        FAVICON => {
            let root = state.config.root.clone();
            let path = tokio::task::spawn_blocking(move || paths::resolve_named(&root, FAVICON)).await??;
            delivery::send_file(&path, &headers).await
        }
        "source" | "repository" => Ok(redirect(meta::REPOSITORY)),
        "license" => Ok(redirect(meta::LICENSE_URL)),
        _ => list_directory(&state, route).await,
    }
}

async fn list_directory(state: &AppState, directory: String) -> Result<Response, ApiError> {
    let root = state.config.root.clone();
    let files = tokio::task::spawn_blocking(move || {
        let dir = paths::resolve_dir(&root, &directory)?;
        let root = root.canonicalize()?;
        catalog::list_files(&root, &dir).map(|(files, _)| files)
    })
    .await??;
    Ok(Json(files).into_response())
}

/// `GET /{directory}/{file}`
pub async fn file(
    State(state): State<AppState>,
    Path((directory, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(store) = state.credentials.clone() {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        // bcrypt verification is CPU-bound
        let outcome = tokio::task::spawn_blocking(move || store.authenticate(authorization.as_deref())).await?;
        match outcome {
            AuthOutcome::Allowed { user } => debug!("Authenticated {} for {}/{}", user, directory, file),
            AuthOutcome::Denied => {
                debug!("Denied {}/{}", directory, file);
                return Err(Error::AuthDenied.into());
            }
        }
    }

    // canonicalize() stats every component
    let root = state.config.root.clone();
    let path = tokio::task::spawn_blocking(move || paths::resolve(&root, &directory, &file)).await??;
    delivery::send_file(&path, &headers).await
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
