//! HTTP server: router, shared state and listener

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::Request;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{info, info_span, warn, Level};

use cyrkensia_core::{meta, CredentialStore, ServerConfig};

use crate::routes;

const X_LICENSE: HeaderName = HeaderName::from_static("x-license");
const X_LICENSE_SPDX: HeaderName = HeaderName::from_static("x-license-spdx");
const X_LICENSE_URL: HeaderName = HeaderName::from_static("x-license-url");
const X_SOURCE_CODE: HeaderName = HeaderName::from_static("x-source-code");
const X_AUTHORS: HeaderName = HeaderName::from_static("x-authors");

/// State shared by every handler. Immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// `Some` in gated mode
    pub credentials: Option<Arc<CredentialStore>>,
}

impl AppState {
    pub fn new(config: ServerConfig, credentials: Option<CredentialStore>) -> Self {
        Self {
            config: Arc::new(config),
            credentials: credentials.map(Arc::new),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.config.tls.is_some() {
            "https"
        } else {
            "http"
        }
    }
}

/// Build the router with all routes and layers
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::hostinfo))
        .route("/hostinfo", get(routes::hostinfo))
        .route("/{route}", get(routes::route))
        .route("/{directory}/{file}", get(routes::file))
        .fallback(routes::not_found)
        .layer(middleware::from_fn(attach_headers))
        .layer(cors_layer())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    info_span!("request", method = %request.method(), path = %request.uri().path())
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Server, license and source headers on every response
async fn attach_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(header::SERVER, HeaderValue::from_static(meta::USERAGENT));
    headers.insert(X_LICENSE, HeaderValue::from_static(meta::LICENSE_RICH));
    headers.insert(X_LICENSE_SPDX, HeaderValue::from_static(meta::LICENSE));
    headers.insert(X_LICENSE_URL, HeaderValue::from_static(meta::LICENSE_URL));
    headers.insert(X_SOURCE_CODE, HeaderValue::from_static(meta::REPOSITORY));
    if let Ok(authors) = HeaderValue::from_str(&meta::AUTHORS.replace(':', ", ")) {
        headers.insert(X_AUTHORS, authors);
    }
    response
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::RANGE, header::IF_RANGE, header::IF_MODIFIED_SINCE])
        .expose_headers([header::CONTENT_LENGTH, header::CONTENT_RANGE, header::WWW_AUTHENTICATE])
        .max_age(Duration::from_secs(86400))
}

/// Bind and serve until SIGINT/SIGTERM
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen = state.config.listen_addr();
    let addr: SocketAddr = tokio::net::lookup_host(&listen)
        .await
        .with_context(|| format!("Failed to resolve bind address {}", listen))?
        .next()
        .with_context(|| format!("No usable address for {}", listen))?;

    let tls = state.config.tls.clone();
    let app = router(state);

    match tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .with_context(|| format!("Failed to load TLS certificate {:?} / key {:?}", tls.cert, tls.key))?;
            let handle = Handle::new();
            tokio::spawn(graceful(handle.clone()));

            info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")?;
        }
        None => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;

            info!("Listening on http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
        }
    }

    info!("Server stopped");
    Ok(())
}

async fn graceful(handle: Handle) {
    shutdown_signal().await;
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
