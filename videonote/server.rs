//! Loopback HTTP bridge that makes local files loadable by the player.
//!
//! Paths travel in the `path` query parameter, percent-encoded. A request is
//! only served when its query is exactly the canonical encoding of a path that
//! [`local_video_redirect`] or [`subtitle_redirect`] handed out earlier in this
//! process, for that same endpoint. The decoded text must match the issued path
//! byte for byte, so `/a/./b` or `/a//b` never stand in for `/a/b`.

use crate::error::App;
use axum::body::Body;
use axum::extract::{RawQuery, Request};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{error, info, warn};
use std::collections::HashSet;
use std::io;
use std::net::Ipv4Addr;
use std::path::{Component, Path, PathBuf};
use std::sync::{LazyLock, PoisonError, RwLock};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::services::ServeFile;

pub const VIDEO_ENDPOINT: &str = "/video";
pub const SUBTITLE_ENDPOINT: &str = "/subtitle";

pub fn local_video_redirect(port: u16, path: &str) -> String {
    redirect(port, VIDEO_ENDPOINT, path)
}

pub fn subtitle_redirect(port: u16, path: &str) -> String {
    redirect(port, SUBTITLE_ENDPOINT, path)
}

/// `(endpoint, path)` pairs handed out by the redirect functions.
static ISSUED: LazyLock<RwLock<HashSet<(&'static str, String)>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

fn redirect(port: u16, endpoint: &'static str, path: &str) -> String {
    ISSUED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert((endpoint, path.to_string()));
    format!(
        "http://127.0.0.1:{port}{endpoint}?path={}",
        urlencoding::encode(path)
    )
}

fn is_issued(endpoint: &'static str, path: &str) -> bool {
    ISSUED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&(endpoint, path.to_string()))
}

/// Recovers the file path from a request query, or `None` when the query is
/// not a canonical encoding of an absolute path.
pub fn decode_path_query(query: Option<&str>) -> Option<PathBuf> {
    let encoded = query?.strip_prefix("path=")?;
    if encoded.is_empty() || encoded.contains('&') {
        return None;
    }
    let decoded = urlencoding::decode(encoded).ok()?;
    if urlencoding::encode(&decoded) != encoded {
        return None;
    }
    let path = Path::new(decoded.as_ref());
    let normalized = path.is_absolute()
        && path
            .components()
            .all(|c| matches!(c, Component::Prefix(_) | Component::RootDir | Component::Normal(_)));
    normalized.then(|| path.to_path_buf())
}

pub fn routes() -> Router {
    Router::new()
        .route(VIDEO_ENDPOINT, get(serve_video))
        .route(SUBTITLE_ENDPOINT, get(serve_subtitle))
}

async fn serve_video(RawQuery(query): RawQuery, request: Request) -> Response {
    let path = match checked_file(VIDEO_ENDPOINT, query.as_deref()).await {
        Ok(path) => path,
        Err(status) => return status.into_response(),
    };
    match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

async fn serve_subtitle(RawQuery(query): RawQuery) -> Response {
    let path = match checked_file(SUBTITLE_ENDPOINT, query.as_deref()).await {
        Ok(path) => path,
        Err(status) => return status.into_response(),
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, subtitle_mime(&path))], bytes).into_response(),
        Err(e) => {
            let e = App::FileAccess(format!("{}: {e}", path.display()));
            error!("{e}");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn checked_file(
    endpoint: &'static str,
    query: Option<&str>,
) -> Result<PathBuf, StatusCode> {
    let Some(path) = decode_path_query(query)
        .filter(|path| path.to_str().is_some_and(|p| is_issued(endpoint, p)))
    else {
        warn!("Rejected {endpoint} request with query {query:?}");
        return Err(StatusCode::NOT_FOUND);
    };
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => Ok(path),
        Ok(_) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!("{}", App::FileAccess(format!("{}: {e}", path.display())));
            Err(match e.kind() {
                io::ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                _ => StatusCode::NOT_FOUND,
            })
        }
    }
}

fn subtitle_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("vtt") => "text/vtt; charset=utf-8",
        Some(ext) if ext.eq_ignore_ascii_case("srt") => "application/x-subrip; charset=utf-8",
        _ => "text/plain; charset=utf-8",
    }
}

#[derive(Debug)]
pub struct MediaServer {
    port: u16,
    stop_signal: watch::Sender<()>,
    handle: JoinHandle<()>,
}

impl MediaServer {
    /// Binds `127.0.0.1:preferred_port`, falling back once to an ephemeral
    /// port when that fails.
    pub async fn start(preferred_port: u16) -> Result<Self, App> {
        let listener = match TcpListener::bind((Ipv4Addr::LOCALHOST, preferred_port)).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!("Port {preferred_port} unavailable ({e}), retrying on an ephemeral port");
                TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
                    .await
                    .map_err(|e| App::ServerBind(e.to_string()))?
            }
        };
        let port = listener
            .local_addr()
            .map_err(|e| App::ServerBind(e.to_string()))?
            .port();

        let (stop_signal, mut stop_receiver) = watch::channel(());
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = stop_receiver.changed().await;
            };
            if let Err(e) = axum::serve(listener, routes())
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Local media server stopped: {e}");
            }
        });

        info!("Local media server listening on http://127.0.0.1:{port}");
        Ok(Self {
            port,
            stop_signal,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn video_url(&self, path: &str) -> String {
        local_video_redirect(self.port, path)
    }

    pub fn subtitle_url(&self, path: &str) -> String {
        subtitle_redirect(self.port, path)
    }

    pub async fn shutdown(self) {
        let _ = self.stop_signal.send(());
        if let Err(e) = self.handle.await {
            error!("Local media server task failed: {e}");
        }
    }
}

static SERVER: LazyLock<Mutex<Option<MediaServer>>> = LazyLock::new(|| Mutex::new(None));

/// Starts the process-wide server unless one is already listening, and returns
/// its port.
pub async fn ensure_started(preferred_port: u16) -> Result<u16, App> {
    let mut server = SERVER.lock().await;
    if let Some(running) = server.as_ref() {
        return Ok(running.port());
    }
    let started = MediaServer::start(preferred_port).await?;
    let port = started.port();
    *server = Some(started);
    Ok(port)
}

pub async fn stop() {
    if let Some(server) = SERVER.lock().await.take() {
        server.shutdown().await;
    }
}
