//! Network front end.
//!
//! Accepts HTTP connections, extracts the query, runs it through the shared
//! [`QueryPipeline`], and writes the JSON envelope back.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            accept loop (tokio multi-thread)              │
//! └─────────┬───────────────────┬───────────────────┬────────┘
//!           ▼                   ▼                   ▼
//!     connection task     connection task     connection task
//!           │                   │                   │
//!           └───────── spawn_blocking(execute) ─────┘
//!                               │
//!                    one scan at a time (Workspace)
//! ```
//!
//! Routes:
//!
//! - `GET|POST /match?q=<query>` (or `q=` in a url-encoded body)
//! - `GET /match/<query>`
//! - `GET /stats`

pub mod http;
pub mod response;

pub use self::http::{HttpRequest, HttpResponse, ParseStatus, StatusCode};
pub use self::response::MatchResponse;

use crate::engine::MatchEngine;
use crate::error::Result;
use crate::pipeline::{QueryPipeline, QueryResult};
use chrono::{DateTime, Local, SecondsFormat};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The HTTP service wrapping one shared pipeline.
pub struct ServiceFront<E: MatchEngine + 'static> {
    pipeline: Arc<QueryPipeline<E>>,
    started_at: DateTime<Local>,
}

impl<E: MatchEngine + 'static> ServiceFront<E> {
    pub fn new(pipeline: Arc<QueryPipeline<E>>) -> Self {
        Self {
            pipeline,
            started_at: Local::now(),
        }
    }

    pub fn pipeline(&self) -> &Arc<QueryPipeline<E>> {
        &self.pipeline
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        info!(
            "[{}] ladon {} running on {}",
            self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            VERSION,
            addr
        );

        tokio::pin!(shutdown);
        loop {
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(connection) => connection,
                    Err(e) => {
                        warn!(error = %e, "Accept error");
                        continue;
                    }
                },
            };

            let service = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = service.handle_connection(stream, peer).await {
                    debug!(remote_addr = %peer, error = %e, "Connection error");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let mut buf = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        let request = loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buf.extend_from_slice(&chunk[..n]);

            match HttpRequest::parse(&buf) {
                ParseStatus::Complete(request) => break request,
                ParseStatus::Invalid(reason) => {
                    let response = HttpResponse::text(StatusCode::BadRequest, reason);
                    stream.write_all(&response.to_bytes()).await?;
                    return Ok(());
                }
                ParseStatus::TooLarge => {
                    let response =
                        HttpResponse::text(StatusCode::PayloadTooLarge, "request too large");
                    stream.write_all(&response.to_bytes()).await?;
                    return Ok(());
                }
                ParseStatus::Partial if buf.len() > http::MAX_REQUEST_BYTES => {
                    let response =
                        HttpResponse::text(StatusCode::PayloadTooLarge, "request too large");
                    stream.write_all(&response.to_bytes()).await?;
                    return Ok(());
                }
                ParseStatus::Partial => {}
            }
        };

        let start = Instant::now();
        let response = self.respond(&request).await;
        stream.write_all(&response.to_bytes()).await?;
        stream.shutdown().await?;

        info!(
            remote_addr = %peer.ip(),
            latency = ?start.elapsed(),
            content_length = request.content_length(),
            status = response.status as u16,
            "{} {}",
            request.method,
            request_uri(&request)
        );
        Ok(())
    }

    /// Route one request to its handler.
    pub async fn respond(&self, request: &HttpRequest) -> HttpResponse {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET" | "POST", "/match") => {
                let query = request.form_value("q").unwrap_or_default();
                self.match_query(query).await
            }
            ("GET", path) if path.starts_with("/match/") => {
                let query = http::decode_component(path["/match/".len()..].as_bytes());
                self.match_query(query).await
            }
            ("GET", "/stats") => self.stats(),
            _ => HttpResponse::not_found(),
        }
    }

    async fn match_query(&self, query: Vec<u8>) -> HttpResponse {
        let pipeline = Arc::clone(&self.pipeline);
        let result = tokio::task::spawn_blocking(move || pipeline.execute(&query))
            .await
            .unwrap_or_else(|e| QueryResult::scan_error(format!("scan task failed: {e}")));

        HttpResponse::json(MatchResponse::from(result).to_json())
    }

    fn stats(&self) -> HttpResponse {
        HttpResponse::text(
            StatusCode::Ok,
            format!(
                "ladon {}, Uptime {}",
                VERSION,
                self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        )
    }
}

fn request_uri(request: &HttpRequest) -> String {
    match &request.query {
        Some(query) => format!("{}?{}", request.path, query),
        None => request.path.clone(),
    }
}
