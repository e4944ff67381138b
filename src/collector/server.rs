//! Collector HTTP endpoint
//!
//! - `POST /` - one node transmission (JSON); 200 on success, 400 on a
//!   malformed body, 404 for an unknown location
//! - `GET /`, `GET /state` - current occupancy per location (JSON)
//! - `GET /health` - liveness

use crate::collector::store::OccupancyStore;
use crate::domain::transmission::Transmission;
use crate::infra::config::Config;
use crate::infra::error::StoreError;
use anyhow::Context;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Transmissions are a few hundred bytes
const MAX_BODY_BYTES: usize = 16 * 1024;

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_error(status: StatusCode, error: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "ok": false, "error": error }).to_string();
    respond(status, "application/json", body)
}

async fn handle_transmission(
    req: Request<hyper::body::Incoming>,
    store: &OccupancyStore,
) -> Response<Full<Bytes>> {
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "transmission_body_unreadable");
            return json_error(StatusCode::BAD_REQUEST, "unreadable_body");
        }
    };

    let transmission: Transmission = match serde_json::from_slice(&body) {
        Ok(transmission) => transmission,
        Err(e) => {
            warn!(error = %e, bytes = %body.len(), "transmission_malformed");
            return json_error(StatusCode::BAD_REQUEST, "malformed_transmission");
        }
    };
    debug!(serial_number = %transmission.serial_number, "transmission_received");

    match store.apply(&transmission) {
        Ok(current) => {
            let body = serde_json::json!({ "ok": true, "current": current }).to_string();
            respond(StatusCode::OK, "application/json", body)
        }
        Err(StoreError::UnknownLocation(_)) => {
            json_error(StatusCode::NOT_FOUND, "unknown_location")
        }
        Err(e) => {
            error!(error = %e, serial_number = %transmission.serial_number, "store_write_failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_write_failed")
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    store: Arc<OccupancyStore>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match (&method, path.as_str()) {
        (&Method::POST, "/") => handle_transmission(req, &store).await,
        (&Method::GET, "/") | (&Method::GET, "/state") => {
            match serde_json::to_string(&store.snapshot()) {
                Ok(body) => respond(StatusCode::OK, "application/json", body),
                Err(e) => {
                    error!(error = %e, "snapshot_encode_failed");
                    json_error(StatusCode::INTERNAL_SERVER_ERROR, "snapshot_encode_failed")
                }
            }
        }
        (&Method::GET, "/health") => respond(StatusCode::OK, "text/plain", "ok"),
        _ => respond(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    };
    Ok(response)
}

/// Bind the configured address and serve until shutdown
pub async fn start_collector_server(
    config: &Config,
    store: Arc<OccupancyStore>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.collector_bind_address(), config.collector_port());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind collector on {addr}"))?;
    serve(listener, store, shutdown).await
}

/// Serve on an already bound listener until shutdown
pub async fn serve(
    listener: TcpListener,
    store: Arc<OccupancyStore>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let local = listener.local_addr().context("Collector listener has no address")?;
    info!(addr = %local, "collector_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let io = TokioIo::new(stream);
                        let store = store.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let store = store.clone();
                                async move { handle_request(req, store).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                debug!(peer = %peer, error = %e, "collector_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "collector_accept_error");
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("collector_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
