//! HTTP registration API
//!
//! One JSON endpoint on a trusted network plus health and version probes.
//! Authentication is deliberately absent: registering machines sit on the
//! same private network as the proxy.

use crate::error::json_error_response;
use crate::registry::{RegistrationCoordinator, RegistrationRequest, ServiceRequest};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Version information for the service
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Helper to create a simple response - infallible with valid StatusCode
fn response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(body.into()))
        .expect("valid response with StatusCode enum")
}

/// Helper to create a JSON response
fn json_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(body.into()))
        .expect("valid response with StatusCode enum and static header")
}

/// One entry of the `services` array: either a bare name or an object
/// carrying an explicit target override
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ServiceEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        target: Option<String>,
    },
}

impl From<ServiceEntry> for ServiceRequest {
    fn from(entry: ServiceEntry) -> Self {
        match entry {
            ServiceEntry::Name(name) => ServiceRequest { name, target: None },
            ServiceEntry::Detailed { name, target } => ServiceRequest { name, target },
        }
    }
}

/// Wire shape of a registration request
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterBody {
    pub machine_id: Option<String>,
    pub arch: Option<String>,
    pub os: Option<String>,
    pub public_ip: Option<String>,
    pub backend_host: Option<String>,
    pub backend_ip: Option<String>,
    pub ip: Option<String>,
    pub services: Vec<ServiceEntry>,
}

impl RegisterBody {
    /// First non-empty of `backendHost`, `backendIp`, `ip`
    fn backend_host(&self) -> Option<String> {
        [&self.backend_host, &self.backend_ip, &self.ip]
            .into_iter()
            .flatten()
            .find(|v| !v.trim().is_empty())
            .map(|v| v.trim().to_string())
    }
}

/// Informational passthrough echoed back to the caller
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Received {
    machine_id: Option<String>,
    arch: Option<String>,
    os: Option<String>,
    public_ip: Option<String>,
    backend_host: Option<String>,
}

/// Registration API server
pub struct ApiServer {
    listener: TcpListener,
    coordinator: Arc<RegistrationCoordinator>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ApiServer {
    /// Bind the listener; port 0 picks a free port (used by tests)
    pub async fn bind(
        addr: SocketAddr,
        coordinator: Arc<RegistrationCoordinator>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            coordinator,
            shutdown_rx,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!(addr = %self.listener.local_addr()?, "Registration API listening");

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let coordinator = Arc::clone(&self.coordinator);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let coordinator = Arc::clone(&coordinator);
                                    async move { handle_request(req, coordinator).await }
                                });
                                if let Err(e) = AutoBuilder::new(TokioExecutor::new())
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!(addr = %addr, error = %e, "API connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept API connection");
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Registration API shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    coordinator: Arc<RegistrationCoordinator>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();

    debug!(%method, %path, "API request");

    let response = match (&method, path.as_str()) {
        // Liveness probe, read-only, no synchronization
        (&Method::GET, "/health") => response(StatusCode::OK, "ok"),

        (&Method::GET, "/version") => {
            let version_info = serde_json::json!({
                "name": PKG_NAME,
                "version": VERSION,
            });
            json_response(StatusCode::OK, version_info.to_string())
        }

        (&Method::POST, "/register") => {
            let body = req.into_body().collect().await?.to_bytes();
            handle_register(&body, &coordinator).await
        }

        _ => response(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(response)
}

async fn handle_register(
    body: &[u8],
    coordinator: &RegistrationCoordinator,
) -> Response<Full<Bytes>> {
    let wire: RegisterBody = match serde_json::from_slice(body) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, "Rejected malformed registration body");
            return json_error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                format!("body is not a valid registration: {}", e),
            );
        }
    };

    let request = RegistrationRequest {
        machine_id: wire.machine_id.clone(),
        backend_host: wire.backend_host(),
        services: wire.services.into_iter().map(Into::into).collect(),
    };

    let received = Received {
        machine_id: wire.machine_id,
        arch: wire.arch,
        os: wire.os,
        public_ip: wire.public_ip,
        backend_host: request.backend_host.clone(),
    };

    match coordinator.register(&request).await {
        Ok(outcome) => {
            let body = serde_json::json!({
                "id": outcome.id,
                "domains": outcome.domains,
                "status": outcome.status,
                "received": received,
            });
            json_response(StatusCode::OK, body.to_string())
        }
        Err(e) => {
            error!(error = %e, "Registration failed");
            json_error_response(e.status_code(), e.code(), e.to_string())
        }
    }
}
