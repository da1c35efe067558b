//! Runtime client — HTTP calls into integration-runtime containers.
//!
//! Every call is bounded by a timeout and guarded by the circuit breaker
//! for its [`CallKind`]. Failures never propagate: they are logged and the
//! caller sees "absent" (`None`) or `false`, and relies on the next poll.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, info};

use podwatch_state::CamelStatusName;

use crate::breaker::{BreakerRegistry, BreakerSettings, CallKind};
use crate::cluster::{ClusterInfo, container_address};
use crate::error::{ProbeError, ProbeResult};

const CLIENT_USER_AGENT: &str = "podwatch/0.1";

/// The three calls the engine makes against a runtime container.
pub trait RuntimeClient: Send + Sync + 'static {
    /// `GET /q/dev/<name>`; the pretty-printed JSON body on 200.
    fn probe_status(
        &self,
        container: &str,
        name: CamelStatusName,
        timeout: Duration,
    ) -> impl Future<Output = Option<String>> + Send;

    /// `PUT /q/upload/<file_name>` with the raw body; true iff 200.
    fn upload_file(
        &self,
        container: &str,
        file_name: &str,
        body: &str,
        timeout: Duration,
    ) -> impl Future<Output = bool> + Send;

    /// `GET /q/dev/reload?reload=true`; same contract as `probe_status`.
    fn trigger_reload(
        &self,
        container: &str,
        timeout: Duration,
    ) -> impl Future<Output = Option<String>> + Send;
}

type Resolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// hyper-backed [`RuntimeClient`].
///
/// Holds one pooled connection client for the whole process; build it
/// once at startup and share it behind an `Arc`.
pub struct HttpRuntimeClient {
    http: Client<HttpConnector, Full<Bytes>>,
    resolver: Resolver,
    breakers: BreakerRegistry,
}

impl HttpRuntimeClient {
    pub fn new(cluster: Arc<dyn ClusterInfo>, settings: BreakerSettings) -> Self {
        let resolver: Resolver =
            Arc::new(move |container: &str| container_address(cluster.as_ref(), container));
        Self {
            http: Client::builder(TokioExecutor::new()).build(HttpConnector::new()),
            resolver,
            breakers: BreakerRegistry::new(settings),
        }
    }

    /// Replace container-name resolution (base address without trailing slash).
    pub fn with_resolver(mut self, resolver: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Base address of a container.
    pub fn address(&self, container: &str) -> String {
        (self.resolver)(container)
    }

    /// Run `call` behind the breaker for `kind`, logging the outcome.
    async fn guarded<T>(
        &self,
        kind: CallKind,
        url: &str,
        call: impl Future<Output = ProbeResult<T>>,
    ) -> Option<T> {
        let permit = match self.breakers.get(kind).try_acquire() {
            Ok(permit) => permit,
            Err(e) => {
                debug!(%kind, %url, error = %e, "call rejected");
                return None;
            }
        };

        match call.await {
            Ok(value) => {
                permit.success();
                Some(value)
            }
            Err(e) => {
                permit.failure();
                match e {
                    ProbeError::Status { .. } => debug!(%kind, %url, error = %e, "call failed"),
                    _ => info!(%kind, %url, error = %e, "call failed"),
                }
                None
            }
        }
    }

    /// Send one request and return the status and collected body, all
    /// within `timeout`.
    async fn exchange(
        &self,
        req: Request<Full<Bytes>>,
        timeout: Duration,
    ) -> ProbeResult<(StatusCode, Bytes)> {
        let url = req.uri().to_string();
        let exchange = async {
            let resp = self
                .http
                .request(req)
                .await
                .map_err(|e| ProbeError::Transport(e.to_string()))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| ProbeError::Transport(e.to_string()))?
                .to_bytes();
            Ok((status, body))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout { url }),
        }
    }

    /// GET a JSON endpoint and re-encode the body pretty-printed.
    async fn get_json(&self, url: &str, timeout: Duration) -> ProbeResult<String> {
        let req = Request::builder()
            .method(Method::GET)
            .uri(url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(Full::new(Bytes::new()))
            .map_err(|e| ProbeError::InvalidRequest(e.to_string()))?;

        let (status, body) = self.exchange(req, timeout).await?;
        if status != StatusCode::OK {
            return Err(ProbeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let value: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| ProbeError::InvalidBody(e.to_string()))?;
        serde_json::to_string_pretty(&value).map_err(|e| ProbeError::InvalidBody(e.to_string()))
    }

    async fn put_body(&self, url: &str, body: &str, timeout: Duration) -> ProbeResult<()> {
        let req = Request::builder()
            .method(Method::PUT)
            .uri(url)
            .header(CONTENT_TYPE, "text/plain")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .body(Full::new(Bytes::copy_from_slice(body.as_bytes())))
            .map_err(|e| ProbeError::InvalidRequest(e.to_string()))?;

        let (status, _) = self.exchange(req, timeout).await?;
        if status == StatusCode::OK {
            Ok(())
        } else {
            Err(ProbeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

impl RuntimeClient for HttpRuntimeClient {
    async fn probe_status(
        &self,
        container: &str,
        name: CamelStatusName,
        timeout: Duration,
    ) -> Option<String> {
        let url = format!("{}/q/dev/{name}", self.address(container));
        self.guarded(CallKind::Probe, &url, self.get_json(&url, timeout))
            .await
    }

    async fn upload_file(
        &self,
        container: &str,
        file_name: &str,
        body: &str,
        timeout: Duration,
    ) -> bool {
        let url = format!("{}/q/upload/{file_name}", self.address(container));
        self.guarded(CallKind::Upload, &url, self.put_body(&url, body, timeout))
            .await
            .is_some()
    }

    async fn trigger_reload(&self, container: &str, timeout: Duration) -> Option<String> {
        let url = format!("{}/q/dev/reload?reload=true", self.address(container));
        self.guarded(CallKind::Reload, &url, self.get_json(&url, timeout))
            .await
    }
}
