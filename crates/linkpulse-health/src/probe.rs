//! Single-shot liveness probes.
//!
//! A probe performs exactly one check and reports what happened. Retrying,
//! waiting, and rescheduling are the caller's job.

use std::error::Error as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use linkpulse_core::Endpoint;
use reqwest::{redirect, Client, Url};
use thiserror::Error;
use tracing::debug;

/// Redirect hops followed before a check gives up.
pub const MAX_REDIRECTS: usize = 10;

/// Why a probe did not produce a status code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("redirect failed: {0}")]
    Redirect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type ProbeResult = Result<StatusCode, ProbeError>;

/// One liveness check against one endpoint.
pub trait Probe: Send + Sync {
    fn check(&self, endpoint: &Endpoint) -> impl Future<Output = ProbeResult> + Send;
}

impl<P: Probe> Probe for Arc<P> {
    fn check(&self, endpoint: &Endpoint) -> impl Future<Output = ProbeResult> + Send {
        (**self).check(endpoint)
    }
}

/// Probes endpoints with an HTTP `GET`, following redirects.
///
/// Holds one connection pool shared by every check.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("linkpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET` `url` and return the status of the final response.
    ///
    /// Any response counts as success, including 4xx and 5xx. The timeout
    /// covers the whole redirect chain.
    pub async fn check_url(&self, url: &str) -> ProbeResult {
        let target =
            Url::parse(url).map_err(|_| ProbeError::InvalidEndpoint(url.to_string()))?;
        match target.scheme() {
            "http" | "https" => {}
            other => return Err(ProbeError::UnsupportedScheme(other.to_string())),
        }

        let resp = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = resp.status();
        if resp.url().as_str() != url {
            debug!(%url, final_url = %resp.url(), status = status.as_u16(), "followed redirects");
        }
        Ok(status)
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> ProbeError {
        let detail = error_chain(&err);
        if err.is_timeout() {
            debug!(%url, "probe timed out");
            ProbeError::Timeout(self.timeout)
        } else if err.is_redirect() {
            debug!(error = %detail, %url, "probe redirect failed");
            ProbeError::Redirect(detail)
        } else if err.is_connect() {
            debug!(error = %detail, %url, "probe connection failed");
            ProbeError::Connect(detail)
        } else {
            debug!(error = %detail, %url, "probe request failed");
            ProbeError::Request(detail)
        }
    }
}

impl Probe for HttpProbe {
    fn check(&self, endpoint: &Endpoint) -> impl Future<Output = ProbeResult> + Send {
        self.check_url(endpoint.as_str())
    }
}

/// Probe `url` once with a throwaway client.
pub async fn http_probe(url: &str, timeout: Duration) -> ProbeResult {
    HttpProbe::new(timeout)?.check_url(url).await
}

/// `reqwest` keeps the useful part of an error in its source chain.
fn error_chain(err: &reqwest::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
