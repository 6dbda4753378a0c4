//! Minimal HTTP client helpers: one request in, raw status + body out.

use std::{path::Path, time::Duration};

use bytes::Bytes;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// No deadline unless set; the underlying client's defaults apply.
    pub timeout: Option<Duration>,
    /// Extra PEM root certificate for hosts with self-signed certs.
    pub tls_ca: Option<String>,
    pub user_agent: Option<String>,
}

/// Stateless wrapper around a shared `reqwest::Client`. Clones share one connection pool.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
}

impl Transport {
    pub fn new(cfg: &TransportConfig) -> Result<Self> {
        let ua = cfg
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("serverdeck/{}", env!("CARGO_PKG_VERSION")));
        let mut builder = reqwest::Client::builder().user_agent(ua);
        if let Some(t) = cfg.timeout {
            builder = builder.timeout(t);
        }
        if let Some(path) = cfg.tls_ca.as_deref() {
            builder = builder.add_root_certificate(load_ca(Path::new(path))?);
        }
        let http = builder
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// GET `url`. Any status counts as a response; only a missing or broken one is an error.
    pub async fn fetch(&self, url: Url) -> Result<RawResponse> {
        debug!(%url, "GET");
        let resp = self.http.get(url).send().await?;
        read(resp).await
    }

    /// POST `body` as JSON to `url`.
    pub async fn send<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<RawResponse> {
        debug!(%url, "POST");
        let resp = self.http.post(url).json(body).send().await?;
        read(resp).await
    }
}

async fn read(resp: reqwest::Response) -> Result<RawResponse> {
    let status = resp.status();
    let url = resp.url().clone();
    let body = resp.bytes().await?;
    debug!(%url, %status, len = body.len(), "response");
    trace!(body = %String::from_utf8_lossy(&body), "raw body");
    Ok(RawResponse { status, body })
}

fn load_ca(path: &Path) -> Result<reqwest::Certificate> {
    let pem = std::fs::read(path).map_err(|e| {
        Error::config(format!("cannot read CA file {}: {e}", path.display()))
    })?;
    reqwest::Certificate::from_pem(&pem)
        .map_err(|e| Error::config(format!("invalid CA file {}: {e}", path.display())))
}
