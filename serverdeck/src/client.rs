//! Fetch operations: resolve endpoint -> one round trip -> decode.
//!
//! `FleetClient` is built once by the host application and passed to whatever
//! triggers fetches. It holds no cache and no in-flight bookkeeping; clones
//! share the HTTP connection pool and the sequence counter.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::decode;
use crate::error::{Error, Result};
use crate::routes::{Capability, HostTable};
use crate::transport::{RawResponse, Transport, TransportConfig};
use crate::types::{AlertInfo, CommandResponse, LogEntry, Server, ServerStats, ServiceInfo};

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub hosts: HostTable,
    pub transport: TransportConfig,
}

/// A keyed result tagged with the order its request was issued in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequenced<T> {
    pub key: String,
    pub seq: u64,
    pub value: T,
}

impl<T> Sequenced<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Caller-side filter for out-of-order replies: accepts a result only if no
/// newer one for the same key has been accepted already.
#[derive(Debug, Default)]
pub struct Freshness {
    latest: HashMap<String, u64>,
}

impl Freshness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept<T>(&mut self, result: &Sequenced<T>) -> bool {
        match self.latest.get(&result.key) {
            Some(&seen) if seen >= result.seq => false,
            _ => {
                self.latest.insert(result.key.clone(), result.seq);
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FleetClient {
    transport: Transport,
    hosts: Arc<HostTable>,
    next_seq: Arc<AtomicU64>,
}

#[derive(Serialize)]
struct RestartRequest<'a> {
    password: &'a str,
}

impl FleetClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Transport::new(&config.transport)?;
        Ok(Self::with_transport(transport, config.hosts))
    }

    pub fn with_transport(transport: Transport, hosts: HostTable) -> Self {
        Self {
            transport,
            hosts: Arc::new(hosts),
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn hosts(&self) -> &HostTable {
        &self.hosts
    }

    // One counter for the whole client: monotonic overall, so monotonic per key.
    fn issue(&self, key: &str) -> (String, u64) {
        (key.to_string(), self.next_seq.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn get_servers(&self) -> Result<Vec<Server>> {
        let resp = self.transport.fetch(self.hosts.fleet(Capability::Servers)).await?;
        decoded(&resp, decode::servers)
    }

    pub async fn get_system_stats(&self, server: &str) -> Result<Sequenced<ServerStats>> {
        let (key, seq) = self.issue(server);
        let url = self.hosts.resolve(server, Capability::Stats);
        let resp = self.transport.fetch(url).await?;
        let value = decoded(&resp, decode::stats)?;
        Ok(Sequenced { key, seq, value })
    }

    pub async fn get_services(&self) -> Result<Vec<ServiceInfo>> {
        let resp = self.transport.fetch(self.hosts.fleet(Capability::Services)).await?;
        decoded(&resp, decode::services)
    }

    pub async fn get_system_alerts(&self) -> Result<Vec<AlertInfo>> {
        let resp = self.transport.fetch(self.hosts.fleet(Capability::Alerts)).await?;
        decoded(&resp, decode::alerts)
    }

    pub async fn get_logs(&self, server: &str) -> Result<Sequenced<Vec<LogEntry>>> {
        let (key, seq) = self.issue(server);
        let url = self.hosts.resolve(server, Capability::Logs);
        let resp = self.transport.fetch(url).await?;
        let value = decoded(&resp, decode::logs)?;
        Ok(Sequenced { key, seq, value })
    }

    /// Not idempotent. The password travels in plaintext in the JSON body,
    /// which is what the hosts accept today.
    pub async fn post_restart(
        &self,
        server: &str,
        password: &str,
    ) -> Result<Sequenced<CommandResponse>> {
        let (key, seq) = self.issue(server);
        let url = self.hosts.resolve(server, Capability::Restart);
        let resp = self.transport.send(url, &RestartRequest { password }).await?;
        let value = decoded(&resp, decode::command)?;
        Ok(Sequenced { key, seq, value })
    }
}

fn decoded<T>(resp: &RawResponse, decode: fn(&[u8]) -> Result<T>) -> Result<T> {
    match decode(resp.body.as_ref()) {
        Ok(v) => {
            if !resp.is_success() {
                debug!(status = %resp.status, "decoded body from non-success reply");
            }
            Ok(v)
        }
        Err(e) => {
            if !resp.is_success() {
                warn!(status = %resp.status, "reply did not decode: {e}");
            }
            Err(e)
        }
    }
}

/// Run `fut` until it finishes or `token` fires. Cancellation wins ties and
/// comes back as `Error::Cancelled`, which callers drop silently.
pub async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        res = fut => res,
    }
}
