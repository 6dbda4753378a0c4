//! Endpoint routing: server display name -> host base URL -> capability URL.
//!
//! The backend is a handful of independently addressed hosts, not one service.
//! Names listed in the table get their own base; every other name, including
//! aggregate entries like "Production Server", goes to the default host.

use std::collections::BTreeMap;
use tracing::warn;
use url::Url;

pub const DEFAULT_BASE: &str = "https://rest.dextron04.in/api";

/// Built-in named hosts, used when no host file exists yet.
pub const BUILTIN_HOSTS: &[(&str, &str)] = &[
    ("Dex Pi 2", "https://rest.dextron04.in/raspi2"),
    ("Dex Pi 4B", "https://rest.dextron04.in/raspi4b"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Servers,
    Stats,
    Services,
    Alerts,
    Logs,
    Restart,
}

impl Capability {
    pub fn path(self) -> &'static str {
        match self {
            Capability::Servers => "get-servers",
            Capability::Stats => "system-stats",
            Capability::Services => "services",
            Capability::Alerts => "system-alerts",
            Capability::Logs => "logs",
            Capability::Restart => "restart",
        }
    }
}

/// Whether `url` can serve as a host base: http(s) with a hierarchical path.
pub fn is_host_base(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https") && !url.cannot_be_a_base()
}

/// Name -> base URL table. Every base must pass [`is_host_base`]; the
/// constructors take the URL as given, so callers building a table by hand
/// should check first. Tables loaded from the host file already are.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTable {
    default_base: Url,
    hosts: BTreeMap<String, Url>,
}

impl HostTable {
    pub fn new(default_base: Url) -> Self {
        Self {
            default_base,
            hosts: BTreeMap::new(),
        }
    }

    pub fn with_host(mut self, name: impl Into<String>, base: Url) -> Self {
        self.insert(name, base);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, base: Url) {
        self.hosts.insert(name.into(), base);
    }

    pub fn default_base(&self) -> &Url {
        &self.default_base
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&str, &Url)> {
        self.hosts.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Exact, case-sensitive match; unknown names are the normal default path.
    pub fn base_for(&self, server: &str) -> &Url {
        self.hosts.get(server).unwrap_or(&self.default_base)
    }

    /// URL of a per-server capability (stats, logs, restart).
    pub fn resolve(&self, server: &str, capability: Capability) -> Url {
        join(self.base_for(server), capability.path())
    }

    /// URL of a fleet-wide capability (servers, services, alerts); always on the default host.
    pub fn fleet(&self, capability: Capability) -> Url {
        join(&self.default_base, capability.path())
    }
}

impl Default for HostTable {
    fn default() -> Self {
        let mut table = HostTable::new(Url::parse(DEFAULT_BASE).expect("built-in default base"));
        for (name, base) in BUILTIN_HOSTS {
            table.insert(*name, Url::parse(base).expect("built-in host base"));
        }
        table
    }
}

fn join(base: &Url, segment: &str) -> Url {
    let mut url = base.clone();
    match url.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty().push(segment);
        }
        Err(()) => warn!(%base, segment, "host base has no path to extend; request goes to the base as is"),
    }
    url
}
