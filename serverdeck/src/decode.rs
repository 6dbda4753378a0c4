//! Response decoders: raw JSON bytes -> domain records.
//!
//! Wire structs spell out the backend's field names one by one. The payloads
//! mix `loadavg_1min` with `usagePercent`, so no blanket rename rule fits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::types::{
    AlertInfo, CommandResponse, CpuStats, DiskStats, LogEntry, LogLevel, MemoryStats, Server,
    ServerStats, ServerStatus, ServiceInfo, ServiceStatus, Severity,
};

// ---------- helpers ----------

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut de = serde_json::Deserializer::from_slice(body);
    let value = serde_path_to_error::deserialize(&mut de).map_err(Error::decode)?;
    de.end().map_err(|e| Error::Decode {
        path: ".".into(),
        message: e.to_string(),
    })?;
    Ok(value)
}

fn from_value<T: DeserializeOwned>(v: Value) -> Result<T> {
    serde_path_to_error::deserialize(v).map_err(Error::decode)
}

/// Lenient percent: `"42"`, `"42%"`, `" 42 % "` -> 42.0; empty or non-numeric -> 0.0.
pub fn parse_percent(raw: &str) -> f64 {
    let s = raw.trim();
    let s = s.strip_suffix('%').unwrap_or(s).trim();
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// ISO-8601 / RFC 3339 with mandatory fractional seconds, e.g. `2025-05-10T08:15:30.123Z`.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let s = raw.trim();
    let has_fraction = s
        .split_once(|c| c == 'T' || c == 't')
        .map(|(_, time)| time.as_bytes().get(8) == Some(&b'.'))
        .unwrap_or(false);
    if !has_fraction {
        return Err(format!("timestamp `{raw}` has no fractional seconds"));
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp `{raw}`: {e}"))
}

fn percent<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_percent(&s),
        _ => 0.0,
    })
}

fn timestamp<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

// ids arrive as strings from some hosts and integers from others
fn id_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// `{"<key>": {...}}` -> inner value, unless the inner value is itself a leaf
/// record (carries `leaf_field`), in which case the wrapper key was data.
fn unwrap_single(root: &mut Value, key: &str, leaf_field: &str) -> Option<Value> {
    let obj = root.as_object_mut()?;
    if obj.len() != 1 || obj.get(key)?.get(leaf_field).is_some() {
        return None;
    }
    obj.remove(key)
}

// ---------- servers ----------

#[derive(Debug, Deserialize)]
struct ServerInfoWire {
    ip_address: String,
    status: String,
    #[serde(default)]
    uptime: Option<String>,
}

/// `{"<name>": {ip_address, status}, ...}`, also accepted wrapped in `{"servers": ...}`.
/// Output is ordered by name.
pub fn servers(body: &[u8]) -> Result<Vec<Server>> {
    let mut root: Value = parse(body)?;
    if let Some(inner) = unwrap_single(&mut root, "servers", "ip_address") {
        root = inner;
    }
    let map: BTreeMap<String, ServerInfoWire> = from_value(root)?;
    Ok(map
        .into_iter()
        .map(|(name, info)| {
            let status = ServerStatus::from_raw(&info.status);
            if status == ServerStatus::Offline && !info.status.trim().eq_ignore_ascii_case("offline") {
                warn!(server = %name, raw = %info.status, "unknown server status, treating as offline");
            }
            Server {
                name,
                status,
                ip_address: info.ip_address,
                uptime: info.uptime.unwrap_or_default(),
            }
        })
        .collect())
}

// ---------- stats ----------

#[derive(Debug, Deserialize)]
struct StatsWire {
    cpu: CpuWire,
    memory: MemoryWire,
    disk: DiskWire,
}

#[derive(Debug, Deserialize)]
struct CpuWire {
    #[serde(rename = "loadavg_1min")]
    one: f64,
    #[serde(rename = "loadavg_5min")]
    five: f64,
    #[serde(rename = "loadavg_15min")]
    fifteen: f64,
}

#[derive(Debug, Deserialize)]
struct MemoryWire {
    total: u64,
    free: u64,
    used: u64,
    #[serde(rename = "usagePercent", deserialize_with = "percent")]
    usage_percent: f64,
}

#[derive(Debug, Deserialize)]
struct DiskWire {
    filesystem: String,
    size: String,
    used: String,
    available: String,
    #[serde(rename = "usePercent", deserialize_with = "percent")]
    use_percent: f64,
    mount: String,
}

pub fn stats(body: &[u8]) -> Result<ServerStats> {
    let w: StatsWire = parse(body)?;
    Ok(ServerStats {
        cpu: CpuStats {
            loadavg_1min: w.cpu.one,
            loadavg_5min: w.cpu.five,
            loadavg_15min: w.cpu.fifteen,
        },
        memory: MemoryStats {
            total: w.memory.total,
            free: w.memory.free,
            used: w.memory.used,
            usage_percent: w.memory.usage_percent,
        },
        disk: DiskStats {
            filesystem: w.disk.filesystem,
            size: w.disk.size,
            used: w.disk.used,
            available: w.disk.available,
            use_percent: w.disk.use_percent,
            mount: w.disk.mount,
        },
    })
}

// ---------- services ----------

#[derive(Debug, Deserialize)]
struct UnitWire {
    unit: String,
    #[serde(default)]
    load: String,
    #[serde(default)]
    active: String,
    sub: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ServicesWire {
    services: Vec<UnitWire>,
}

/// `{"services": [unit, ...]}` or a bare list of units.
pub fn services(body: &[u8]) -> Result<Vec<ServiceInfo>> {
    let root: Value = parse(body)?;
    let units: Vec<UnitWire> = if root.is_array() {
        from_value(root)?
    } else {
        from_value::<ServicesWire>(root)?.services
    };
    Ok(units
        .into_iter()
        .map(|u| {
            let name = if u.unit.is_empty() { u.load } else { u.unit };
            tracing::trace!(service = %name, active = %u.active, sub = %u.sub, "unit");
            ServiceInfo {
                name,
                status: ServiceStatus::from_sub_state(&u.sub),
                description: u.description,
                uptime: String::new(),
            }
        })
        .collect())
}

// ---------- alerts ----------

#[derive(Debug, Deserialize)]
struct AlertWire {
    #[serde(deserialize_with = "id_string")]
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    severity: String,
    #[serde(deserialize_with = "timestamp")]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct AlertsWire {
    alerts: Vec<AlertWire>,
}

/// `{"alerts": [...]}`, returned newest first.
pub fn alerts(body: &[u8]) -> Result<Vec<AlertInfo>> {
    let w: AlertsWire = parse(body)?;
    let mut out: Vec<AlertInfo> = w
        .alerts
        .into_iter()
        .map(|a| {
            let severity = Severity::from_raw(&a.severity);
            if severity.as_str() != a.severity.trim().to_ascii_lowercase() {
                warn!(alert = %a.id, raw = %a.severity, "unknown severity, using {}", severity.as_str());
            }
            AlertInfo {
                id: a.id,
                title: a.title,
                description: a.description,
                severity,
                timestamp: a.timestamp,
            }
        })
        .collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(out)
}

// ---------- logs ----------

#[derive(Debug, Deserialize)]
struct LogWire {
    #[serde(deserialize_with = "id_string")]
    id: String,
    message: String,
    level: String,
    #[serde(deserialize_with = "timestamp")]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct LogsWire {
    logs: Vec<LogWire>,
}

/// `{"logs": [...]}`, returned newest first.
pub fn logs(body: &[u8]) -> Result<Vec<LogEntry>> {
    let w: LogsWire = parse(body)?;
    let mut out: Vec<LogEntry> = w
        .logs
        .into_iter()
        .map(|l| LogEntry {
            id: l.id,
            message: l.message,
            level: LogLevel::from_raw(&l.level),
            timestamp: l.timestamp,
        })
        .collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(out)
}

// ---------- command ----------

#[derive(Debug, Deserialize)]
struct CommandWire {
    message: String,
}

/// `{"message": "..."}`. Any failure here is a `Command` error: the request
/// reached the host, so the side effect may already have happened.
pub fn command(body: &[u8]) -> Result<CommandResponse> {
    parse::<CommandWire>(body)
        .map(|w| CommandResponse { message: w.message })
        .map_err(|e| Error::Command {
            message: e.to_string(),
        })
}
