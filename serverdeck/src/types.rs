//! Domain records produced by the decoders. Values only; nothing here is persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ServerStatus {
    Online,
    #[default]
    Offline,
    Maintenance,
}

impl ServerStatus {
    /// Total mapping: title-case the raw value and match it; anything else is `Offline`.
    pub fn from_raw(raw: &str) -> Self {
        match title_case(raw.trim()).as_str() {
            "Online" => ServerStatus::Online,
            "Offline" => ServerStatus::Offline,
            "Maintenance" => ServerStatus::Maintenance,
            _ => ServerStatus::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServerStatus::Online => "Online",
            ServerStatus::Offline => "Offline",
            ServerStatus::Maintenance => "Maintenance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Server {
    /// Display name; also the routing key for stats, logs and restart.
    pub name: String,
    pub status: ServerStatus,
    pub ip_address: String,
    /// Empty when the backend doesn't report it.
    pub uptime: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuStats {
    pub loadavg_1min: f64,
    pub loadavg_5min: f64,
    pub loadavg_15min: f64,
}

impl CpuStats {
    pub fn loadavg(&self) -> (f64, f64, f64) {
        (self.loadavg_1min, self.loadavg_5min, self.loadavg_15min)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub usage_percent: f64,
}

impl MemoryStats {
    /// used / total in 0..=1, or 0 when total is unknown.
    pub fn used_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.used as f64 / self.total as f64).clamp(0.0, 1.0)
        }
    }
}

// Sizes stay as the backend formats them (df-style "29G").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskStats {
    pub filesystem: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub use_percent: f64,
    pub mount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStats {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disk: DiskStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    Running,
    Stopped,
    Warning,
}

impl ServiceStatus {
    /// Derived from the unit's sub-state: "active" runs, "exited" warns, the rest are stopped.
    pub fn from_sub_state(sub: &str) -> Self {
        match sub.trim().to_ascii_lowercase().as_str() {
            "active" => ServiceStatus::Running,
            "exited" => ServiceStatus::Warning,
            _ => ServiceStatus::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Running => "Running",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::Warning => "Warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub status: ServiceStatus,
    pub description: String,
    pub uptime: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Severity {
    High,
    #[default]
    Medium,
    Low,
}

impl Severity {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Severity::High,
            "medium" => Severity::Medium,
            "low" => Severity::Low,
            _ => Severity::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    #[default]
    Other,
}

impl LogLevel {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "info" => LogLevel::Info,
            "warning" | "warn" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::default(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "Info",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: String,
    pub message: String,
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResponse {
    pub message: String,
}

// "mAINTENANCE mode" -> "Maintenance Mode"
fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
