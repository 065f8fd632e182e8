pub mod backoff;
pub mod connection;
pub mod dispatch;
pub mod gateway_ipc;
pub mod metrics;
pub mod projection;

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Connecting
    }
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Info
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod icons {
    pub const CONNECTED: &str = "🦞";
    pub const DISCONNECTED: &str = "⚠️";
    pub const TRANSPORT_ERROR: &str = "❌";
    pub const HEARTBEAT: &str = "💓";
    pub const SESSION: &str = "📊";
    pub const AGENT: &str = "🤖";
    pub const CRON: &str = "⏰";
    pub const SEARCH: &str = "🔍";
    pub const SYSTEM: &str = "🔔";
    pub const UNKNOWN: &str = "📡";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLogEntry {
    pub timestamp: DateTime<Local>,
    pub icon: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl ActivityLogEntry {
    pub fn new(icon: &'static str, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            timestamp: Local::now(),
            icon,
            message: message.into(),
            severity,
        }
    }

    pub fn info(icon: &'static str, message: impl Into<String>) -> Self {
        Self::new(icon, message, Severity::Info)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Locked,
    Released,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Locked => "locked",
            LockState::Released => "released",
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked)
    }
}

impl Default for LockState {
    fn default() -> Self {
        Self::Released
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LockEntry {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, deserialize_with = "deserialize_lock_state")]
    pub status: LockState,
}

impl LockEntry {
    pub fn new(resource: impl Into<String>, owner: impl Into<String>, status: LockState) -> Self {
        Self {
            resource: resource.into(),
            owner: owner.into(),
            status,
        }
    }
}

/// Anything other than `"locked"` (including non-strings) reads as released.
fn deserialize_lock_state<'de, D>(deserializer: D) -> Result<LockState, D::Error>
where
    D: Deserializer<'de>,
{
    let val = serde_json::Value::deserialize(deserializer)?;
    match val.as_str() {
        Some("locked") => Ok(LockState::Locked),
        _ => Ok(LockState::Released),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockBoard {
    NoActiveLocks,
    Held(Vec<LockEntry>),
}

impl Default for LockBoard {
    fn default() -> Self {
        Self::NoActiveLocks
    }
}

impl LockBoard {
    pub fn from_snapshot(entries: Option<Vec<LockEntry>>) -> Self {
        match entries {
            Some(entries) if !entries.is_empty() => LockBoard::Held(entries),
            _ => LockBoard::NoActiveLocks,
        }
    }

    pub fn entries(&self) -> &[LockEntry] {
        match self {
            LockBoard::NoActiveLocks => &[],
            LockBoard::Held(entries) => entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, LockBoard::NoActiveLocks)
    }

    pub fn locked_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|entry| entry.status.is_locked())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub label: String,
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub token_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    Normal,
    Elevated,
    Critical,
}

impl MemoryPressure {
    pub fn from_pct(pct: i64) -> Self {
        if pct > 80 {
            MemoryPressure::Critical
        } else if pct > 60 {
            MemoryPressure::Elevated
        } else {
            MemoryPressure::Normal
        }
    }
}
