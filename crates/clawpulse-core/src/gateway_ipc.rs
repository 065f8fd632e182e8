//! Inbound gateway frame contracts.
//!
//! The gateway pushes JSON text frames, each an object with a string `type`
//! discriminator and variant-specific fields next to it. Fields are optional
//! on the wire and read one at a time: a field with an unexpected type reads
//! as absent without disturbing its neighbours. Defaults are applied by the
//! accessors below rather than at parse time.

use crate::LockEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;
pub const DEFAULT_AGENT_ID: &str = "main";
pub const DEFAULT_AGENT_COUNT: u64 = 1;
const UNKNOWN_FIELD: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    LockStatus(LockStatusPayload),
    Heartbeat(HeartbeatPayload),
    SessionStatus(SessionStatusPayload),
    AgentTurn(AgentTurnPayload),
    CronJob(CronJobPayload),
    WebSearch(WebSearchPayload),
    SystemEvent(SystemEventPayload),
    Unknown(String),
}

impl InboundMessage {
    pub fn kind(&self) -> &str {
        match self {
            InboundMessage::LockStatus(_) => "lock_status",
            InboundMessage::Heartbeat(_) => "heartbeat",
            InboundMessage::SessionStatus(_) => "session_status",
            InboundMessage::AgentTurn(_) => "agent_turn",
            InboundMessage::CronJob(_) => "cron_job",
            InboundMessage::WebSearch(_) => "web_search",
            InboundMessage::SystemEvent(_) => "system_event",
            InboundMessage::Unknown(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LockStatusPayload {
    #[serde(default, deserialize_with = "deserialize_lock_entries")]
    pub locks: Option<Vec<LockEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HeartbeatPayload {
    #[serde(default, deserialize_with = "deserialize_number")]
    pub duration: Option<f64>,
}

impl HeartbeatPayload {
    pub fn duration_label(&self) -> String {
        self.duration
            .map(|value| format!("{value}"))
            .unwrap_or_else(|| UNKNOWN_FIELD.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SessionStatusPayload {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub model: Option<String>,
    #[serde(
        default,
        rename = "contextUsage",
        deserialize_with = "deserialize_number"
    )]
    pub context_usage: Option<f64>,
}

impl SessionStatusPayload {
    pub fn model_label(&self) -> &str {
        non_empty_or(self.model.as_deref(), UNKNOWN_FIELD)
    }

    pub fn context_usage_or_zero(&self) -> f64 {
        self.context_usage.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AgentTurnPayload {
    #[serde(default, rename = "agentId", deserialize_with = "deserialize_text")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub count: Option<u64>,
}

impl AgentTurnPayload {
    /// Missing or empty ids belong to the main agent.
    pub fn agent_id_or_main(&self) -> &str {
        non_empty_or(self.agent_id.as_deref(), DEFAULT_AGENT_ID)
    }

    /// A missing or zero count is reported as a single agent.
    pub fn count_or_default(&self) -> u64 {
        match self.count {
            Some(count) if count > 0 => count,
            _ => DEFAULT_AGENT_COUNT,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CronJobPayload {
    #[serde(default, rename = "jobName", deserialize_with = "deserialize_text")]
    pub job_name: Option<String>,
}

impl CronJobPayload {
    pub fn job_name_label(&self) -> &str {
        non_empty_or(self.job_name.as_deref(), UNKNOWN_FIELD)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WebSearchPayload {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub query: Option<String>,
}

impl WebSearchPayload {
    pub fn query_label(&self) -> &str {
        non_empty_or(self.query.as_deref(), UNKNOWN_FIELD)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SystemEventPayload {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub message: Option<String>,
}

impl SystemEventPayload {
    pub fn message_label(&self) -> &str {
        non_empty_or(self.message.as_deref(), UNKNOWN_FIELD)
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        _ => None,
    })
}

/// Numbers, plus strings that parse as finite numbers.
fn deserialize_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(number_value(&Value::deserialize(deserializer)?))
}

/// Non-negative whole numbers; `2.0` counts as `2`.
fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if let Some(count) = value.as_u64() {
        return Ok(Some(count));
    }
    Ok(number_value(&value)
        .filter(|count| *count >= 0.0 && count.fract() == 0.0 && *count <= u64::MAX as f64)
        .map(|count| count as u64))
}

/// Keeps the entries that parse and skips the rest, so one bad entry cannot
/// hide the locks next to it. A non-array reads as absent.
fn deserialize_lock_entries<'de, D>(deserializer: D) -> Result<Option<Vec<LockEntry>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let total = items.len();
    let entries: Vec<LockEntry> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if entries.len() < total {
        tracing::debug!(
            "gateway_lock_entries_skipped: {} of {total}",
            total - entries.len()
        );
    }
    Ok(Some(entries))
}

fn number_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|number| number.is_finite())
}

fn non_empty_or<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => fallback,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("frame decode failed: {0}")]
    Decode(String),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no string `type` field")]
    MissingType,
}

/// Parses one text frame into a typed message.
///
/// Only the envelope is strict: the frame must be a JSON object with a string
/// `type`. Payload fields are read one at a time, so a field with an
/// unexpected type reads as absent and never fails the frame.
pub fn decode_message(raw: &str, max_frame_bytes: usize) -> Result<InboundMessage, FrameError> {
    if raw.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|err| FrameError::Decode(err.to_string()))?;
    let Value::Object(mut fields) = value else {
        return Err(FrameError::NotAnObject);
    };
    // A missing or non-string discriminator cannot be echoed, so the frame is dropped.
    let kind = match fields.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(FrameError::MissingType),
    };

    let message = match kind.as_str() {
        "lock_status" => InboundMessage::LockStatus(lenient_payload(&kind, fields)),
        "heartbeat" => InboundMessage::Heartbeat(lenient_payload(&kind, fields)),
        "session_status" => InboundMessage::SessionStatus(lenient_payload(&kind, fields)),
        "agent_turn" => InboundMessage::AgentTurn(lenient_payload(&kind, fields)),
        "cron_job" => InboundMessage::CronJob(lenient_payload(&kind, fields)),
        "web_search" => InboundMessage::WebSearch(lenient_payload(&kind, fields)),
        "system_event" => InboundMessage::SystemEvent(lenient_payload(&kind, fields)),
        _ => InboundMessage::Unknown(kind),
    };
    Ok(message)
}

fn lenient_payload<T>(kind: &str, fields: Map<String, Value>) -> T
where
    T: DeserializeOwned + Default,
{
    match serde_json::from_value(Value::Object(fields)) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::debug!("gateway_payload_degraded: type={kind} err={err}");
            T::default()
        }
    }
}
