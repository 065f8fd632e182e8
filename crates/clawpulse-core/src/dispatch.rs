use crate::gateway_ipc::{decode_message, FrameError, InboundMessage, DEFAULT_MAX_FRAME_BYTES};
use crate::projection::GatewayProjection;
use crate::{icons, ActivityLogEntry, LockEntry};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionUpdate {
    ReplaceLocks(Option<Vec<LockEntry>>),
    MemoryUsage(f64),
    SubAgentCount(u64),
}

/// Effects of one parsed frame: at most one projection update and at most one
/// activity line, never neither.
#[derive(Debug, Clone, PartialEq)]
pub struct Routing {
    pub update: Option<ProjectionUpdate>,
    pub activity: Option<ActivityLogEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Routed { kind: String },
    Dropped(FrameError),
}

pub fn route(message: InboundMessage) -> Routing {
    match message {
        InboundMessage::LockStatus(payload) => Routing {
            update: Some(ProjectionUpdate::ReplaceLocks(payload.locks)),
            activity: None,
        },
        InboundMessage::Heartbeat(payload) => Routing {
            update: None,
            activity: Some(ActivityLogEntry::info(
                icons::HEARTBEAT,
                format!("heartbeat - took {}ms", payload.duration_label()),
            )),
        },
        InboundMessage::SessionStatus(payload) => Routing {
            update: Some(ProjectionUpdate::MemoryUsage(payload.context_usage_or_zero())),
            activity: Some(ActivityLogEntry::info(
                icons::SESSION,
                format!("session status - model: {}", payload.model_label()),
            )),
        },
        InboundMessage::AgentTurn(payload) => Routing {
            update: Some(ProjectionUpdate::SubAgentCount(payload.count_or_default())),
            activity: Some(ActivityLogEntry::info(
                icons::AGENT,
                format!("sub-agent started - {}", payload.agent_id_or_main()),
            )),
        },
        InboundMessage::CronJob(payload) => Routing {
            update: None,
            activity: Some(ActivityLogEntry::info(
                icons::CRON,
                format!("cron job - {}", payload.job_name_label()),
            )),
        },
        InboundMessage::WebSearch(payload) => Routing {
            update: None,
            activity: Some(ActivityLogEntry::info(
                icons::SEARCH,
                format!("web search - {}", payload.query_label()),
            )),
        },
        InboundMessage::SystemEvent(payload) => Routing {
            update: None,
            activity: Some(ActivityLogEntry::info(
                icons::SYSTEM,
                format!("system event - {}", payload.message_label()),
            )),
        },
        InboundMessage::Unknown(raw_type) => Routing {
            update: None,
            activity: Some(ActivityLogEntry::info(
                icons::UNKNOWN,
                format!("unknown message type: {raw_type}"),
            )),
        },
    }
}

pub fn apply_routing(projection: &mut GatewayProjection, routing: Routing) {
    match routing.update {
        Some(ProjectionUpdate::ReplaceLocks(entries)) => projection.replace_locks(entries),
        Some(ProjectionUpdate::MemoryUsage(raw)) => {
            projection.update_memory_pct(raw);
        }
        Some(ProjectionUpdate::SubAgentCount(count)) => projection.update_sub_agent_count(count),
        None => {}
    }
    if let Some(entry) = routing.activity {
        projection.append_activity_log(entry);
    }
}

/// Routes raw gateway frames into a projection. Malformed frames are dropped
/// and only reported through `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    max_frame_bytes: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Dispatcher {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    pub fn dispatch(&self, projection: &mut GatewayProjection, raw_frame: &str) -> DispatchOutcome {
        let message = match decode_message(raw_frame, self.max_frame_bytes) {
            Ok(message) => message,
            Err(err) => {
                debug!("gateway_frame_dropped: {err}");
                return DispatchOutcome::Dropped(err);
            }
        };
        let kind = message.kind().to_string();
        apply_routing(projection, route(message));
        DispatchOutcome::Routed { kind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LockBoard, LockState, Severity};

    fn dispatch(projection: &mut GatewayProjection, raw: &str) -> DispatchOutcome {
        Dispatcher::default().dispatch(projection, raw)
    }

    fn last_message(projection: &GatewayProjection) -> Option<String> {
        projection
            .activity_log()
            .next_back()
            .map(|entry| entry.message.clone())
    }

    #[test]
    fn malformed_frames_leave_projection_untouched() {
        let mut projection = GatewayProjection::new();
        for raw in ["", "not json", "{\"type\":", "42", "null", "{\"duration\":3}"] {
            let outcome = dispatch(&mut projection, raw);
            assert!(matches!(outcome, DispatchOutcome::Dropped(_)), "{raw}");
        }
        assert_eq!(projection.activity_len(), 0);
        assert_eq!(projection.memory_pct(), None);
        assert_eq!(projection.sub_agent_count(), None);
        assert!(projection.locks().is_empty());

        let outcome = dispatch(&mut projection, r#"{"type":"heartbeat","duration":12}"#);
        assert_eq!(
            outcome,
            DispatchOutcome::Routed {
                kind: "heartbeat".to_string()
            }
        );
        assert_eq!(projection.activity_len(), 1);
    }

    #[test]
    fn lock_status_replaces_snapshot_without_logging() {
        let mut projection = GatewayProjection::new();
        dispatch(
            &mut projection,
            r#"{"type":"lock_status","locks":[{"resource":"db","owner":"worker-1","status":"locked"}]}"#,
        );
        let entries = projection.locks().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].resource, "db");
        assert_eq!(entries[0].owner, "worker-1");
        assert_eq!(entries[0].status, LockState::Locked);
        assert_eq!(projection.activity_len(), 0);

        dispatch(&mut projection, r#"{"type":"lock_status"}"#);
        assert_eq!(projection.locks(), &LockBoard::NoActiveLocks);
        assert_eq!(projection.activity_len(), 0);
    }

    #[test]
    fn bad_lock_entry_does_not_hide_held_locks() {
        let mut projection = GatewayProjection::new();
        dispatch(
            &mut projection,
            r#"{"type":"lock_status","locks":[
                {"resource":"db","owner":"worker-1","status":"locked"},
                {"resource":7,"owner":"worker-2","status":"locked"}
            ]}"#,
        );
        assert_eq!(projection.locks().locked_count(), 1);
        assert_eq!(projection.locks().entries()[0].resource, "db");
    }

    #[test]
    fn mistyped_fields_keep_their_valid_neighbours() {
        let mut projection = GatewayProjection::new();
        dispatch(
            &mut projection,
            r#"{"type":"agent_turn","agentId":"scout","count":2.0}"#,
        );
        assert_eq!(projection.sub_agent_count(), Some(2));
        assert_eq!(
            last_message(&projection).as_deref(),
            Some("sub-agent started - scout")
        );

        dispatch(
            &mut projection,
            r#"{"type":"session_status","model":"opus","contextUsage":"65500"}"#,
        );
        assert_eq!(projection.memory_pct(), Some(50));
        assert_eq!(
            last_message(&projection).as_deref(),
            Some("session status - model: opus")
        );
    }

    #[test]
    fn agent_turn_without_fields_reports_main_and_one() {
        let mut projection = GatewayProjection::new();
        dispatch(&mut projection, r#"{"type":"agent_turn"}"#);
        assert_eq!(projection.sub_agent_count(), Some(1));
        let message = last_message(&projection).expect("logged");
        assert!(message.contains("main"), "{message}");
    }

    #[test]
    fn session_status_updates_memory_and_logs_model() {
        let mut projection = GatewayProjection::new();
        dispatch(
            &mut projection,
            r#"{"type":"session_status","model":"claw-large","contextUsage":65500}"#,
        );
        assert_eq!(projection.memory_pct(), Some(50));
        let message = last_message(&projection).expect("logged");
        assert!(message.contains("claw-large"), "{message}");
    }

    #[test]
    fn info_only_types_log_once_without_projection_changes() {
        let cases = [
            (r#"{"type":"heartbeat","duration":87}"#, "87ms"),
            (r#"{"type":"cron_job","jobName":"nightly-digest"}"#, "nightly-digest"),
            (r#"{"type":"web_search","query":"tokio select"}"#, "tokio select"),
            (r#"{"type":"system_event","message":"config reloaded"}"#, "config reloaded"),
            (r#"{"type":"quota_report"}"#, "quota_report"),
        ];
        for (raw, needle) in cases {
            let mut projection = GatewayProjection::new();
            dispatch(&mut projection, raw);
            assert_eq!(projection.activity_len(), 1, "{raw}");
            let entry = projection.activity_log().next().expect("entry");
            assert_eq!(entry.severity, Severity::Info);
            assert!(entry.message.contains(needle), "{}", entry.message);
            assert_eq!(projection.memory_pct(), None);
            assert_eq!(projection.sub_agent_count(), None);
            assert!(projection.locks().is_empty());
        }
    }

    #[test]
    fn unknown_type_echoes_raw_type() {
        let routing = route(InboundMessage::Unknown("quota_report".to_string()));
        assert_eq!(routing.update, None);
        let entry = routing.activity.expect("logged");
        assert_eq!(entry.message, "unknown message type: quota_report");
        assert_eq!(entry.icon, icons::UNKNOWN);
    }

    #[test]
    fn every_known_route_has_at_least_one_effect() {
        let frames = [
            r#"{"type":"lock_status"}"#,
            r#"{"type":"heartbeat"}"#,
            r#"{"type":"session_status"}"#,
            r#"{"type":"agent_turn"}"#,
            r#"{"type":"cron_job"}"#,
            r#"{"type":"web_search"}"#,
            r#"{"type":"system_event"}"#,
            r#"{"type":"other"}"#,
        ];
        for raw in frames {
            let message = decode_message(raw, DEFAULT_MAX_FRAME_BYTES).expect("decode");
            let routing = route(message);
            assert!(routing.update.is_some() || routing.activity.is_some(), "{raw}");
        }
    }
}
