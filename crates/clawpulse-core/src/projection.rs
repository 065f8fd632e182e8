use crate::{
    ActivityLogEntry, ConnectionState, LockBoard, LockEntry, MemoryPressure, MetricSample,
};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const ACTIVITY_LOG_CAPACITY: usize = 100;
pub const METRIC_HISTORY_CAPACITY: usize = 20;
pub const CONTEXT_CAPACITY_TOKENS: f64 = 131_000.0;

/// Render-ready state derived from gateway traffic.
///
/// Single writer: every mutation goes through the update methods below, which
/// keep the bounded rings within capacity.
#[derive(Debug, Clone)]
pub struct GatewayProjection {
    connection: ConnectionState,
    locks: LockBoard,
    memory_pct: Option<i64>,
    sub_agents: Option<u64>,
    activity: VecDeque<ActivityLogEntry>,
    metrics: VecDeque<MetricSample>,
    started_at: Instant,
}

impl Default for GatewayProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayProjection {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(started_at: Instant) -> Self {
        Self {
            connection: ConnectionState::default(),
            locks: LockBoard::default(),
            memory_pct: None,
            sub_agents: None,
            activity: VecDeque::with_capacity(ACTIVITY_LOG_CAPACITY),
            metrics: VecDeque::with_capacity(METRIC_HISTORY_CAPACITY),
            started_at,
        }
    }

    pub fn set_connection_status(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    pub fn replace_locks(&mut self, entries: Option<Vec<LockEntry>>) {
        self.locks = LockBoard::from_snapshot(entries);
    }

    /// Stores `round(raw / 131000 * 100)`. Values above 100 are kept as-is.
    pub fn update_memory_pct(&mut self, raw_usage: f64) -> i64 {
        let pct = memory_pct(raw_usage, CONTEXT_CAPACITY_TOKENS);
        self.memory_pct = Some(pct);
        pct
    }

    pub fn update_sub_agent_count(&mut self, count: u64) {
        self.sub_agents = Some(count);
    }

    pub fn append_activity_log(&mut self, entry: ActivityLogEntry) {
        push_bounded(&mut self.activity, entry, ACTIVITY_LOG_CAPACITY);
    }

    pub fn append_metric_sample(&mut self, sample: MetricSample) {
        push_bounded(&mut self.metrics, sample, METRIC_HISTORY_CAPACITY);
    }

    pub fn connection_status(&self) -> ConnectionState {
        self.connection
    }

    pub fn locks(&self) -> &LockBoard {
        &self.locks
    }

    pub fn memory_pct(&self) -> Option<i64> {
        self.memory_pct
    }

    pub fn memory_pressure(&self) -> MemoryPressure {
        MemoryPressure::from_pct(self.memory_pct.unwrap_or(0))
    }

    pub fn sub_agent_count(&self) -> Option<u64> {
        self.sub_agents
    }

    pub fn activity_log(&self) -> impl DoubleEndedIterator<Item = &ActivityLogEntry> + '_ {
        self.activity.iter()
    }

    pub fn activity_len(&self) -> usize {
        self.activity.len()
    }

    pub fn metric_history(&self) -> impl DoubleEndedIterator<Item = &MetricSample> + '_ {
        self.metrics.iter()
    }

    pub fn metric_len(&self) -> usize {
        self.metrics.len()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn format_uptime(&self) -> String {
        format_uptime(self.uptime())
    }
}

pub fn memory_pct(raw_usage: f64, capacity: f64) -> i64 {
    if !raw_usage.is_finite() || capacity <= 0.0 {
        return 0;
    }
    (raw_usage / capacity * 100.0).round() as i64
}

pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, capacity: usize) {
    ring.push_back(item);
    while ring.len() > capacity {
        ring.pop_front();
    }
}
