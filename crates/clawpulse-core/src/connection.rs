use crate::backoff::{format_wait, Backoff, BackoffPolicy};
use crate::{icons, ActivityLogEntry, ConnectionState, Severity};
use std::time::Duration;

/// What a lifecycle event changed: the new status, an optional activity line,
/// and, for closes only, how long to wait before the next attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: ConnectionState,
    pub activity: Option<ActivityLogEntry>,
    pub retry_in: Option<Duration>,
}

/// Reconnect state machine for one gateway endpoint.
///
/// `Connecting -> Connected -> Disconnected -> (wait) -> Connecting`, with
/// `Error` as a display state entered on transport errors. Only a close
/// schedules a retry; an error on a socket that stays open does not.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    backoff: Backoff,
    attempts: u64,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(BackoffPolicy::default())
    }
}

impl ConnectionManager {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectionState::Connecting,
            backoff: Backoff::new(policy),
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn begin_attempt(&mut self) -> Transition {
        self.attempts += 1;
        self.state = ConnectionState::Connecting;
        Transition {
            state: self.state,
            activity: None,
            retry_in: None,
        }
    }

    pub fn on_open(&mut self) -> Transition {
        self.state = ConnectionState::Connected;
        self.backoff.reset();
        Transition {
            state: self.state,
            activity: Some(ActivityLogEntry::new(
                icons::CONNECTED,
                "connected to gateway",
                Severity::Success,
            )),
            retry_in: None,
        }
    }

    pub fn on_error(&mut self, detail: &str) -> Transition {
        self.state = ConnectionState::Error;
        Transition {
            state: self.state,
            activity: Some(ActivityLogEntry::new(
                icons::TRANSPORT_ERROR,
                format!("gateway transport error: {detail}"),
                Severity::Error,
            )),
            retry_in: None,
        }
    }

    pub fn on_close(&mut self) -> Transition {
        self.state = ConnectionState::Disconnected;
        let wait = self.backoff.on_disconnect();
        Transition {
            state: self.state,
            activity: Some(ActivityLogEntry::new(
                icons::DISCONNECTED,
                format!(
                    "gateway connection closed; reconnecting in {}s",
                    format_wait(wait)
                ),
                Severity::Warning,
            )),
            retry_in: Some(wait),
        }
    }
}
