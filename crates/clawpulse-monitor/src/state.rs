use crate::gateway::GatewayEvent;
use chrono::{DateTime, Local};
use clawpulse_core::{
    dispatch::{DispatchOutcome, Dispatcher},
    metrics::{take_sample, MetricSource},
    projection::GatewayProjection,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use url::Url;

pub struct App {
    pub endpoint: Url,
    pub projection: GatewayProjection,
    pub help_open: bool,
    dispatcher: Dispatcher,
    metrics: Box<dyn MetricSource + Send>,
    dropped_frames: u64,
    quit: bool,
}

impl App {
    pub fn new(endpoint: Url, metrics: Box<dyn MetricSource + Send>) -> Self {
        Self {
            endpoint,
            projection: GatewayProjection::new(),
            help_open: false,
            dispatcher: Dispatcher::default(),
            metrics,
            dropped_frames: 0,
            quit: false,
        }
    }

    pub fn apply_gateway_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Transition(transition) => {
                self.projection.set_connection_status(transition.state);
                if let Some(entry) = transition.activity {
                    self.projection.append_activity_log(entry);
                }
            }
            GatewayEvent::Frame(raw) => {
                let outcome = self.dispatcher.dispatch(&mut self.projection, &raw);
                if matches!(outcome, DispatchOutcome::Dropped(_)) {
                    self.dropped_frames += 1;
                }
            }
        }
    }

    pub fn sample_metrics(&mut self, at: DateTime<Local>) {
        let sample = take_sample(&mut *self.metrics, at);
        self.projection.append_metric_sample(sample);
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.help_open && key.code == KeyCode::Esc {
                    self.help_open = false;
                } else {
                    self.quit = true;
                }
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.quit = true;
            }
            KeyCode::Char('?') => {
                self.help_open = !self.help_open;
            }
            _ => {}
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }
}
