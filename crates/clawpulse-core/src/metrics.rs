use crate::MetricSample;
use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SAMPLE_LABEL_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricReadings {
    pub cpu_pct: f64,
    pub memory_pct: f64,
    pub token_pct: f64,
}

/// Supplies one reading per sample tick. The gateway does not publish host
/// telemetry yet, so the monitor ships with [`SyntheticMetrics`].
pub trait MetricSource {
    fn read(&mut self) -> MetricReadings;
}

/// Placeholder readings: cpu in `[0, 100)`, memory in `[10, 60]`, tokens in
/// `[5, 35]`, the latter two whole percentages.
pub struct SyntheticMetrics {
    rng: StdRng,
}

impl Default for SyntheticMetrics {
    fn default() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl SyntheticMetrics {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl MetricSource for SyntheticMetrics {
    fn read(&mut self) -> MetricReadings {
        MetricReadings {
            cpu_pct: self.rng.gen_range(0.0..100.0),
            memory_pct: (self.rng.gen_range(0.0..50.0) + 10.0_f64).round(),
            token_pct: (self.rng.gen_range(0.0..30.0) + 5.0_f64).round(),
        }
    }
}

pub fn take_sample(source: &mut dyn MetricSource, at: DateTime<Local>) -> MetricSample {
    let readings = source.read();
    MetricSample {
        label: at.format(SAMPLE_LABEL_FORMAT).to_string(),
        cpu_pct: readings.cpu_pct,
        memory_pct: readings.memory_pct,
        token_pct: readings.token_pct,
    }
}
