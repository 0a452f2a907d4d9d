use std::env;
use std::time::Duration;

use crate::normalizer::TIME_STEPS;

/// Trailing calendar days requested from the market-data source; roughly two
/// years, comfortably more than `TIME_STEPS` trading days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 730;
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_INFERENCE_TIMEOUT_MS: u64 = 5_000;

/// Tunables for [`PredictionEngine`](crate::PredictionEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub time_steps: usize,
    pub lookback_days: u32,
    pub fetch_timeout: Duration,
    /// Bounds how long a request waits for the model. An inference already
    /// running keeps its blocking thread until it returns; one still queued
    /// for the model is skipped.
    pub inference_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_steps: TIME_STEPS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            inference_timeout: Duration::from_millis(DEFAULT_INFERENCE_TIMEOUT_MS),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `STOCKPRED_LOOKBACK_DAYS`,
    /// `STOCKPRED_FETCH_TIMEOUT_MS` and `STOCKPRED_INFERENCE_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable lookup.
    /// Unparseable or zero values are ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(days) = positive::<u32>(&lookup, "STOCKPRED_LOOKBACK_DAYS") {
            config.lookback_days = days;
        }
        if let Some(ms) = positive::<u64>(&lookup, "STOCKPRED_FETCH_TIMEOUT_MS") {
            config.fetch_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = positive::<u64>(&lookup, "STOCKPRED_INFERENCE_TIMEOUT_MS") {
            config.inference_timeout = Duration::from_millis(ms);
        }

        config
    }

    pub fn with_lookback_days(mut self, lookback_days: u32) -> Self {
        self.lookback_days = lookback_days;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    pub fn with_time_steps(mut self, time_steps: usize) -> Self {
        self.time_steps = time_steps.max(1);
        self
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid configuration override");
            None
        }
    }
}
