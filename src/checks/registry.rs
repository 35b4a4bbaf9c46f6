//! Construction of the full check set

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::base::{CheckArgs, CheckStrategy};
use super::batch::{DailyCheck, HourlyCheck};
use super::buffer::CheckBuffer;
use super::cleanup::{CleanupCheck, DEFAULT_RETENTION_HOURS};
use super::realtime::RealtimeCheck;
use super::retry::RetryPolicy;
use super::types::{CheckType, MetricFamily, Tier};
use crate::storage::MetricStore;

/// Everything configurable about the checks
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub policy: RetryPolicy,
    pub retention: chrono::Duration,
    /// Interval overrides, anything missing runs at [`default_interval`]
    pub intervals: HashMap<CheckType, Duration>,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            retention: chrono::Duration::hours(DEFAULT_RETENTION_HOURS.into()),
            intervals: HashMap::new(),
        }
    }
}

impl CheckSettings {
    pub fn interval(&self, check_type: CheckType) -> Duration {
        self.intervals
            .get(&check_type)
            .copied()
            .unwrap_or_else(|| default_interval(check_type))
    }
}

pub fn default_interval(check_type: CheckType) -> Duration {
    match check_type.tier() {
        Some(Tier::Raw) => Duration::from_secs(60),
        Some(Tier::PerHour) => Duration::from_secs(60 * 60),
        Some(Tier::PerDay) => Duration::from_secs(24 * 60 * 60),
        None => Duration::from_secs(60 * 60),
    }
}

/// Realtime, hourly and daily checks for every family plus the cleanup check
pub fn build_checks(
    settings: &CheckSettings,
    buffer: &CheckBuffer,
    store: Arc<dyn MetricStore>,
) -> Vec<Arc<dyn CheckStrategy>> {
    let args = |check_type: CheckType| CheckArgs {
        name: check_type.to_string(),
        interval: settings.interval(check_type),
        buffer: buffer.clone(),
        store: Arc::clone(&store),
    };

    let mut checks: Vec<Arc<dyn CheckStrategy>> = Vec::with_capacity(MetricFamily::ALL.len() * 3 + 1);

    for family in MetricFamily::ALL {
        checks.push(Arc::new(RealtimeCheck::new(
            family,
            args(family.raw_type()),
            settings.policy.clone(),
        )));
        checks.push(Arc::new(HourlyCheck::new(
            family,
            args(family.hourly_type()),
            settings.policy.clone(),
        )));
        checks.push(Arc::new(DailyCheck::new(
            family,
            args(family.daily_type()),
            settings.policy.clone(),
        )));
    }

    checks.push(Arc::new(CleanupCheck::new(
        args(CheckType::Cleanup),
        settings.policy.clone(),
        settings.retention,
    )));

    debug!("built {} checks", checks.len());
    checks
}
