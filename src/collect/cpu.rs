use chrono::Utc;
use sysinfo::System;

use super::Sampler;
use crate::checks::types::{CheckResult, MetricFamily};

/// Global CPU usage in percent across all cores
pub struct CpuSampler {
    system: System,
}

impl CpuSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        // usage is a delta, the first refresh only primes the counters
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for CpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for CpuSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Cpu
    }

    fn sample(&mut self) -> anyhow::Result<Vec<CheckResult>> {
        self.system.refresh_cpu_usage();

        let usage = self.system.global_cpu_usage() as f64;
        if !usage.is_finite() {
            anyhow::bail!("cpu usage is not a number");
        }

        Ok(vec![CheckResult {
            timestamp: Utc::now(),
            usage,
            ..Default::default()
        }])
    }
}
