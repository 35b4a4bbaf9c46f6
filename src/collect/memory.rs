use chrono::Utc;
use sysinfo::System;

use super::{Sampler, percent};
use crate::checks::types::{CheckResult, MetricFamily};

pub struct MemorySampler {
    system: System,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for MemorySampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Memory
    }

    fn sample(&mut self) -> anyhow::Result<Vec<CheckResult>> {
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let Some(usage) = percent(used, total) else {
            anyhow::bail!("total memory reported as zero");
        };

        Ok(vec![CheckResult {
            timestamp: Utc::now(),
            usage,
            total,
            free: self.system.free_memory(),
            used,
            ..Default::default()
        }])
    }
}
