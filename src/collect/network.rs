use chrono::Utc;
use sysinfo::Networks;

use super::Sampler;
use crate::checks::types::{CheckResult, MetricFamily};

/// Packets and bytes per interface since the previous sample
pub struct NetworkSampler {
    networks: Networks,
}

impl NetworkSampler {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }
}

impl Default for NetworkSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for NetworkSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::Net
    }

    fn sample(&mut self) -> anyhow::Result<Vec<CheckResult>> {
        self.networks.refresh(true);
        let now = Utc::now();

        let mut results: Vec<CheckResult> = self
            .networks
            .iter()
            .map(|(name, data)| CheckResult {
                timestamp: now,
                name: name.clone(),
                input_pkts: data.packets_received(),
                input_bytes: data.received(),
                output_pkts: data.packets_transmitted(),
                output_bytes: data.transmitted(),
                ..Default::default()
            })
            .collect();
        results.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(results)
    }
}
