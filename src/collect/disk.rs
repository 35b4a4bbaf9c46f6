use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sysinfo::Disks;

use super::{Sampler, percent};
use crate::checks::types::{CheckResult, MetricFamily};

/// Space usage of every mounted disk
pub struct DiskUsageSampler {
    disks: Disks,
}

impl DiskUsageSampler {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for DiskUsageSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for DiskUsageSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::DiskUsage
    }

    fn sample(&mut self) -> anyhow::Result<Vec<CheckResult>> {
        self.disks.refresh(true);
        let now = Utc::now();

        let results = self
            .disks
            .iter()
            .filter_map(|disk| {
                usage_record(
                    now,
                    disk.name().to_string_lossy().to_string(),
                    disk.mount_point().to_string_lossy().to_string(),
                    disk.total_space(),
                    disk.available_space(),
                )
            })
            .collect();

        Ok(results)
    }
}

/// Usage record of one disk, `None` for disks the rollup cannot group
fn usage_record(
    timestamp: DateTime<Utc>,
    device: String,
    mount_point: String,
    total: u64,
    free: u64,
) -> Option<CheckResult> {
    // unlabelled volumes come back without a name
    if device.is_empty() {
        return None;
    }

    let used = total.saturating_sub(free);
    // pseudo filesystems report no space at all
    let usage = percent(used, total)?;

    Some(CheckResult {
        timestamp,
        device,
        mount_point,
        usage,
        total,
        free,
        used,
        ..Default::default()
    })
}

/// Bytes read and written per disk since the previous sample
pub struct DiskIoSampler {
    disks: Disks,
}

impl DiskIoSampler {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for DiskIoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for DiskIoSampler {
    fn family(&self) -> MetricFamily {
        MetricFamily::DiskIo
    }

    fn sample(&mut self) -> anyhow::Result<Vec<CheckResult>> {
        self.disks.refresh(true);
        let now = Utc::now();

        // a device mounted several times shows up once per mount point
        let mut seen = HashSet::new();
        let results = self
            .disks
            .iter()
            .filter_map(|disk| {
                let device = disk.name().to_string_lossy().to_string();
                if device.is_empty() || !seen.insert(device.clone()) {
                    return None;
                }

                let usage = disk.usage();
                Some(CheckResult {
                    timestamp: now,
                    device,
                    read_bytes: usage.read_bytes,
                    write_bytes: usage.written_bytes,
                    ..Default::default()
                })
            })
            .collect();

        Ok(results)
    }
}
