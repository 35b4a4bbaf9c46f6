//! Host samplers feeding the realtime checks
//!
//! Each [`Sampler`] reads one metric family from the operating system via
//! `sysinfo` and returns raw records ready to be stored. Samplers keep their
//! `sysinfo` handles between calls so that rates (CPU usage, byte and packet
//! deltas) are computed against the previous sample.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod network;

use crate::checks::types::{CheckResult, MetricFamily};

pub use cpu::CpuSampler;
pub use disk::{DiskIoSampler, DiskUsageSampler};
pub use memory::MemorySampler;
pub use network::NetworkSampler;

/// Reads one raw sample of a metric family
///
/// Sampling is synchronous and may block briefly; callers run it on a
/// blocking thread.
pub trait Sampler: Send {
    fn family(&self) -> MetricFamily;

    /// Take a sample. Every record carries the fields owned by the family's
    /// raw check type.
    fn sample(&mut self) -> anyhow::Result<Vec<CheckResult>>;
}

/// The `sysinfo` backed sampler of `family`
pub fn sampler_for(family: MetricFamily) -> Box<dyn Sampler> {
    match family {
        MetricFamily::Cpu => Box::new(CpuSampler::new()),
        MetricFamily::Memory => Box::new(MemorySampler::new()),
        MetricFamily::DiskUsage => Box::new(DiskUsageSampler::new()),
        MetricFamily::DiskIo => Box::new(DiskIoSampler::new()),
        MetricFamily::Net => Box::new(NetworkSampler::new()),
    }
}

/// Percentage of `part` in `total`, `None` when `total` is zero
pub(crate) fn percent(part: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| part as f64 / total as f64 * 100.0)
}
