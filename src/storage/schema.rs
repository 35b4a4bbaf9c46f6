//! Table layout and aggregate row shapes
//!
//! ## Tiers
//!
//! Every metric family is stored in two tables:
//!
//! - a **raw** table filled by the realtime checks (`cpu`, `traffic`, ...)
//! - a **per-hour** table filled by the hourly rollup checks
//!   (`cpu_per_hour`, `traffic_per_hour`, ...)
//!
//! The per-day tier is never persisted. Daily checks read the per-hour
//! table, forward the aggregate to the buffer and purge the rows they read.
//!
//! ## Aggregates
//!
//! Aggregate queries return one [`QuerySet`] per group. Values are always
//! floating point because `AVG` is; narrowing to the unsigned counters of
//! the result model happens in [`CheckResult::from_query_set`].
//!
//! [`CheckResult::from_query_set`]: crate::checks::CheckResult::from_query_set

use std::fmt;

use crate::checks::types::{CheckType, MetricFamily};

/// A table backing the raw or per-hour tier of one metric family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Cpu,
    CpuPerHour,
    Memory,
    MemoryPerHour,
    DiskUsage,
    DiskUsagePerHour,
    DiskIo,
    DiskIoPerHour,
    Traffic,
    TrafficPerHour,
}

impl Table {
    /// Every table, raw tiers first
    pub const ALL: [Table; 10] = [
        Table::Cpu,
        Table::Memory,
        Table::DiskUsage,
        Table::DiskIo,
        Table::Traffic,
        Table::CpuPerHour,
        Table::MemoryPerHour,
        Table::DiskUsagePerHour,
        Table::DiskIoPerHour,
        Table::TrafficPerHour,
    ];

    /// SQL table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::Cpu => "cpu",
            Table::CpuPerHour => "cpu_per_hour",
            Table::Memory => "memory",
            Table::MemoryPerHour => "memory_per_hour",
            Table::DiskUsage => "disk_usage",
            Table::DiskUsagePerHour => "disk_usage_per_hour",
            Table::DiskIo => "disk_io",
            Table::DiskIoPerHour => "disk_io_per_hour",
            Table::Traffic => "traffic",
            Table::TrafficPerHour => "traffic_per_hour",
        }
    }

    /// The table rows of `check_type` are stored in, if that tier is persisted
    pub fn for_check_type(check_type: CheckType) -> Option<Table> {
        let family = check_type.family()?;
        match check_type {
            t if t == family.raw_type() => Some(family.raw_table()),
            t if t == family.hourly_type() => Some(family.hourly_table()),
            _ => None,
        }
    }

    /// The check type whose records live in this table
    pub fn check_type(&self) -> CheckType {
        let family = self.family();
        if self.is_per_hour() {
            family.hourly_type()
        } else {
            family.raw_type()
        }
    }

    pub fn family(&self) -> MetricFamily {
        match self {
            Table::Cpu | Table::CpuPerHour => MetricFamily::Cpu,
            Table::Memory | Table::MemoryPerHour => MetricFamily::Memory,
            Table::DiskUsage | Table::DiskUsagePerHour => MetricFamily::DiskUsage,
            Table::DiskIo | Table::DiskIoPerHour => MetricFamily::DiskIo,
            Table::Traffic | Table::TrafficPerHour => MetricFamily::Net,
        }
    }

    pub fn is_per_hour(&self) -> bool {
        matches!(
            self,
            Table::CpuPerHour
                | Table::MemoryPerHour
                | Table::DiskUsagePerHour
                | Table::DiskIoPerHour
                | Table::TrafficPerHour
        )
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Max and mean of a single usage percentage (cpu, memory)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageQuerySet {
    pub max: f64,
    pub avg: f64,
}

/// Usage aggregate grouped by device and mount point
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskUsageQuerySet {
    pub device: String,
    pub mount_point: String,
    pub max: f64,
    pub avg: f64,
}

/// Read/write aggregate grouped by device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskIoQuerySet {
    pub device: String,
    pub peak_read_bytes: f64,
    pub peak_write_bytes: f64,
    pub avg_read_bytes: f64,
    pub avg_write_bytes: f64,
}

/// Traffic aggregate grouped by interface name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficQuerySet {
    pub name: String,
    pub peak_input_pkts: f64,
    pub peak_input_bytes: f64,
    pub peak_output_pkts: f64,
    pub peak_output_bytes: f64,
    pub avg_input_pkts: f64,
    pub avg_input_bytes: f64,
    pub avg_output_pkts: f64,
    pub avg_output_bytes: f64,
}

/// One row of a windowed group aggregate
#[derive(Debug, Clone, PartialEq)]
pub enum QuerySet {
    Usage(UsageQuerySet),
    DiskUsage(DiskUsageQuerySet),
    DiskIo(DiskIoQuerySet),
    Traffic(TrafficQuerySet),
}
