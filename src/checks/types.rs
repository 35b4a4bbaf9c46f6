//! Records flowing through the check pipeline
//!
//! [`CheckResult`] is a wide record shared by every metric family. Only the
//! fields owned by the record's [`CheckType`] are populated, everything else
//! stays at its zero value and is left out of the serialized form.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CheckError;
use crate::storage::schema::{QuerySet, Table};

/// Tag of every metric family and aggregation tier, plus the cleanup sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Cpu,
    CpuPerHour,
    CpuPerDay,
    Memory,
    MemoryPerHour,
    MemoryPerDay,
    DiskUsage,
    DiskUsagePerHour,
    DiskUsagePerDay,
    DiskIo,
    DiskIoPerHour,
    DiskIoPerDay,
    Net,
    NetPerHour,
    NetPerDay,
    Cleanup,
}

/// Aggregation tier of a check type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Raw,
    PerHour,
    PerDay,
}

impl CheckType {
    pub const ALL: [CheckType; 16] = [
        CheckType::Cpu,
        CheckType::CpuPerHour,
        CheckType::CpuPerDay,
        CheckType::Memory,
        CheckType::MemoryPerHour,
        CheckType::MemoryPerDay,
        CheckType::DiskUsage,
        CheckType::DiskUsagePerHour,
        CheckType::DiskUsagePerDay,
        CheckType::DiskIo,
        CheckType::DiskIoPerHour,
        CheckType::DiskIoPerDay,
        CheckType::Net,
        CheckType::NetPerHour,
        CheckType::NetPerDay,
        CheckType::Cleanup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Cpu => "cpu",
            CheckType::CpuPerHour => "cpu_per_hour",
            CheckType::CpuPerDay => "cpu_per_day",
            CheckType::Memory => "memory",
            CheckType::MemoryPerHour => "memory_per_hour",
            CheckType::MemoryPerDay => "memory_per_day",
            CheckType::DiskUsage => "disk_usage",
            CheckType::DiskUsagePerHour => "disk_usage_per_hour",
            CheckType::DiskUsagePerDay => "disk_usage_per_day",
            CheckType::DiskIo => "disk_io",
            CheckType::DiskIoPerHour => "disk_io_per_hour",
            CheckType::DiskIoPerDay => "disk_io_per_day",
            CheckType::Net => "net",
            CheckType::NetPerHour => "net_per_hour",
            CheckType::NetPerDay => "net_per_day",
            CheckType::Cleanup => "cleanup",
        }
    }

    /// Metric family, `None` for [`CheckType::Cleanup`]
    pub fn family(&self) -> Option<MetricFamily> {
        match self {
            CheckType::Cpu | CheckType::CpuPerHour | CheckType::CpuPerDay => {
                Some(MetricFamily::Cpu)
            }
            CheckType::Memory | CheckType::MemoryPerHour | CheckType::MemoryPerDay => {
                Some(MetricFamily::Memory)
            }
            CheckType::DiskUsage | CheckType::DiskUsagePerHour | CheckType::DiskUsagePerDay => {
                Some(MetricFamily::DiskUsage)
            }
            CheckType::DiskIo | CheckType::DiskIoPerHour | CheckType::DiskIoPerDay => {
                Some(MetricFamily::DiskIo)
            }
            CheckType::Net | CheckType::NetPerHour | CheckType::NetPerDay => {
                Some(MetricFamily::Net)
            }
            CheckType::Cleanup => None,
        }
    }

    /// Aggregation tier, `None` for [`CheckType::Cleanup`]
    pub fn tier(&self) -> Option<Tier> {
        match self {
            CheckType::Cpu
            | CheckType::Memory
            | CheckType::DiskUsage
            | CheckType::DiskIo
            | CheckType::Net => Some(Tier::Raw),
            CheckType::CpuPerHour
            | CheckType::MemoryPerHour
            | CheckType::DiskUsagePerHour
            | CheckType::DiskIoPerHour
            | CheckType::NetPerHour => Some(Tier::PerHour),
            CheckType::CpuPerDay
            | CheckType::MemoryPerDay
            | CheckType::DiskUsagePerDay
            | CheckType::DiskIoPerDay
            | CheckType::NetPerDay => Some(Tier::PerDay),
            CheckType::Cleanup => None,
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric family. Each family has one check type per tier and two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricFamily {
    Cpu,
    Memory,
    DiskUsage,
    DiskIo,
    Net,
}

impl MetricFamily {
    pub const ALL: [MetricFamily; 5] = [
        MetricFamily::Cpu,
        MetricFamily::Memory,
        MetricFamily::DiskUsage,
        MetricFamily::DiskIo,
        MetricFamily::Net,
    ];

    pub fn raw_type(&self) -> CheckType {
        match self {
            MetricFamily::Cpu => CheckType::Cpu,
            MetricFamily::Memory => CheckType::Memory,
            MetricFamily::DiskUsage => CheckType::DiskUsage,
            MetricFamily::DiskIo => CheckType::DiskIo,
            MetricFamily::Net => CheckType::Net,
        }
    }

    pub fn hourly_type(&self) -> CheckType {
        match self {
            MetricFamily::Cpu => CheckType::CpuPerHour,
            MetricFamily::Memory => CheckType::MemoryPerHour,
            MetricFamily::DiskUsage => CheckType::DiskUsagePerHour,
            MetricFamily::DiskIo => CheckType::DiskIoPerHour,
            MetricFamily::Net => CheckType::NetPerHour,
        }
    }

    pub fn daily_type(&self) -> CheckType {
        match self {
            MetricFamily::Cpu => CheckType::CpuPerDay,
            MetricFamily::Memory => CheckType::MemoryPerDay,
            MetricFamily::DiskUsage => CheckType::DiskUsagePerDay,
            MetricFamily::DiskIo => CheckType::DiskIoPerDay,
            MetricFamily::Net => CheckType::NetPerDay,
        }
    }

    pub fn raw_table(&self) -> Table {
        match self {
            MetricFamily::Cpu => Table::Cpu,
            MetricFamily::Memory => Table::Memory,
            MetricFamily::DiskUsage => Table::DiskUsage,
            MetricFamily::DiskIo => Table::DiskIo,
            MetricFamily::Net => Table::Traffic,
        }
    }

    pub fn hourly_table(&self) -> Table {
        match self {
            MetricFamily::Cpu => Table::CpuPerHour,
            MetricFamily::Memory => Table::MemoryPerHour,
            MetricFamily::DiskUsage => Table::DiskUsagePerHour,
            MetricFamily::DiskIo => Table::DiskIoPerHour,
            MetricFamily::Net => Table::TrafficPerHour,
        }
    }
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

/// One data point of any metric family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub usage: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub device: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mount_point: String,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub total: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub free: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub used: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub write_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub read_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub input_pkts: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub input_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub output_pkts: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub output_bytes: u64,

    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub peak_usage: f64,
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub avg_usage: f64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub peak_write_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub peak_read_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub avg_write_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub avg_read_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub peak_input_pkts: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub peak_input_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub peak_output_pkts: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub peak_output_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub avg_input_pkts: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub avg_input_bytes: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub avg_output_pkts: u64,
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub avg_output_bytes: u64,
}

/// Narrow a floating aggregate to an unsigned counter, dropping the fraction
pub fn narrow_counter(check_type: CheckType, field: &str, value: f64) -> Result<u64, CheckError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CheckError::MappingInvariantViolation {
            check_type,
            reason: format!("{field} is not a valid counter: {value}"),
        });
    }
    Ok(value.trunc() as u64)
}

fn checked_usage(check_type: CheckType, field: &str, value: f64) -> Result<f64, CheckError> {
    if !value.is_finite() {
        return Err(CheckError::MappingInvariantViolation {
            check_type,
            reason: format!("{field} is not finite"),
        });
    }
    Ok(value)
}

fn require_key(check_type: CheckType, field: &str, value: &str) -> Result<String, CheckError> {
    if value.is_empty() {
        return Err(CheckError::MappingInvariantViolation {
            check_type,
            reason: format!("empty group key `{field}`"),
        });
    }
    Ok(value.to_string())
}

impl CheckResult {
    /// Map one aggregate row into the rollup fields owned by `check_type`
    ///
    /// Only per-hour and per-day check types accept aggregate rows, and the
    /// row shape has to belong to the check type's family.
    pub fn from_query_set(
        check_type: CheckType,
        query_set: &QuerySet,
        timestamp: DateTime<Utc>,
    ) -> Result<CheckResult, CheckError> {
        let violation = |reason: &str| CheckError::MappingInvariantViolation {
            check_type,
            reason: reason.to_string(),
        };

        if !matches!(check_type.tier(), Some(Tier::PerHour | Tier::PerDay)) {
            return Err(violation("aggregate rows only map to rollup tiers"));
        }

        let result = match (check_type.family(), query_set) {
            (Some(MetricFamily::Cpu | MetricFamily::Memory), QuerySet::Usage(row)) => {
                CheckResult {
                    timestamp,
                    peak_usage: checked_usage(check_type, "peak_usage", row.max)?,
                    avg_usage: checked_usage(check_type, "avg_usage", row.avg)?,
                    ..Default::default()
                }
            }
            (Some(MetricFamily::DiskUsage), QuerySet::DiskUsage(row)) => CheckResult {
                timestamp,
                device: require_key(check_type, "device", &row.device)?,
                mount_point: row.mount_point.clone(),
                peak_usage: checked_usage(check_type, "peak_usage", row.max)?,
                avg_usage: checked_usage(check_type, "avg_usage", row.avg)?,
                ..Default::default()
            },
            (Some(MetricFamily::DiskIo), QuerySet::DiskIo(row)) => CheckResult {
                timestamp,
                device: require_key(check_type, "device", &row.device)?,
                peak_read_bytes: narrow_counter(check_type, "peak_read_bytes", row.peak_read_bytes)?,
                peak_write_bytes: narrow_counter(
                    check_type,
                    "peak_write_bytes",
                    row.peak_write_bytes,
                )?,
                avg_read_bytes: narrow_counter(check_type, "avg_read_bytes", row.avg_read_bytes)?,
                avg_write_bytes: narrow_counter(check_type, "avg_write_bytes", row.avg_write_bytes)?,
                ..Default::default()
            },
            (Some(MetricFamily::Net), QuerySet::Traffic(row)) => CheckResult {
                timestamp,
                name: require_key(check_type, "name", &row.name)?,
                peak_input_pkts: narrow_counter(check_type, "peak_input_pkts", row.peak_input_pkts)?,
                peak_input_bytes: narrow_counter(
                    check_type,
                    "peak_input_bytes",
                    row.peak_input_bytes,
                )?,
                peak_output_pkts: narrow_counter(
                    check_type,
                    "peak_output_pkts",
                    row.peak_output_pkts,
                )?,
                peak_output_bytes: narrow_counter(
                    check_type,
                    "peak_output_bytes",
                    row.peak_output_bytes,
                )?,
                avg_input_pkts: narrow_counter(check_type, "avg_input_pkts", row.avg_input_pkts)?,
                avg_input_bytes: narrow_counter(check_type, "avg_input_bytes", row.avg_input_bytes)?,
                avg_output_pkts: narrow_counter(check_type, "avg_output_pkts", row.avg_output_pkts)?,
                avg_output_bytes: narrow_counter(
                    check_type,
                    "avg_output_bytes",
                    row.avg_output_bytes,
                )?,
                ..Default::default()
            },
            _ => return Err(violation("row shape does not belong to this check type")),
        };

        Ok(result)
    }
}

/// Unit crossing the buffer boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricData {
    #[serde(rename = "type")]
    pub check_type: CheckType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<CheckResult>,
}

impl MetricData {
    pub fn new(check_type: CheckType, data: Vec<CheckResult>) -> Self {
        Self { check_type, data }
    }

    /// A cycle that ran but produced nothing
    pub fn empty(check_type: CheckType) -> Self {
        Self::new(check_type, Vec::new())
    }
}
