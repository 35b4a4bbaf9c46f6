//! Metrics collection core of the host agent
//!
//! Realtime checks sample the host and store raw rows, hourly and daily
//! checks roll them up and purge what they consumed, and every outcome
//! lands in a success or failure queue drained by the uplink.

pub mod checks;
pub mod collect;
pub mod config;
pub mod facts;
pub mod scheduler;
pub mod storage;
pub mod uplink;
pub mod util;

pub use checks::{
    CheckBuffer, CheckError, CheckOutcome, CheckResult, CheckStrategy, CheckType, MetricData,
};
pub use scheduler::CheckScheduler;
pub use uplink::{HttpSink, LogSink, MetricSink, Uplink};
