//! Check execution pipeline
//!
//! Every periodic unit of work (sampling, rollup, retention) is a check
//! implementing [`CheckStrategy`]. Checks share a [`BaseCheck`] for their
//! accessors, run their storage phases through the [`retry`] executor and
//! deliver their outcome to the [`CheckBuffer`].
//!
//! ## Routing
//!
//! | check    | failure before delivery        | queue              |
//! |----------|--------------------------------|--------------------|
//! | realtime | sample or save                 | failure            |
//! | hourly   | get, save or delete            | none (aborted)     |
//! | daily    | get                            | none (aborted)     |
//! | daily    | delete                         | failure            |
//! | cleanup  | any                            | never enqueues     |
//!
//! Cancellation never enqueues anything.

pub mod base;
pub mod batch;
pub mod buffer;
pub mod cleanup;
pub mod error;
pub mod realtime;
pub mod registry;
pub mod retry;
pub mod types;

pub use base::{BaseCheck, CheckArgs, CheckOutcome, CheckStrategy};
pub use batch::{DailyCheck, HourlyCheck};
pub use buffer::{BufferError, BufferReceivers, CheckBuffer, Queue};
pub use cleanup::CleanupCheck;
pub use error::{CheckError, Phase};
pub use realtime::RealtimeCheck;
pub use registry::{CheckSettings, build_checks, default_interval};
pub use retry::{RetryError, RetryPolicy, retry};
pub use types::{CheckResult, CheckType, MetricData, MetricFamily, Tier};
