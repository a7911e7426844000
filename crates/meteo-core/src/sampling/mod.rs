//! Per-period averaging of sensor readings.
//!
//! Each sampling iteration feeds its readings into a [`PeriodAccumulator`].
//! At the end of the reporting period the accumulator is drained into a
//! [`PeriodRecord`], which is what the log and display sinks receive.

pub mod accumulator;
pub mod record;

pub use accumulator::{EnvironmentalAverage, PeriodAccumulator, RunningAverage};
pub use record::{EnvironmentalSummary, PeriodRecord};
