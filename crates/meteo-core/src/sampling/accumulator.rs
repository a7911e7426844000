//! Running averages over one reporting period.

use alloc::vec::Vec;

use super::record::{EnvironmentalSummary, PeriodRecord};
use crate::sensors::bme280::{EnvironmentalReading, PhysicalReading, Status};

/// Running mean of one quantity.
///
/// The sum is kept in `f64` so that averaging many identical `f32` samples
/// returns the sample value exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAverage {
    sum: f64,
    count: u32,
}

impl RunningAverage {
    pub const fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    pub fn add(&mut self, value: f32) {
        self.sum += value as f64;
        self.count += 1;
    }

    /// Add `reading` if it holds a value.
    pub fn add_reading(&mut self, reading: &PhysicalReading) {
        if let Ok(value) = reading {
            self.add(*value);
        }
    }

    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Mean of everything added, or `None` if nothing was.
    pub fn average(&self) -> Option<f32> {
        (self.count > 0).then(|| (self.sum / self.count as f64) as f32)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Running means for one BME280.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentalAverage {
    pub temperature: RunningAverage,
    pub humidity: RunningAverage,
    pub pressure: RunningAverage,
}

impl EnvironmentalAverage {
    pub fn add(&mut self, reading: &EnvironmentalReading) {
        self.temperature.add_reading(&reading.temperature);
        self.humidity.add_reading(&reading.humidity);
        self.pressure.add_reading(&reading.pressure);
    }

    pub fn summary(&self) -> EnvironmentalSummary {
        EnvironmentalSummary {
            temperature: self.temperature.average(),
            humidity: self.humidity.average(),
            pressure: self.pressure.average(),
        }
    }
}

/// Accumulates one reporting period.
#[derive(Debug, Clone)]
pub struct PeriodAccumulator {
    environmental: Vec<EnvironmentalAverage>,
    auxiliary: RunningAverage,
    status: Status,
    samples: u32,
}

impl PeriodAccumulator {
    /// Accumulator for `environmental_sensors` BME280s plus the auxiliary
    /// channel.
    pub fn new(environmental_sensors: usize) -> Self {
        Self {
            environmental: alloc::vec![EnvironmentalAverage::default(); environmental_sensors],
            auxiliary: RunningAverage::new(),
            status: Status::OK,
            samples: 0,
        }
    }

    /// Fold in a reading of the environmental sensor at `index`. Out of range
    /// indices are ignored.
    pub fn record_environmental(&mut self, index: usize, reading: &EnvironmentalReading) {
        if let Some(average) = self.environmental.get_mut(index) {
            average.add(reading);
            self.status |= reading.status();
        }
    }

    pub fn record_auxiliary(&mut self, temperature: f32) {
        self.auxiliary.add(temperature);
    }

    /// Mark the end of one sampling iteration.
    pub fn finish_sample(&mut self) {
        self.samples += 1;
    }

    pub const fn samples(&self) -> u32 {
        self.samples
    }

    pub const fn status(&self) -> Status {
        self.status
    }

    /// Drain into a record stamped with `timestamp` and start over.
    pub fn finish(&mut self, timestamp: i64) -> PeriodRecord {
        let record = PeriodRecord {
            timestamp,
            environmental: self.environmental.iter().map(|a| a.summary()).collect(),
            auxiliary_temperature: self.auxiliary.average(),
            status: self.status,
            samples: self.samples,
        };
        self.reset();
        record
    }

    /// Throw away everything accumulated so far.
    pub fn reset(&mut self) {
        self.environmental
            .iter_mut()
            .for_each(|a| *a = EnvironmentalAverage::default());
        self.auxiliary.reset();
        self.status = Status::OK;
        self.samples = 0;
    }
}
