//! The averaged record emitted at the end of each period.

use alloc::vec::Vec;
use core::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use crate::sensors::bme280::Status;

/// Period means for one BME280. `None` when no sample of that quantity
/// succeeded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvironmentalSummary {
    /// Degrees Celsius.
    pub temperature: Option<f32>,
    /// Percent relative humidity.
    pub humidity: Option<f32>,
    /// Bar.
    pub pressure: Option<f32>,
}

/// Everything emitted at the end of one reporting period.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PeriodRecord {
    /// Unix seconds at the end of the period.
    pub timestamp: i64,
    /// One entry per configured BME280, in configuration order.
    pub environmental: Vec<EnvironmentalSummary>,
    /// Degrees Celsius.
    pub auxiliary_temperature: Option<f32>,
    /// Union of every channel fault seen during the period.
    pub status: Status,
    /// Sampling iterations that completed.
    pub samples: u32,
}

impl PeriodRecord {
    /// The first configured BME280.
    pub fn primary(&self) -> Option<&EnvironmentalSummary> {
        self.environmental.first()
    }

    /// Write the tab-separated fields that follow the timestamp:
    ///
    /// `temperature, humidity, pressure, auxiliary, status` for the primary
    /// sensor, then `temperature, humidity, pressure` for each further one.
    /// Missing values print as `nan`.
    pub fn write_fields<W: Write>(&self, out: &mut W) -> fmt::Result {
        let primary = self.primary().copied().unwrap_or_default();
        write_value(out, primary.temperature)?;
        out.write_char('\t')?;
        write_value(out, primary.humidity)?;
        out.write_char('\t')?;
        write_value(out, primary.pressure)?;
        out.write_char('\t')?;
        write_value(out, self.auxiliary_temperature)?;
        write!(out, "\t{}", self.status)?;

        for extra in self.environmental.iter().skip(1) {
            for value in [extra.temperature, extra.humidity, extra.pressure] {
                out.write_char('\t')?;
                write_value(out, value)?;
            }
        }
        Ok(())
    }
}

fn write_value<W: Write>(out: &mut W, value: Option<f32>) -> fmt::Result {
    match value {
        Some(v) => write!(out, "{:.6}", v),
        None => out.write_str("nan"),
    }
}
