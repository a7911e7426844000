//! Text rows for a small character display.
//!
//! The core only produces strings. Whatever sits behind [`StatusDisplay`]
//! decides how to put them on a screen.

use alloc::format;

use crate::sampling::PeriodRecord;

/// Number of text rows on the panel.
pub const DISPLAY_ROWS: usize = 8;
/// Characters per row.
pub const ROW_CHARS: usize = 21;

pub type RowText = heapless::String<ROW_CHARS>;

/// Fixed row positions, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DisplayRow {
    Title = 0,
    Temperature = 1,
    Humidity = 2,
    Pressure = 3,
    Auxiliary = 4,
    Status = 5,
    Samples = 6,
    Message = 7,
}

impl DisplayRow {
    pub const ALL: [Self; DISPLAY_ROWS] = [
        Self::Title,
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::Auxiliary,
        Self::Status,
        Self::Samples,
        Self::Message,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Output-only sink for display rows.
pub trait StatusDisplay {
    fn render(&mut self, row: DisplayRow, text: &str);
}

/// Display sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDisplay;

impl StatusDisplay for NoDisplay {
    fn render(&mut self, _row: DisplayRow, _text: &str) {}
}

/// Cut `text` down to one row.
pub fn fit(text: &str) -> RowText {
    let mut row = RowText::new();
    for c in text.chars() {
        if row.push(c).is_err() {
            break;
        }
    }
    row
}

/// Rows summarising a finished period. The message row is left blank.
pub fn period_rows(record: &PeriodRecord) -> [(DisplayRow, RowText); DISPLAY_ROWS] {
    let primary = record.primary().copied().unwrap_or_default();
    let value = |label: &str, v: Option<f32>, precision: usize, unit: &str| match v {
        Some(v) => fit(&format!("{label} {v:.precision$} {unit}")),
        None => fit(&format!("{label} --- {unit}")),
    };

    [
        (DisplayRow::Title, fit("meteo-rs")),
        (DisplayRow::Temperature, value("T", primary.temperature, 2, "C")),
        (DisplayRow::Humidity, value("H", primary.humidity, 1, "%")),
        (DisplayRow::Pressure, value("P", primary.pressure, 5, "bar")),
        (
            DisplayRow::Auxiliary,
            value("Aux", record.auxiliary_temperature, 2, "C"),
        ),
        (
            DisplayRow::Status,
            fit(&format!("Status {}", record.status)),
        ),
        (
            DisplayRow::Samples,
            fit(&format!("Samples {}", record.samples)),
        ),
        (DisplayRow::Message, RowText::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::EnvironmentalSummary;
    use crate::sensors::bme280::Status;

    #[test]
    fn test_fit_truncates() {
        let row = fit("transport error: device 0x76 did not answer");
        assert_eq!(row.len(), ROW_CHARS);
        assert_eq!(row.as_str(), "transport error: devi");
        assert_eq!(fit("short").as_str(), "short");
    }

    #[test]
    fn test_period_rows() {
        let record = PeriodRecord {
            timestamp: 0,
            environmental: alloc::vec![EnvironmentalSummary {
                temperature: Some(21.456),
                humidity: None,
                pressure: Some(1.01325),
            }],
            auxiliary_temperature: Some(-3.5),
            status: Status::HUMIDITY_DISABLED,
            samples: 60,
        };

        let rows = period_rows(&record);
        for (i, (row, text)) in rows.iter().enumerate() {
            assert_eq!(row.index(), i);
            assert!(text.len() <= ROW_CHARS);
        }
        assert_eq!(rows[1].1.as_str(), "T 21.46 C");
        assert_eq!(rows[2].1.as_str(), "H --- %");
        assert_eq!(rows[3].1.as_str(), "P 1.01325 bar");
        assert_eq!(rows[4].1.as_str(), "Aux -3.50 C");
        assert_eq!(rows[5].1.as_str(), "Status 8");
    }
}
