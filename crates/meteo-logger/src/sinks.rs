//! File-backed record and error sinks, plus a display that renders through
//! `log`.
//!
//! Both files are opened in append mode for every line, so they can be
//! rotated or removed while the logger runs.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use log::info;
use meteo_core::display::{DisplayRow, StatusDisplay};
use meteo_core::sampling::PeriodRecord;
use meteo_core::supervisor::{ErrorSink, RecordSink};

const CTIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// `ctime(3)` layout without the trailing newline, e.g.
/// `Thu Jan  1 00:00:00 1970`.
pub fn ctime<Tz>(timestamp: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_opt(timestamp, 0).single() {
        Some(time) => time.format(CTIME_FORMAT).to_string(),
        None => timestamp.to_string(),
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

/// One tab-separated line per period.
#[derive(Debug, Clone)]
pub struct TsvFileSink<Tz = Local> {
    path: PathBuf,
    echo: bool,
    tz: Tz,
}

impl TsvFileSink<Local> {
    pub fn new(path: impl Into<PathBuf>, echo: bool) -> Self {
        Self {
            path: path.into(),
            echo,
            tz: Local,
        }
    }
}

impl<Tz> TsvFileSink<Tz>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    pub fn with_timezone<T: TimeZone>(self, tz: T) -> TsvFileSink<T> {
        TsvFileSink {
            path: self.path,
            echo: self.echo,
            tz,
        }
    }

    pub fn format(&self, record: &PeriodRecord) -> String {
        let mut line = ctime(record.timestamp, &self.tz);
        line.push('\t');
        // Writing into a String cannot fail.
        let _ = record.write_fields(&mut line);
        line
    }
}

impl<Tz> RecordSink for TsvFileSink<Tz>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    type Error = io::Error;

    fn append(&mut self, record: &PeriodRecord) -> io::Result<()> {
        let line = self.format(record);
        if self.echo {
            println!("{}", line);
        }
        append_line(&self.path, &line)
    }
}

/// One `timestamp - message` line per fault.
#[derive(Debug, Clone)]
pub struct ErrorFileSink<Tz = Local> {
    path: PathBuf,
    tz: Tz,
}

impl ErrorFileSink<Local> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tz: Local,
        }
    }
}

impl<Tz> ErrorFileSink<Tz> {
    pub fn with_timezone<T: TimeZone>(self, tz: T) -> ErrorFileSink<T> {
        ErrorFileSink {
            path: self.path,
            tz,
        }
    }
}

impl<Tz> ErrorSink for ErrorFileSink<Tz>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    type Error = io::Error;

    fn report(&mut self, timestamp: i64, message: &str) -> io::Result<()> {
        append_line(
            &self.path,
            &format!("{} - {}", ctime(timestamp, &self.tz), message),
        )
    }
}

/// Display rows rendered as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDisplay;

impl StatusDisplay for LogDisplay {
    fn render(&mut self, row: DisplayRow, text: &str) {
        if !text.is_empty() {
            info!(target: "meteo_logger::display", "[{}] {}", row.index(), text);
        }
    }
}
