//! Reading recent lines back out of the period log.
//!
//! The log is walked from its newest line backwards and the walk stops at
//! the first line that is not newer than the requested date, so a query
//! for the last few hours never parses the whole history.

use std::fs;
use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::path::Path;

use chrono::NaiveDateTime;
use log::warn;

use crate::config::HostError;

const CTIME_PARSE_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

/// Parse a `ctime(3)` style date such as `Tue Nov 14 22:13:20 2023`.
pub fn parse_ctime(text: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(text.trim(), CTIME_PARSE_FORMAT)
        .map_err(|e| format!("expected a date like \"Tue Nov 14 22:13:20 2023\": {}", e))
}

/// Which log lines to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    /// Only lines strictly newer than this.
    pub since: NaiveDateTime,
    /// Only lines strictly older than this.
    pub until: Option<NaiveDateTime>,
    /// Keep one line out of every `every`, counted from the newest.
    pub every: NonZeroUsize,
}

impl LogQuery {
    /// Matching lines of `text`, newest first.
    pub fn select<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut selected = Vec::new();

        for (index, line) in text.lines().rev().enumerate() {
            if index % self.every.get() != 0 {
                continue;
            }
            let stamp = line.split('\t').next().unwrap_or_default();
            let Ok(time) = parse_ctime(stamp) else {
                warn!("Skipping log line without a timestamp: {:?}", line);
                continue;
            };
            if time <= self.since {
                break;
            }
            if self.until.is_none_or(|until| time < until) {
                selected.push(line);
            }
        }

        selected
    }

    /// Print the matching lines of the log at `path` to `out`. Returns the
    /// number of lines printed.
    pub fn print(&self, path: &Path, out: &mut impl Write) -> Result<usize, HostError> {
        let text = fs::read_to_string(path).map_err(|e| HostError::ReadLog {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let lines = self.select(&text);
        write_lines(out, &lines).map_err(|e| HostError::WriteOutput {
            message: e.to_string(),
        })?;
        Ok(lines.len())
    }
}

fn write_lines(out: &mut impl Write, lines: &[&str]) -> io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const LOG: &str = "\
Tue Nov 14 22:10:00 2023\t21.000000\t45.000000\t1.010000\t18.000000\t0
Tue Nov 14 22:11:00 2023\t21.100000\t45.100000\t1.010100\t18.100000\t0
Tue Nov 14 22:12:00 2023\t21.200000\t45.200000\t1.010200\t18.200000\t0
Tue Nov 14 22:13:00 2023\t21.300000\tnan\t1.010300\t18.300000\t8
Tue Nov 14 22:14:00 2023\t21.400000\t45.400000\t1.010400\t18.400000\t0
";

    fn at(text: &str) -> NaiveDateTime {
        parse_ctime(text).unwrap()
    }

    fn query(since: &str) -> LogQuery {
        LogQuery {
            since: at(since),
            until: None,
            every: NonZeroUsize::MIN,
        }
    }

    fn stamps(lines: &[&str]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.split('\t').next().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_parse_ctime() {
        let padded = at("Thu Jan  1 00:00:00 1970");
        assert_eq!(padded.and_utc().timestamp(), 0);
        assert_eq!(at("Tue Nov 14 22:13:20 2023").and_utc().timestamp(), 1_700_000_000);
        assert!(parse_ctime("2023-11-14 22:13:20").is_err());
    }

    #[test]
    fn test_lines_newer_than_date_newest_first() {
        let lines = query("Tue Nov 14 22:12:00 2023").select(LOG);
        assert_eq!(
            stamps(&lines),
            ["Tue Nov 14 22:14:00 2023", "Tue Nov 14 22:13:00 2023"]
        );
        assert!(lines[1].ends_with("\tnan\t1.010300\t18.300000\t8"));
    }

    #[test]
    fn test_date_after_newest_line_selects_nothing() {
        assert!(query("Wed Nov 15 00:00:00 2023").select(LOG).is_empty());
        assert!(query("Tue Nov 14 22:00:00 2023").select("").is_empty());
    }

    #[test]
    fn test_until_and_every() {
        let mut q = query("Tue Nov 14 22:00:00 2023");
        q.until = Some(at("Tue Nov 14 22:14:00 2023"));
        assert_eq!(stamps(&q.select(LOG)).len(), 4);

        q.until = None;
        q.every = NonZeroUsize::new(2).unwrap();
        assert_eq!(
            stamps(&q.select(LOG)),
            [
                "Tue Nov 14 22:14:00 2023",
                "Tue Nov 14 22:12:00 2023",
                "Tue Nov 14 22:10:00 2023",
            ]
        );
    }

    #[test]
    fn test_walk_stops_at_first_older_line() {
        // An out-of-order line older than the cut ends the walk.
        let log = "\
Tue Nov 14 22:20:00 2023\t1\t1\t1\t1\t0
Tue Nov 14 22:05:00 2023\t1\t1\t1\t1\t0
Tue Nov 14 22:21:00 2023\t1\t1\t1\t1\t0
";
        let lines = query("Tue Nov 14 22:10:00 2023").select(log);
        assert_eq!(stamps(&lines), ["Tue Nov 14 22:21:00 2023"]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let log = format!("{}garbage\n", LOG);
        let lines = query("Tue Nov 14 22:13:00 2023").select(&log);
        assert_eq!(stamps(&lines), ["Tue Nov 14 22:14:00 2023"]);
    }

    #[test]
    fn test_print_from_file() {
        let path: PathBuf =
            std::env::temp_dir().join(format!("meteo-{}-query.tsv", std::process::id()));
        fs::write(&path, LOG).unwrap();

        let mut out = Vec::new();
        let printed = query("Tue Nov 14 22:13:00 2023")
            .print(&path, &mut out)
            .unwrap();

        assert_eq!(printed, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Tue Nov 14 22:14:00 2023\t21.400000\t45.400000\t1.010400\t18.400000\t0\n"
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_log() {
        let mut out = Vec::new();
        assert!(matches!(
            query("Tue Nov 14 22:13:00 2023").print(Path::new("/nonexistent/log.txt"), &mut out),
            Err(HostError::ReadLog { .. })
        ));
    }
}
