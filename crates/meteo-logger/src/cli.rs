use std::num::NonZeroUsize;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::Parser;

use crate::query::parse_ctime;

/// Environmental station logger
///
/// Samples the BME280 and the analog probe, averages them over each
/// reporting period and appends one tab-separated line per period.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "meteo-logger")]
#[command(version, long_about = None)]
pub struct Cli {
    /// I2C bus number (overrides the config file)
    #[arg(long, value_name = "N")]
    pub bus: Option<u8>,

    /// Also print every log line to stdout
    #[arg(long)]
    pub echo: bool,

    /// Do not render status rows
    #[arg(long)]
    pub no_display: bool,

    /// JSON station configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where period records are appended
    #[arg(long, value_name = "FILE", default_value = "log.txt")]
    pub log_file: PathBuf,

    /// Where faults are appended
    #[arg(long, value_name = "FILE", default_value = "errors.txt")]
    pub error_file: PathBuf,

    /// Run against simulated devices instead of the I2C bus
    #[arg(long)]
    pub simulate: bool,

    /// Print the logged lines newer than this ctime date, newest first,
    /// and exit (e.g. "Tue Nov 14 22:13:20 2023")
    #[arg(long, value_name = "DATE", value_parser = parse_ctime)]
    pub since: Option<NaiveDateTime>,

    /// With --since, leave out lines from this date on
    #[arg(long, value_name = "DATE", value_parser = parse_ctime, requires = "since")]
    pub until: Option<NaiveDateTime>,

    /// With --since, keep only every Nth line
    #[arg(long, value_name = "N", default_value = "1", requires = "since")]
    pub every: NonZeroUsize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["meteo-logger"]).unwrap();
        assert_eq!(cli.bus, None);
        assert!(!cli.echo);
        assert!(!cli.no_display);
        assert_eq!(cli.log_file, PathBuf::from("log.txt"));
        assert_eq!(cli.error_file, PathBuf::from("errors.txt"));
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "meteo-logger",
            "--bus",
            "1",
            "--echo",
            "--no-display",
            "--simulate",
            "--log-file",
            "/tmp/meteo.tsv",
        ])
        .unwrap();
        assert_eq!(cli.bus, Some(1));
        assert!(cli.echo && cli.no_display && cli.simulate);
        assert_eq!(cli.log_file, PathBuf::from("/tmp/meteo.tsv"));
    }

    #[test]
    fn test_query_flags() {
        let cli = Cli::try_parse_from([
            "meteo-logger",
            "--since",
            "Tue Nov 14 22:13:20 2023",
            "--every",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.since, Some(parse_ctime("Tue Nov 14 22:13:20 2023").unwrap()));
        assert_eq!(cli.until, None);
        assert_eq!(cli.every.get(), 3);

        assert!(Cli::try_parse_from(["meteo-logger", "--since", "yesterday"]).is_err());
        assert!(
            Cli::try_parse_from(["meteo-logger", "--until", "Tue Nov 14 22:13:20 2023"]).is_err()
        );
        assert!(
            Cli::try_parse_from([
                "meteo-logger",
                "--since",
                "Tue Nov 14 22:13:20 2023",
                "--every",
                "0"
            ])
            .is_err()
        );
    }

    #[test]
    fn test_unknown_flag_is_an_error() {
        assert!(Cli::try_parse_from(["meteo-logger", "--frobnicate"]).is_err());
    }
}
