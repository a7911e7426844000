//! Linux logging daemon for the meteo-rs environmental station.
//!
//! Opens the configured I2C bus, brings up the BME280 sensor(s) and the
//! ADS1115 analog probe, and appends one averaged line per reporting period
//! to the log file. Bus and device faults are written to the error file and
//! the station re-initialises after a short back-off; the process only
//! stops when it is killed.
//!
//! `--simulate` swaps the bus for in-memory devices so the whole pipeline
//! can be exercised on a desktop. `--since DATE` prints the logged lines
//! newer than `DATE` instead of sampling.

mod cli;
mod clock;
mod config;
mod linux_bus;
mod query;
mod sinks;

use clap::Parser;
use log::{error, info};
use meteo_core::bus::BusProvider;
use meteo_core::config::MonitorConfig;
use meteo_core::display::{NoDisplay, StatusDisplay};
use meteo_core::sensors::bme280::RawSample;
use meteo_core::sim::{DATASHEET_CALIBRATION, SimAds1115, SimBme280, SimulatedBus};
use meteo_core::supervisor::{Outputs, Supervisor};
use rppal::hal::Delay;

use crate::cli::Cli;
use crate::clock::SystemClock;
use crate::linux_bus::RppalProvider;
use crate::query::LogQuery;
use crate::sinks::{ErrorFileSink, LogDisplay, TsvFileSink};

/// Raw codes served by the simulated BME280s: about 25 °C, 1 bar, 55 %RH.
const SIMULATED_RAW: RawSample = RawSample {
    temperature: 519_888 << 4,
    pressure: 415_148 << 4,
    humidity: 30_000,
};

/// About 1.65 V on the default 2.048 V range.
const SIMULATED_PROBE_CODE: i16 = 26_400;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(0);
        }
    };

    if let Some(since) = cli.since {
        let query = LogQuery {
            since,
            until: cli.until,
            every: cli.every,
        };
        match query.print(&cli.log_file, &mut std::io::stdout().lock()) {
            Ok(_) => std::process::exit(0),
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let config = match config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Starting meteo-logger on bus {}", config.bus);
    info!(
        "Logging to {} (errors to {})",
        cli.log_file.display(),
        cli.error_file.display()
    );

    match (cli.simulate, cli.no_display) {
        (false, false) => run(RppalProvider, LogDisplay, &cli, config),
        (false, true) => run(RppalProvider, NoDisplay, &cli, config),
        (true, no_display) => {
            info!("Using simulated devices");
            let provider = simulated_station(&config);
            if no_display {
                run(provider, NoDisplay, &cli, config)
            } else {
                run(provider, LogDisplay, &cli, config)
            }
        }
    }
}

fn run<P, V>(provider: P, display: V, cli: &Cli, config: MonitorConfig) -> !
where
    P: BusProvider,
    V: StatusDisplay,
{
    let outputs = Outputs {
        log: TsvFileSink::new(&cli.log_file, cli.echo),
        errors: ErrorFileSink::new(&cli.error_file),
        display,
    };

    match Supervisor::new(provider, Delay::new(), SystemClock::new(), outputs, config) {
        Ok(mut supervisor) => supervisor.run(),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Every configured device, backed by the simulator.
fn simulated_station(config: &MonitorConfig) -> SimulatedBus {
    let mut sim = SimulatedBus::new();
    for &address in &config.environmental {
        sim = sim.with_bme280(
            address,
            SimBme280::new(DATASHEET_CALIBRATION, SIMULATED_RAW).with_wander(2_000),
        );
    }
    if let Some(aux) = &config.auxiliary {
        sim = sim.with_ads1115(
            aux.address,
            SimAds1115::new(SIMULATED_PROBE_CODE).with_wander(400),
        );
    }
    sim
}
