//! Acquisition supervisor.
//!
//! Drives the station through `Init -> Sampling -> Fault -> Init`:
//!
//! - **Init** opens the bus and brings up every configured device.
//! - **Sampling** runs one reporting period per step and emits a
//!   [`PeriodRecord`].
//! - **Fault** is entered on any init or bus error. The error is reported
//!   right away, the bus is closed and the partial period is dropped. The
//!   next step waits out the back-off and returns to Init, which rebuilds
//!   everything from scratch.
//!
//! There is no retry limit. The supervisor keeps recovering for as long as
//! the process runs.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{debug, error, info, warn};

use crate::bus::{BusProvider, I2cBus};
use crate::config::{ConfigError, MonitorConfig};
use crate::display::{self, DisplayRow, StatusDisplay};
use crate::error::{DeviceError, TransportError};
use crate::sampling::{PeriodAccumulator, PeriodRecord};
use crate::sensors::{Ads1115, Bme280, Sensor};

/// Time source for pacing and timestamps.
pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn monotonic(&self) -> Duration;

    /// Wall-clock time as Unix seconds.
    fn unix_time(&self) -> i64;
}

/// Destination of finished period records.
pub trait RecordSink {
    type Error: Debug;

    fn append(&mut self, record: &PeriodRecord) -> Result<(), Self::Error>;
}

/// Destination of fault reports.
pub trait ErrorSink {
    type Error: Debug;

    fn report(&mut self, timestamp: i64, message: &str) -> Result<(), Self::Error>;
}

/// The three output sinks.
pub struct Outputs<L, E, V> {
    pub log: L,
    pub errors: E,
    pub display: V,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    Sampling,
    Fault,
}

/// What a single [`Supervisor::step`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Every device came up; sampling starts with the next step.
    Initialized,
    /// A full period was sampled and emitted.
    PeriodEmitted(PeriodRecord),
    /// Init or sampling failed. The error has been reported and the bus
    /// closed.
    Faulted(DeviceError),
    /// The back-off has elapsed; the next step re-initialises.
    Recovered,
}

/// Devices brought up by one successful Init.
struct Session<C> {
    bus: I2cBus<C>,
    environmental: Vec<Bme280>,
    auxiliary: Option<Ads1115>,
}

pub struct Supervisor<P: BusProvider, D, K, L, E, V> {
    provider: P,
    delay: D,
    clock: K,
    outputs: Outputs<L, E, V>,
    config: MonitorConfig,
    state: SupervisorState,
    session: Option<Session<P::Channel>>,
    accumulator: PeriodAccumulator,
}

impl<P, D, K, L, E, V> Supervisor<P, D, K, L, E, V>
where
    P: BusProvider,
    D: DelayNs,
    K: Clock,
    L: RecordSink,
    E: ErrorSink,
    V: StatusDisplay,
{
    pub fn new(
        provider: P,
        delay: D,
        clock: K,
        outputs: Outputs<L, E, V>,
        config: MonitorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let accumulator = PeriodAccumulator::new(config.environmental.len());
        Ok(Self {
            provider,
            delay,
            clock,
            outputs,
            config,
            state: SupervisorState::Init,
            session: None,
            accumulator,
        })
    }

    pub const fn state(&self) -> SupervisorState {
        self.state
    }

    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub const fn outputs(&self) -> &Outputs<L, E, V> {
        &self.outputs
    }

    /// Run one state transition.
    pub fn step(&mut self) -> StepOutcome {
        match self.state {
            SupervisorState::Init => match self.init() {
                Ok(session) => {
                    self.session = Some(session);
                    self.state = SupervisorState::Sampling;
                    StepOutcome::Initialized
                }
                Err(e) => self.fault(e),
            },
            SupervisorState::Sampling => match self.run_period() {
                Ok(record) => {
                    self.emit(&record);
                    StepOutcome::PeriodEmitted(record)
                }
                Err(e) => self.fault(e),
            },
            SupervisorState::Fault => {
                let backoff = self.config.fault_backoff();
                info!("Retrying initialisation in {} s", backoff.as_secs());
                let delay = &mut self.delay;
                sleep_in_chunks(backoff.as_millis(), |ms| delay.delay_ms(ms));
                self.state = SupervisorState::Init;
                StepOutcome::Recovered
            }
        }
    }

    /// Step forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    fn init(&mut self) -> Result<Session<P::Channel>, DeviceError> {
        let Self {
            provider,
            delay,
            config,
            ..
        } = self;

        info!("Initialising bus {}", config.bus);
        let mut bus = I2cBus::open(provider, config.bus)?;

        let environmental = config
            .environmental
            .iter()
            .map(|&address| {
                let sensor = Bme280::init(&mut bus, delay, address, config.bme280, config.poll)?;
                debug!("{} at {:#04x} ready", sensor.name(), address);
                Ok(sensor)
            })
            .collect::<Result<Vec<_>, DeviceError>>()?;

        let auxiliary = config
            .auxiliary
            .as_ref()
            .map(|aux| Ads1115::configure(&mut bus, aux))
            .transpose()?;

        info!(
            "Initialised {} environmental sensor(s){}",
            environmental.len(),
            if auxiliary.is_some() {
                " and the auxiliary channel"
            } else {
                ""
            }
        );

        Ok(Session {
            bus,
            environmental,
            auxiliary,
        })
    }

    /// Sample one full period. Any device error abandons the period.
    fn run_period(&mut self) -> Result<PeriodRecord, DeviceError> {
        let Self {
            delay,
            clock,
            config,
            session,
            accumulator,
            ..
        } = self;
        let session = session
            .as_mut()
            .ok_or(DeviceError::Transport(TransportError::Closed))?;

        let budget = config.sample_budget();
        accumulator.reset();

        for sample in 0..config.sampling.samples_per_period {
            let start = clock.monotonic();

            for (index, sensor) in session.environmental.iter().enumerate() {
                let reading = sensor
                    .read(&mut session.bus, delay)
                    .inspect_err(|e| warn!("{} #{} read failed: {}", sensor.name(), index, e))?;
                accumulator.record_environmental(index, &reading);
            }
            if let Some(aux) = &session.auxiliary {
                let temperature = aux
                    .read(&mut session.bus, delay)
                    .inspect_err(|e| warn!("{} read failed: {}", aux.name(), e))?;
                accumulator.record_auxiliary(temperature);
            }
            accumulator.finish_sample();

            let elapsed = clock.monotonic().saturating_sub(start);
            let pause = pacing_delay(budget, elapsed);
            debug!(
                "Sample {} took {} us, sleeping {} us",
                sample,
                elapsed.as_micros(),
                pause.as_micros()
            );
            sleep_in_chunks(pause.as_micros(), |us| delay.delay_us(us));
        }

        Ok(accumulator.finish(clock.unix_time()))
    }

    fn emit(&mut self, record: &PeriodRecord) {
        info!(
            "Period complete: {} samples, status {}",
            record.samples, record.status
        );
        if let Err(e) = self.outputs.log.append(record) {
            error!("Failed to append period record: {:?}", e);
        }
        for (row, text) in display::period_rows(record) {
            self.outputs.display.render(row, &text);
        }
    }

    /// Tear down the session and report `e`.
    fn fault(&mut self, e: DeviceError) -> StepOutcome {
        error!("Acquisition fault: {}", e);

        self.accumulator.reset();
        if let Some(mut session) = self.session.take() {
            session.bus.close();
        }

        let message = e.to_string();
        if let Err(sink_error) = self.outputs.errors.report(self.clock.unix_time(), &message) {
            warn!("Failed to record fault: {:?}", sink_error);
        }
        self.outputs
            .display
            .render(DisplayRow::Message, &display::fit(&message));

        self.state = SupervisorState::Fault;
        StepOutcome::Faulted(e)
    }
}

/// Sleep needed to stretch an iteration that took `elapsed` to `budget`.
/// Zero once the budget is used up.
pub fn pacing_delay(budget: Duration, elapsed: Duration) -> Duration {
    budget.saturating_sub(elapsed)
}

/// Sleep `total` units through a delay call that takes at most `u32::MAX`.
fn sleep_in_chunks(total: u128, mut sleep: impl FnMut(u32)) {
    let mut remaining = total;
    while remaining > 0 {
        let chunk = u32::try_from(remaining).unwrap_or(u32::MAX);
        sleep(chunk);
        remaining -= u128::from(chunk);
    }
}
