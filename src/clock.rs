//! Clock jump check
//!
//! Samples wall-clock time at a fixed interval and verifies that the clock
//! moved backwards by more than a threshold at some point during the run.
//! Meant to be run inside an environment where time is being skewed.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cycler::Sleeper;
use crate::display::{print_reading, print_time_summary};
use crate::error::TimeCheckError;

/// Source of wall-clock readings
pub trait WallClock: Send + Sync {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parameters of a clock check run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeCheck {
    /// Number of readings to take
    pub samples: u32,
    /// Pause after each reading
    pub interval: Duration,
    /// The backward step must be strictly larger than this
    pub min_jump: Duration,
}

impl Default for TimeCheck {
    fn default() -> Self {
        Self {
            samples: 20,
            interval: Duration::from_secs(15),
            min_jump: Duration::from_secs(5),
        }
    }
}

/// Outcome of a passing clock check
#[derive(Debug, Clone, PartialEq)]
pub struct TimeCheckReport {
    /// Readings in the order they were taken
    pub readings: Vec<DateTime<Utc>>,
    /// Seconds between consecutive readings
    pub deltas: Vec<f64>,
    /// Largest backward step, in seconds
    pub max_backward_secs: f64,
}

impl TimeCheck {
    /// Take the readings, then judge them.
    pub async fn run<C, S>(&self, clock: &C, sleeper: &S) -> Result<TimeCheckReport, TimeCheckError>
    where
        C: WallClock,
        S: Sleeper,
    {
        if self.samples < 2 {
            return Err(TimeCheckError::TooFewSamples(self.samples));
        }

        let mut readings = Vec::with_capacity(reading_capacity(self.samples));
        for _ in 0..self.samples {
            let reading = clock.now();
            print_reading(reading);
            readings.push(reading);
            sleeper.sleep(self.interval).await;
        }

        let result = analyze(&readings, self.min_jump);
        match &result {
            Ok(report) => print_time_summary(&report.deltas, report.max_backward_secs, true),
            Err(TimeCheckError::NoBackwardJump {
                max_backward_secs, ..
            }) => print_time_summary(&deltas(&readings), *max_backward_secs, false),
            Err(TimeCheckError::TooFewSamples(_)) => {}
        }
        result
    }
}

/// Judge a series of readings.
///
/// Passes when the most negative delta between consecutive readings is
/// more than `min_jump` seconds backwards.
pub fn analyze(
    readings: &[DateTime<Utc>],
    min_jump: Duration,
) -> Result<TimeCheckReport, TimeCheckError> {
    if readings.len() < 2 {
        return Err(TimeCheckError::TooFewSamples(
            u32::try_from(readings.len()).unwrap_or(u32::MAX),
        ));
    }

    let deltas = deltas(readings);
    let max_backward_secs = -deltas.iter().copied().fold(f64::INFINITY, f64::min);

    if max_backward_secs <= min_jump.as_secs_f64() {
        return Err(TimeCheckError::NoBackwardJump {
            max_backward_secs,
            min_jump,
        });
    }

    Ok(TimeCheckReport {
        readings: readings.to_vec(),
        deltas,
        max_backward_secs,
    })
}

/// Upper bound on readings allocated up front
const MAX_PREALLOCATED_READINGS: usize = 1024;

fn reading_capacity(samples: u32) -> usize {
    usize::try_from(samples)
        .unwrap_or(usize::MAX)
        .min(MAX_PREALLOCATED_READINGS)
}

/// Seconds elapsed between each pair of consecutive readings, to the microsecond
#[allow(clippy::cast_precision_loss)]
fn deltas(readings: &[DateTime<Utc>]) -> Vec<f64> {
    readings
        .windows(2)
        .map(|pair| {
            let step = pair[1] - pair[0];
            step.num_microseconds().map_or_else(
                || step.num_milliseconds() as f64 / 1e3,
                |us| us as f64 / 1e6,
            )
        })
        .collect()
}
