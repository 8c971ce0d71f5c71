use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Local wall-clock time with no zone attached, matching how prayer times
/// are supplied.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
    fn label(&self) -> &'static str;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn label(&self) -> &'static str {
        "system"
    }
}

/// A clock that only moves when told to. Drives `--simulate` and tests.
#[derive(Debug)]
pub struct SteppedClock {
    current: Mutex<NaiveDateTime>,
}

impl SteppedClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: i64) -> NaiveDateTime {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard += chrono::Duration::seconds(seconds);
        *guard
    }
}

impl WallClock for SteppedClock {
    fn now(&self) -> NaiveDateTime {
        match self.current.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn label(&self) -> &'static str {
        "simulated"
    }
}

/// `HH:MM:SS` or `HH:MM` on `date`.
pub fn parse_simulated_start(date: NaiveDate, input: &str) -> Result<NaiveDateTime> {
    let time = NaiveTime::parse_from_str(input.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input.trim(), "%H:%M"))
        .with_context(|| format!("invalid simulated time '{input}', expected HH:MM:SS"))?;
    Ok(date.and_time(time))
}
