use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};

use crate::audio::{AudioChain, Cue, CueKind};
use crate::clock::{SteppedClock, WallClock};
use crate::display::DisplaySink;
use crate::prayer::model::{DailyTimes, Prayer, seconds_of_day};
use crate::prayer::next::next_prayer;
use crate::prayer::phase::{Phase, PhaseEvent, PhaseScheduler};
use crate::prayer::resolver::TimeSourceResolver;
use crate::settings::Settings;

pub const DEFAULT_REFRESH_EVERY: Duration = Duration::from_secs(300);
const TICK: Duration = Duration::from_secs(1);

/// Latest resolved schedule. Readers clone the `Arc`; the refresher swaps in
/// a new value and never edits a published one.
#[derive(Debug, Clone, Default)]
pub struct ScheduleSlot {
    pub zone: String,
    pub times: Option<Arc<DailyTimes>>,
    pub error: Option<String>,
    pub refreshed_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Default)]
pub struct SharedSchedule {
    inner: Arc<Mutex<ScheduleSlot>>,
}

impl SharedSchedule {
    pub fn snapshot(&self) -> ScheduleSlot {
        match self.inner.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// On failure the previous schedule stays up only if it is for the same
    /// zone; a schedule for another zone must not keep driving cues.
    pub fn publish(&self, zone: &str, outcome: Result<DailyTimes, String>) {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let same_zone = guard.zone.eq_ignore_ascii_case(zone);
        guard.zone = zone.to_string();
        guard.refreshed_at = Some(Local::now());
        match outcome {
            Ok(times) => {
                guard.times = Some(Arc::new(times));
                guard.error = None;
            }
            Err(reason) => {
                if !same_zone {
                    guard.times = None;
                }
                guard.error = Some(reason);
            }
        }
    }
}

/// Resolves `zone` and publishes the result.
pub fn refresh_once(resolver: &TimeSourceResolver, schedule: &SharedSchedule, zone: &str) {
    match resolver.resolve_today(zone) {
        Ok(times) => {
            tracing::info!(
                zone = %zone,
                date = %times.date,
                source = %times.source,
                "resolved prayer times"
            );
            schedule.publish(zone, Ok(times));
        }
        Err(err) => {
            tracing::error!(zone = %zone, error = %err, "prayer times unavailable");
            schedule.publish(zone, Err(err.to_string()));
        }
    }
}

enum RefreshCommand {
    Refresh(String),
    Stop,
}

/// Background thread that re-resolves the schedule on a fixed interval or on
/// request. A failed fetch waits for the next interval; there is no retry.
pub struct Refresher {
    tx: Sender<RefreshCommand>,
    join: Option<JoinHandle<()>>,
}

impl Refresher {
    pub fn spawn(
        resolver: Arc<TimeSourceResolver>,
        schedule: SharedSchedule,
        zone: String,
        every: Duration,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let join = thread::Builder::new()
            .name("prayer-refresh".to_string())
            .spawn(move || run_refresh_loop(&resolver, &schedule, zone, every, &rx))
            .context("failed to start refresh thread")?;
        Ok(Self {
            tx,
            join: Some(join),
        })
    }

    pub fn request(&self, zone: &str) {
        if self.tx.send(RefreshCommand::Refresh(zone.to_string())).is_err() {
            tracing::warn!("refresh thread is gone");
        }
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        let _ = self.tx.send(RefreshCommand::Stop);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_refresh_loop(
    resolver: &TimeSourceResolver,
    schedule: &SharedSchedule,
    mut zone: String,
    every: Duration,
    rx: &Receiver<RefreshCommand>,
) {
    loop {
        refresh_once(resolver, schedule, &zone);
        match rx.recv_timeout(every) {
            Ok(RefreshCommand::Refresh(next_zone)) => zone = next_zone,
            Ok(RefreshCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
    tracing::debug!("refresh thread stopped");
}

/// One-second step of the kiosk: scheduler, display and audio.
pub struct TickDriver {
    scheduler: PhaseScheduler,
    audio: AudioChain,
    display: Box<dyn DisplaySink>,
}

impl TickDriver {
    pub fn new(settings: &Settings, audio: AudioChain, display: Box<dyn DisplaySink>) -> Self {
        let mut driver = Self {
            scheduler: PhaseScheduler::new(settings.phase_config()),
            audio,
            display,
        };
        driver.apply_settings(settings);
        driver
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.scheduler.set_config(settings.phase_config());
        self.audio.set_enabled(settings.azan.enabled);
        self.audio.set_volume(settings.azan.volume);
    }

    pub fn tick(
        &mut self,
        times: Option<&DailyTimes>,
        unavailable_reason: Option<&str>,
        now: NaiveDateTime,
    ) -> Vec<PhaseEvent> {
        let Some(times) = times else {
            self.display
                .render_unavailable(unavailable_reason.unwrap_or("belum dimuatkan"));
            return Vec::new();
        };

        let next = next_prayer(times, seconds_of_day(now.time()));
        self.display.render_next(next.as_ref());

        let events = self.scheduler.advance(times, now);
        match events.iter().find(|event| event.phase != Phase::Idle) {
            Some(event) => self
                .display
                .render(event.phase, event.prayer, event.remaining_secs),
            None => self.display.render(
                Phase::Idle,
                next.map_or(Prayer::Subuh, |next| next.name),
                None,
            ),
        }

        for event in &events {
            for kind in audible_cues(&event.cues) {
                self.audio.play_cue(Cue::new(kind, event.prayer));
            }
        }
        events
    }

    pub fn shutdown(&mut self) {
        self.audio.stop();
    }
}

/// The heads-up and the pre-warning share an edge; when both land on one
/// tick only the pre-warning sounds.
fn audible_cues(cues: &[CueKind]) -> impl Iterator<Item = CueKind> + '_ {
    let has_warning = cues.contains(&CueKind::PreWarning);
    cues.iter()
        .copied()
        .filter(move |kind| !(has_warning && *kind == CueKind::Tick))
}

/// Live changes pushed from the settings API into the running loop.
pub enum RuntimeCommand {
    SettingsChanged(Box<Settings>),
}

pub struct KioskLoop<'a> {
    pub clock: &'a dyn WallClock,
    pub schedule: SharedSchedule,
    pub refresher: &'a Refresher,
    pub commands: Receiver<RuntimeCommand>,
    pub stop: Arc<AtomicBool>,
}

/// Runs until the stop flag is raised, then stops audio. The refresher is
/// shut down by its owner.
pub fn run_kiosk(mut driver: TickDriver, mut settings: Settings, kiosk: KioskLoop<'_>) {
    let mut next_tick = Instant::now();
    let mut requested_for: Option<NaiveDate> = None;

    while !kiosk.stop.load(Ordering::Relaxed) {
        while let Ok(RuntimeCommand::SettingsChanged(updated)) = kiosk.commands.try_recv() {
            let zone_changed = updated.normalized_zone() != settings.normalized_zone();
            driver.apply_settings(&updated);
            settings = *updated;
            if zone_changed {
                tracing::info!(zone = %settings.normalized_zone(), "zone changed, refreshing");
                kiosk.refresher.request(&settings.normalized_zone());
            }
        }

        let now = kiosk.clock.now();
        let slot = kiosk.schedule.snapshot();
        if let Some(times) = slot.times.as_deref()
            && times.date != now.date()
            && requested_for != Some(now.date())
        {
            tracing::info!(date = %now.date(), "date changed, refreshing schedule");
            requested_for = Some(now.date());
            kiosk.refresher.request(&settings.normalized_zone());
        }

        driver.tick(slot.times.as_deref(), slot.error.as_deref(), now);

        next_tick += TICK;
        let current = Instant::now();
        if next_tick < current {
            next_tick = current;
        }
        sleep_until(next_tick);
    }

    tracing::info!("stopping");
    driver.shutdown();
}

/// Replays `span_secs` seconds from `start` through the driver without
/// sleeping. Returns one line per emitted cue or phase entry.
pub fn simulate(
    driver: &mut TickDriver,
    times: &DailyTimes,
    start: NaiveDateTime,
    span_secs: u32,
) -> Vec<String> {
    let clock = SteppedClock::new(start);
    let mut lines = Vec::new();
    for _ in 0..span_secs {
        let now = clock.now();
        for event in driver.tick(Some(times), None, now) {
            if event.first_in_phase || !event.cues.is_empty() {
                let cues = event
                    .cues
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                lines.push(format!(
                    "{} {} {:?} cues=[{cues}]",
                    now.format("%H:%M:%S"),
                    event.prayer,
                    event.phase
                ));
            }
        }
        clock.advance(1);
    }
    lines
}

/// Returns at once when `deadline` has already passed.
pub fn sleep_until(deadline: Instant) {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if !remaining.is_zero() {
        thread::sleep(remaining);
    }
}
