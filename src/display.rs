use std::io::{self, Write};

use serde::Serialize;

use crate::prayer::model::{Prayer, TimeOfDay};
use crate::prayer::next::NextPrayer;
use crate::prayer::phase::Phase;

pub const UNAVAILABLE_TEXT: &str = "Waktu solat tidak tersedia";
/// Countdowns at or below this many seconds get warning styling.
pub const WARNING_THRESHOLD_SECS: i64 = 60;

/// Text of the full-screen phase overlay.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub title: String,
    pub headline: String,
    pub subtitle: String,
    pub warning: bool,
}

impl Frame {
    pub fn for_phase(phase: Phase, prayer: Prayer, remaining_secs: Option<i64>) -> Option<Self> {
        let countdown = remaining_secs.unwrap_or(0);
        let warning = remaining_secs.is_some_and(|secs| secs <= WARNING_THRESHOLD_SECS);
        let frame = match phase {
            Phase::Idle => return None,
            Phase::PreWarning => Frame {
                title: format!("Waktu {} Dalam", prayer.label()),
                headline: format_countdown(countdown),
                subtitle: "Azan akan berkumandang sebentar lagi".to_string(),
                warning,
            },
            Phase::ActiveWindow => Frame {
                title: "Telah Masuk Waktu".to_string(),
                headline: prayer.label().to_uppercase(),
                subtitle: "Sila bersedia untuk mendirikan solat".to_string(),
                warning: false,
            },
            Phase::PostWindowCountdown => Frame {
                title: format!("Iqamah {}", prayer.label()),
                headline: format_countdown(countdown),
                subtitle: "Solat akan didirikan sebentar lagi".to_string(),
                warning,
            },
        };
        Some(frame)
    }

    pub fn line(&self) -> String {
        let marker = if self.warning { " !" } else { "" };
        format!("{} | {} | {}{marker}", self.title, self.headline, self.subtitle)
    }
}

/// `MM:SS`; minutes are not wrapped into hours.
pub fn format_countdown(total_secs: i64) -> String {
    let total = total_secs.max(0);
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn format_hms(total_secs: i64) -> String {
    let total = total_secs.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        total / 3_600,
        (total % 3_600) / 60,
        total % 60
    )
}

pub fn format_prayer_time(time: Option<TimeOfDay>, format24h: bool) -> String {
    match time {
        Some(time) if format24h => time.to_string(),
        Some(time) => time.format_12h(),
        None => "--:--".to_string(),
    }
}

/// `Subuh (esok) 06:12:00`
pub fn next_prayer_line(next: &NextPrayer) -> String {
    let tomorrow = if next.is_tomorrow { " (esok)" } else { "" };
    format!(
        "{}{tomorrow} {}",
        next.name.label(),
        format_hms(next.remaining_seconds)
    )
}

/// Visual half of the cue contract. `render` is called every tick and must
/// be safe to repeat with unchanged values.
pub trait DisplaySink: Send {
    fn render(&mut self, phase: Phase, prayer: Prayer, remaining_secs: Option<i64>);
    fn render_next(&mut self, next: Option<&NextPrayer>);
    fn render_unavailable(&mut self, reason: &str);
}

/// Writes a line whenever the visible text changes.
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
    last_overlay: Option<String>,
    last_next: Option<String>,
}

impl ConsoleDisplay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_overlay: None,
            last_next: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::warn!(error = %err, "display write failed");
        }
    }
}

impl<W: Write + Send> DisplaySink for ConsoleDisplay<W> {
    fn render(&mut self, phase: Phase, prayer: Prayer, remaining_secs: Option<i64>) {
        let overlay = Frame::for_phase(phase, prayer, remaining_secs).map(|frame| frame.line());
        if overlay == self.last_overlay {
            return;
        }
        if let Some(line) = &overlay {
            self.emit(line);
        }
        self.last_overlay = overlay;
    }

    fn render_next(&mut self, next: Option<&NextPrayer>) {
        let line = next.map(|next| format!("Seterusnya: {}", next_prayer_line(next)));
        if line == self.last_next {
            return;
        }
        if let Some(line) = &line {
            self.emit(line);
        }
        self.last_next = line;
    }

    fn render_unavailable(&mut self, reason: &str) {
        let line = format!("{UNAVAILABLE_TEXT} ({reason})");
        if self.last_overlay.as_deref() == Some(line.as_str()) {
            return;
        }
        self.emit(&line);
        self.last_overlay = Some(line);
        self.last_next = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdowns_pad_and_clamp() {
        assert_eq!(format_countdown(600), "10:00");
        assert_eq!(format_countdown(59), "00:59");
        assert_eq!(format_countdown(-3), "00:00");
        assert_eq!(format_hms(3_725), "01:02:05");
    }

    #[test]
    fn frames_follow_phase() {
        let pre = Frame::for_phase(Phase::PreWarning, Prayer::Zohor, Some(300)).expect("frame");
        assert_eq!(pre.title, "Waktu Zohor Dalam");
        assert_eq!(pre.headline, "05:00");
        assert!(!pre.warning);

        let active = Frame::for_phase(Phase::ActiveWindow, Prayer::Isyak, None).expect("frame");
        assert_eq!(active.title, "Telah Masuk Waktu");
        assert_eq!(active.headline, "ISYAK");

        let iqamah =
            Frame::for_phase(Phase::PostWindowCountdown, Prayer::Asar, Some(45)).expect("frame");
        assert_eq!(iqamah.title, "Iqamah Asar");
        assert!(iqamah.warning);

        assert!(Frame::for_phase(Phase::Idle, Prayer::Asar, None).is_none());
    }

    #[test]
    fn prayer_time_formats() {
        assert_eq!(format_prayer_time(TimeOfDay::new(19, 21), true), "19:21");
        assert_eq!(format_prayer_time(TimeOfDay::new(19, 21), false), "7:21 PM");
        assert_eq!(format_prayer_time(None, true), "--:--");
    }

    #[test]
    fn next_line_marks_tomorrow() {
        let next = NextPrayer {
            name: Prayer::Subuh,
            seconds_of_day: 86_400 + 5 * 3_600,
            is_tomorrow: true,
            remaining_seconds: 6 * 3_600,
        };
        assert_eq!(next_prayer_line(&next), "Subuh (esok) 06:00:00");
    }

    #[test]
    fn console_only_writes_on_change() {
        let mut display = ConsoleDisplay::new(Vec::new());
        display.render(Phase::PreWarning, Prayer::Zohor, Some(120));
        display.render(Phase::PreWarning, Prayer::Zohor, Some(120));
        display.render(Phase::PreWarning, Prayer::Zohor, Some(119));
        display.render(Phase::Idle, Prayer::Zohor, None);
        display.render(Phase::Idle, Prayer::Zohor, None);

        let text = String::from_utf8(display.into_inner()).expect("utf8");
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("02:00"));
        assert!(text.contains("01:59"));
    }

    #[test]
    fn unavailable_placeholder_is_shown_once() {
        let mut display = ConsoleDisplay::new(Vec::new());
        display.render_unavailable("unknown zone");
        display.render_unavailable("unknown zone");
        let text = String::from_utf8(display.into_inner()).expect("utf8");
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with(UNAVAILABLE_TEXT));
    }
}
