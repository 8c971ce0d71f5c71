//! Offline prayer time calculation.
//!
//! Follows the convention JAKIM publishes against: Fajr at 20° and Isha at
//! 18° below the horizon, sunrise/sunset at 0.833°, Shafi'i Asr (shadow
//! factor 1) and a one minute Dhuhr margin. Results are rounded up to the
//! next whole minute.

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::hijri;
use crate::prayer::model::{DailyTimes, Prayer, Source, TimeOfDay};
use crate::prayer::zones::Zone;

#[derive(Debug, Clone, Copy)]
pub struct CalculationParams {
    pub fajr_angle: f64,
    pub isha_angle: f64,
    pub horizon_angle: f64,
    pub asr_shadow_factor: f64,
    pub dhuhr_margin_minutes: f64,
    pub imsak_lead_minutes: i64,
}

impl CalculationParams {
    pub const JAKIM: Self = Self {
        fajr_angle: 20.0,
        isha_angle: 18.0,
        horizon_angle: 0.833,
        asr_shadow_factor: 1.0,
        dhuhr_margin_minutes: 1.0,
        imsak_lead_minutes: 10,
    };
}

#[derive(Debug, Clone, Copy)]
struct SunPosition {
    declination: f64,
    equation_of_time: f64,
}

/// Fractional local hours for each event, before rounding. `None` when the
/// sun never reaches the required angle.
#[derive(Debug, Clone, Copy)]
struct RawTimes {
    fajr: Option<f64>,
    sunrise: Option<f64>,
    dhuhr: f64,
    asr: Option<f64>,
    sunset: Option<f64>,
    isha: Option<f64>,
}

pub fn calculate_day(zone: &Zone, date: NaiveDate) -> DailyTimes {
    calculate_with(zone, date, &CalculationParams::JAKIM)
}

pub fn calculate_with(zone: &Zone, date: NaiveDate, params: &CalculationParams) -> DailyTimes {
    let raw = compute_raw(zone.lat, zone.lng, zone.utc_offset_hours(date), date, params);

    let subuh = raw.fajr.and_then(round_up_to_minute);
    let imsak = subuh.and_then(|time| {
        let minutes = i64::from(time.hour()) * 60 + i64::from(time.minute());
        let shifted = minutes - params.imsak_lead_minutes;
        if shifted < 0 {
            return None;
        }
        TimeOfDay::new((shifted / 60) as u8, (shifted % 60) as u8)
    });
    let zohor = round_up_to_minute(raw.dhuhr + params.dhuhr_margin_minutes / 60.0);

    DailyTimes::new(
        date,
        Some(hijri::hijri_label(date)),
        [
            (Prayer::Imsak, imsak),
            (Prayer::Subuh, subuh),
            (Prayer::Syuruk, raw.sunrise.and_then(round_up_to_minute)),
            (Prayer::Zohor, zohor),
            (Prayer::Asar, raw.asr.and_then(round_up_to_minute)),
            (Prayer::Maghrib, raw.sunset.and_then(round_up_to_minute)),
            (Prayer::Isyak, raw.isha.and_then(round_up_to_minute)),
        ],
        Source::Calculated,
    )
}

fn compute_raw(
    lat: f64,
    lng: f64,
    utc_offset_hours: f64,
    date: NaiveDate,
    params: &CalculationParams,
) -> RawTimes {
    let jdate = julian_day(date) - lng / (15.0 * 24.0);

    // Seed with rough hours, then refine once using the sun position at
    // each estimate.
    let mut guess = [5.0, 6.0, 12.0, 13.0, 18.0, 18.0];
    let mut raw = None;
    for _ in 0..2 {
        let portion = guess.map(|hours| hours / 24.0);
        let times = RawTimes {
            fajr: sun_angle_time(jdate, lat, params.fajr_angle, portion[0], true),
            sunrise: sun_angle_time(jdate, lat, params.horizon_angle, portion[1], true),
            dhuhr: mid_day(jdate, portion[2]),
            asr: asr_time(jdate, lat, params.asr_shadow_factor, portion[3]),
            sunset: sun_angle_time(jdate, lat, params.horizon_angle, portion[4], false),
            isha: sun_angle_time(jdate, lat, params.isha_angle, portion[5], false),
        };
        guess = [
            times.fajr.unwrap_or(guess[0]),
            times.sunrise.unwrap_or(guess[1]),
            times.dhuhr,
            times.asr.unwrap_or(guess[3]),
            times.sunset.unwrap_or(guess[4]),
            times.isha.unwrap_or(guess[5]),
        ];
        raw = Some(times);
    }

    let shift = utc_offset_hours - lng / 15.0;
    let to_local = |hours: f64| hours + shift;
    let raw = raw.unwrap_or(RawTimes {
        fajr: None,
        sunrise: None,
        dhuhr: 12.0,
        asr: None,
        sunset: None,
        isha: None,
    });
    RawTimes {
        fajr: raw.fajr.map(to_local),
        sunrise: raw.sunrise.map(to_local),
        dhuhr: to_local(raw.dhuhr),
        asr: raw.asr.map(to_local),
        sunset: raw.sunset.map(to_local),
        isha: raw.isha.map(to_local),
    }
}

fn julian_day(date: NaiveDate) -> f64 {
    let mut year = date.year();
    let mut month = date.month() as i32;
    let day = f64::from(date.day());
    if month <= 2 {
        year -= 1;
        month += 12;
    }
    let a = (f64::from(year) / 100.0).floor();
    let b = 2.0 - a + (a / 4.0).floor();
    (365.25 * f64::from(year + 4716)).floor() + (30.6001 * f64::from(month + 1)).floor() + day
        + b
        - 1524.5
}

fn sun_position(jd: f64) -> SunPosition {
    let d = jd - 2_451_545.0;
    let g = fix_angle(357.529 + 0.985_600_28 * d);
    let q = fix_angle(280.459 + 0.985_647_36 * d);
    let l = fix_angle(q + 1.915 * dsin(g) + 0.020 * dsin(2.0 * g));
    let e = 23.439 - 0.000_000_36 * d;

    let right_ascension = fix_hour(darctan2(dcos(e) * dsin(l), dcos(l)) / 15.0);
    SunPosition {
        declination: darcsin(dsin(e) * dsin(l)),
        equation_of_time: q / 15.0 - right_ascension,
    }
}

fn mid_day(jdate: f64, portion: f64) -> f64 {
    let eqt = sun_position(jdate + portion).equation_of_time;
    fix_hour(12.0 - eqt)
}

fn sun_angle_time(jdate: f64, lat: f64, angle: f64, portion: f64, before_noon: bool) -> Option<f64> {
    let decl = sun_position(jdate + portion).declination;
    let noon = mid_day(jdate, portion);
    let cos_hour_angle = (-dsin(angle) - dsin(decl) * dsin(lat)) / (dcos(decl) * dcos(lat));
    if !(-1.0..=1.0).contains(&cos_hour_angle) {
        return None;
    }
    let t = darccos(cos_hour_angle) / 15.0;
    Some(if before_noon { noon - t } else { noon + t })
}

fn asr_time(jdate: f64, lat: f64, factor: f64, portion: f64) -> Option<f64> {
    let decl = sun_position(jdate + portion).declination;
    let angle = -darccot(factor + dtan((lat - decl).abs()));
    sun_angle_time(jdate, lat, angle, portion, false)
}

fn round_up_to_minute(hours: f64) -> Option<TimeOfDay> {
    if !hours.is_finite() {
        return None;
    }
    let hours = fix_hour(hours);
    let minutes = (hours * 60.0 - 1e-9).ceil() as i64;
    let minutes = minutes.rem_euclid(24 * 60);
    NaiveTime::from_num_seconds_from_midnight_opt((minutes * 60) as u32, 0)
        .map(TimeOfDay::from_naive)
}

fn fix_angle(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

fn fix_hour(hours: f64) -> f64 {
    hours.rem_euclid(24.0)
}

fn dsin(degrees: f64) -> f64 {
    degrees.to_radians().sin()
}

fn dcos(degrees: f64) -> f64 {
    degrees.to_radians().cos()
}

fn dtan(degrees: f64) -> f64 {
    degrees.to_radians().tan()
}

fn darcsin(x: f64) -> f64 {
    x.asin().to_degrees()
}

fn darccos(x: f64) -> f64 {
    x.acos().to_degrees()
}

fn darctan2(y: f64, x: f64) -> f64 {
    y.atan2(x).to_degrees()
}

fn darccot(x: f64) -> f64 {
    (1.0 / x).atan().to_degrees()
}
