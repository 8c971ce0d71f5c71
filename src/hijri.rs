use chrono::{Datelike, NaiveDate, Weekday};

pub const HIJRI_MONTHS: [&str; 12] = [
    "Muharram",
    "Safar",
    "Rabiulawal",
    "Rabiulakhir",
    "Jamadilawal",
    "Jamadilakhir",
    "Rejab",
    "Syaaban",
    "Ramadan",
    "Syawal",
    "Zulkaedah",
    "Zulhijjah",
];

const MALAY_MONTHS: [&str; 12] = [
    "Januari",
    "Februari",
    "Mac",
    "April",
    "Mei",
    "Jun",
    "Julai",
    "Ogos",
    "September",
    "Oktober",
    "November",
    "Disember",
];

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HijriDate {
    pub year: i64,
    pub month: u32,
    pub day: u32,
}

impl HijriDate {
    pub fn month_name(&self) -> Option<&'static str> {
        let index = usize::try_from(self.month).ok()?.checked_sub(1)?;
        HIJRI_MONTHS.get(index).copied()
    }
}

/// Arithmetic (Kuwaiti) approximation. Can be a day off the sighted
/// calendar, which is why a source-supplied label is preferred.
pub fn gregorian_to_hijri(date: NaiveDate) -> HijriDate {
    let jd = julian_day_number(date);
    let l = jd - 1_948_440 + 10_632;
    let n = (l - 1).div_euclid(10_631);
    let remaining = l - 10_631 * n + 354;
    let j = ((10_985 - remaining).div_euclid(5_316)) * ((50 * remaining).div_euclid(17_719))
        + (remaining.div_euclid(5_670)) * ((43 * remaining).div_euclid(15_238));
    let final_l = remaining
        - ((30 - j).div_euclid(15)) * ((17_719 * j).div_euclid(50))
        - (j.div_euclid(16)) * ((15_238 * j).div_euclid(43))
        + 29;
    let month = (24 * final_l).div_euclid(709);
    let day = final_l - (709 * month).div_euclid(24);
    let year = 30 * n + j - 30;

    HijriDate {
        year,
        month: month as u32,
        day: day as u32,
    }
}

fn julian_day_number(date: NaiveDate) -> i64 {
    let (mut year, mut month) = (i64::from(date.year()), i64::from(date.month()));
    if month <= 2 {
        year -= 1;
        month += 12;
    }
    let a = year.div_euclid(100);
    let b = 2 - a + a.div_euclid(4);
    // Integer part of the astronomical JD at noon.
    ((36_525 * (year + 4_716)) / 100) + ((306_001 * (month + 1)) / 10_000)
        + i64::from(date.day())
        + b
        - 1_524
}

/// `27 Rabiulakhir 1448H`
pub fn hijri_label(date: NaiveDate) -> String {
    let hijri = gregorian_to_hijri(date);
    match hijri.month_name() {
        Some(name) => format!("{} {name} {}H", hijri.day, hijri.year),
        None => format!("{}-{:02}-{:02}H", hijri.year, hijri.month, hijri.day),
    }
}

pub fn malay_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Ahad",
        Weekday::Mon => "Isnin",
        Weekday::Tue => "Selasa",
        Weekday::Wed => "Rabu",
        Weekday::Thu => "Khamis",
        Weekday::Fri => "Jumaat",
        Weekday::Sat => "Sabtu",
    }
}

/// `Isnin, 19 Oktober 2026`
pub fn gregorian_label(date: NaiveDate) -> String {
    format!(
        "{}, {} {} {}",
        malay_weekday(date.weekday()),
        date.day(),
        MALAY_MONTHS[date.month0() as usize],
        date.year()
    )
}

/// Part-of-day label shown next to the clock.
pub fn period_label(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Pagi",
        12..=14 => "Tengahari",
        15..=18 => "Petang",
        _ => "Malam",
    }
}
