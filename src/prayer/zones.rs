use chrono::{NaiveDate, Offset, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Zone {
    pub code: &'static str,
    pub state: &'static str,
    pub label: &'static str,
    pub lat: f64,
    pub lng: f64,
    #[serde(skip)]
    pub tz: Tz,
}

impl Zone {
    /// UTC offset in hours for the given civil date.
    pub fn utc_offset_hours(&self, date: NaiveDate) -> f64 {
        let offset = self.tz.offset_from_utc_date(&date).fix();
        f64::from(offset.local_minus_utc()) / 3_600.0
    }
}

const KL: Tz = Tz::Asia__Kuala_Lumpur;
const KCH: Tz = Tz::Asia__Kuching;

macro_rules! zone {
    ($code:literal, $state:literal, $label:literal, $lat:literal, $lng:literal, $tz:expr) => {
        Zone {
            code: $code,
            state: $state,
            label: $label,
            lat: $lat,
            lng: $lng,
            tz: $tz,
        }
    };
}

pub static ZONES: &[Zone] = &[
    zone!("JHR01", "Johor", "Pulau Aur dan Pulau Pemanggil", 2.45, 104.52, KL),
    zone!("JHR02", "Johor", "Johor Bahru, Kota Tinggi, Mersing, Kulai", 1.49, 103.74, KL),
    zone!("JHR03", "Johor", "Kluang, Pontian", 2.03, 103.32, KL),
    zone!("JHR04", "Johor", "Batu Pahat, Muar, Segamat, Gemas Johor, Tangkak", 1.85, 102.93, KL),
    zone!("KDH01", "Kedah", "Kota Setar, Kubang Pasu, Pokok Sena", 6.12, 100.37, KL),
    zone!("KDH02", "Kedah", "Kuala Muda, Yan, Pendang", 5.65, 100.49, KL),
    zone!("KDH03", "Kedah", "Padang Terap, Sik", 6.25, 100.62, KL),
    zone!("KDH04", "Kedah", "Baling", 5.68, 100.92, KL),
    zone!("KDH05", "Kedah", "Bandar Baharu, Kulim", 5.37, 100.56, KL),
    zone!("KDH06", "Kedah", "Langkawi", 6.35, 99.80, KL),
    zone!("KDH07", "Kedah", "Puncak Gunung Jerai", 5.79, 100.43, KL),
    zone!("KTN01", "Kelantan", "Bachok, Kota Bharu, Machang, Pasir Mas, Pasir Puteh, Tanah Merah, Tumpat, Kuala Krai, Mukim Chiku", 6.13, 102.24, KL),
    zone!("KTN02", "Kelantan", "Gua Musang, Jeli, Jajahan Kecil Lojing", 4.88, 101.97, KL),
    zone!("MLK01", "Melaka", "Seluruh Negeri Melaka", 2.19, 102.25, KL),
    zone!("NGS01", "Negeri Sembilan", "Tampin, Jempol", 2.47, 102.23, KL),
    zone!("NGS02", "Negeri Sembilan", "Jelebu, Kuala Pilah, Rembau", 2.74, 102.25, KL),
    zone!("NGS03", "Negeri Sembilan", "Port Dickson, Seremban", 2.73, 101.94, KL),
    zone!("PHG01", "Pahang", "Pulau Tioman", 2.82, 104.16, KL),
    zone!("PHG02", "Pahang", "Kuantan, Pekan, Muadzam Shah", 3.81, 103.33, KL),
    zone!("PHG03", "Pahang", "Jerantut, Temerloh, Maran, Bera, Chenor, Jengka", 3.45, 102.42, KL),
    zone!("PHG04", "Pahang", "Bentong, Lipis, Raub", 3.52, 101.91, KL),
    zone!("PHG05", "Pahang", "Genting Sempah, Janda Baik, Bukit Tinggi", 3.38, 101.82, KL),
    zone!("PHG06", "Pahang", "Cameron Highlands, Genting Higlands, Bukit Fraser", 4.47, 101.38, KL),
    zone!("PHG07", "Pahang", "Zon Khas Daerah Rompin", 2.79, 103.48, KL),
    zone!("PLS01", "Perlis", "Kangar, Padang Besar, Arau", 6.44, 100.20, KL),
    zone!("PNG01", "Pulau Pinang", "Seluruh Negeri Pulau Pinang", 5.41, 100.33, KL),
    zone!("PRK01", "Perak", "Tapah, Slim River, Tanjung Malim", 4.20, 101.26, KL),
    zone!("PRK02", "Perak", "Kuala Kangsar, Sg. Siput, Ipoh, Batu Gajah, Kampar", 4.60, 101.08, KL),
    zone!("PRK03", "Perak", "Lenggong, Pengkalan Hulu, Grik", 5.42, 101.13, KL),
    zone!("PRK04", "Perak", "Temengor, Belum", 5.57, 101.33, KL),
    zone!("PRK05", "Perak", "Kg Gajah, Teluk Intan, Bagan Datuk, Seri Iskandar, Beruas, Parit, Lumut, Sitiawan, Pulau Pangkor", 4.02, 101.02, KL),
    zone!("PRK06", "Perak", "Selama, Taiping, Bagan Serai, Parit Buntar", 4.85, 100.74, KL),
    zone!("PRK07", "Perak", "Bukit Larut", 4.86, 100.79, KL),
    zone!("SBH01", "Sabah", "Bahagian Sandakan (Timur)", 5.84, 118.12, KCH),
    zone!("SBH02", "Sabah", "Beluran, Telupid, Pinangah, Terusan, Kuamut, Bahagian Sandakan (Barat)", 5.89, 117.55, KCH),
    zone!("SBH03", "Sabah", "Lahad Datu, Silabukan, Kunak, Sahabat, Semporna, Tungku, Bahagian Tawau (Timur)", 5.03, 118.33, KCH),
    zone!("SBH04", "Sabah", "Bandar Tawau, Balong, Merotai, Kalabakan, Bahagian Tawau (Barat)", 4.25, 117.89, KCH),
    zone!("SBH05", "Sabah", "Kudat, Kota Marudu, Pitas, Pulau Banggi, Bahagian Kudat", 6.88, 116.85, KCH),
    zone!("SBH06", "Sabah", "Gunung Kinabalu", 6.08, 116.56, KCH),
    zone!("SBH07", "Sabah", "Kota Kinabalu, Ranau, Kota Belud, Tuaran, Penampang, Papar, Putatan, Bahagian Pantai Barat", 5.98, 116.07, KCH),
    zone!("SBH08", "Sabah", "Pensiangan, Keningau, Tambunan, Nabawan, Bahagian Pendalaman (Atas)", 5.34, 116.16, KCH),
    zone!("SBH09", "Sabah", "Beaufort, Kuala Penyu, Sipitang, Tenom, Long Pasia, Membakut, Weston, Bahagian Pendalaman (Bawah)", 5.35, 115.75, KCH),
    zone!("SGR01", "Selangor", "Gombak, Petaling, Sepang, Hulu Langat, Hulu Selangor, S.Alam", 3.07, 101.52, KL),
    zone!("SGR02", "Selangor", "Kuala Selangor, Sabak Bernam", 3.34, 101.25, KL),
    zone!("SGR03", "Selangor", "Klang, Kuala Langat", 3.04, 101.45, KL),
    zone!("SWK01", "Sarawak", "Limbang, Lawas, Sundar, Trusan", 4.75, 115.01, KCH),
    zone!("SWK02", "Sarawak", "Miri, Niah, Bekenu, Sibuti, Marudi", 4.40, 113.99, KCH),
    zone!("SWK03", "Sarawak", "Pandan, Belaga, Suai, Tatau, Sebauh, Bintulu", 3.17, 113.04, KCH),
    zone!("SWK04", "Sarawak", "Sibu, Mukah, Dalat, Song, Igan, Oya, Balingian, Kanowit, Kapit", 2.29, 111.83, KCH),
    zone!("SWK05", "Sarawak", "Sarikei, Matu, Julau, Rajang, Daro, Bintangor, Belawai", 2.13, 111.52, KCH),
    zone!("SWK06", "Sarawak", "Lubok Antu, Sri Aman, Roban, Debak, Kabong, Lingga, Engkelili, Betong, Spaoh, Pusa, Saratok", 1.24, 111.46, KCH),
    zone!("SWK07", "Sarawak", "Serian, Simunjan, Samarahan, Sebuyau, Meludam", 1.17, 110.57, KCH),
    zone!("SWK08", "Sarawak", "Kuching, Bau, Lundu, Sematan", 1.55, 110.35, KCH),
    zone!("SWK09", "Sarawak", "Zon Khas (Kampung Patarikan)", 4.83, 115.28, KCH),
    zone!("TRG01", "Terengganu", "Kuala Terengganu, Marang, Kuala Nerus", 5.33, 103.14, KL),
    zone!("TRG02", "Terengganu", "Besut, Setiu", 5.66, 102.56, KL),
    zone!("TRG03", "Terengganu", "Hulu Terengganu", 5.07, 102.94, KL),
    zone!("TRG04", "Terengganu", "Dungun, Kemaman", 4.76, 103.42, KL),
    zone!("WLY01", "Wilayah Persekutuan", "Kuala Lumpur, Putrajaya", 3.14, 101.69, KL),
    zone!("WLY02", "Wilayah Persekutuan", "Labuan", 5.28, 115.24, KCH),
];

/// Zone codes are matched case-insensitively.
pub fn find_zone(code: &str) -> Option<&'static Zone> {
    let code = code.trim();
    ZONES
        .iter()
        .find(|zone| zone.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn zone_codes_are_unique() {
        let mut seen = HashSet::new();
        for zone in ZONES {
            assert!(seen.insert(zone.code), "duplicate zone {}", zone.code);
        }
    }

    #[test]
    fn find_zone_ignores_case_and_whitespace() {
        let zone = find_zone(" trg01 ").expect("known zone");
        assert_eq!(zone.code, "TRG01");
        assert!(find_zone("XYZ99").is_none());
    }

    #[test]
    fn malaysian_zones_are_utc_plus_eight() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).expect("date");
        for code in ["TRG01", "SBH07", "SWK08", "WLY01"] {
            let zone = find_zone(code).expect("known zone");
            assert_eq!(zone.utc_offset_hours(date), 8.0);
        }
    }
}
