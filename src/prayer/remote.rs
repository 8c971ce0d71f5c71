use std::time::Duration;

use serde::Deserialize;

use crate::prayer::model::{DayEntry, normalize_date, normalize_time};
use crate::prayer::resolver::ResolveError;

pub const ESOLAT_BASE_URL: &str = "https://www.e-solat.gov.my/index.php";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Upstream supplier of a month schedule for one zone.
pub trait RemoteSource: Send + Sync {
    fn fetch_month(&self, zone: &str) -> Result<Vec<DayEntry>, ResolveError>;
}

pub struct EsolatClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl EsolatClient {
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        Self::with_base_url(ESOLAT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ResolveError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("surauclock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ResolveError::RemoteUnavailable(format!("http client init failed: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl RemoteSource for EsolatClient {
    fn fetch_month(&self, zone: &str) -> Result<Vec<DayEntry>, ResolveError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("r", "esolatApi/TakwimSolat"),
                ("period", "month"),
                ("zone", zone),
            ])
            .send()
            .map_err(|err| ResolveError::RemoteUnavailable(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::RemoteUnavailable(format!("HTTP {status}")));
        }
        let body = response
            .text()
            .map_err(|err| ResolveError::RemoteUnavailable(format!("unreadable body: {err}")))?;
        parse_month_payload(&body)
    }
}

/// Stand-in used with `--offline`: the remote tier always fails.
pub struct OfflineRemote;

impl RemoteSource for OfflineRemote {
    fn fetch_month(&self, _zone: &str) -> Result<Vec<DayEntry>, ResolveError> {
        Err(ResolveError::RemoteUnavailable("remote lookups disabled".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct MonthPayload {
    #[serde(default)]
    status: String,
    #[serde(rename = "prayerTime")]
    prayer_time: Option<Vec<PayloadDay>>,
}

#[derive(Debug, Deserialize)]
struct PayloadDay {
    #[serde(default)]
    date: String,
    #[serde(default)]
    hijri: Option<String>,
    #[serde(default)]
    imsak: Option<String>,
    #[serde(default)]
    fajr: Option<String>,
    #[serde(default)]
    syuruk: Option<String>,
    #[serde(default)]
    dhuhr: Option<String>,
    #[serde(default)]
    asr: Option<String>,
    #[serde(default)]
    maghrib: Option<String>,
    #[serde(default)]
    isha: Option<String>,
}

pub fn parse_month_payload(body: &str) -> Result<Vec<DayEntry>, ResolveError> {
    let payload = serde_json::from_str::<MonthPayload>(body)
        .map_err(|err| ResolveError::RemoteUnavailable(format!("invalid JSON: {err}")))?;

    let status = payload.status.trim();
    if status != "OK!" && status != "OK" {
        return Err(ResolveError::RemoteUnavailable(format!(
            "upstream status '{status}'"
        )));
    }
    let Some(days) = payload.prayer_time else {
        return Err(ResolveError::RemoteUnavailable(
            "payload has no prayerTime list".to_string(),
        ));
    };

    let time = |raw: &Option<String>| raw.as_deref().and_then(normalize_time);
    let mut entries = Vec::with_capacity(days.len());
    for day in days {
        let Some(date) = normalize_date(&day.date) else {
            tracing::warn!(date = %day.date, "dropping upstream day with unparseable date");
            continue;
        };
        entries.push(DayEntry {
            date,
            hijri: day.hijri.clone().unwrap_or_default(),
            imsak: time(&day.imsak),
            subuh: time(&day.fajr),
            syuruk: time(&day.syuruk),
            zohor: time(&day.dhuhr),
            asar: time(&day.asr),
            maghrib: time(&day.maghrib),
            isyak: time(&day.isha),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use chrono::NaiveDate;
    use tiny_http::{Response, Server};

    use super::*;
    use crate::prayer::model::TimeOfDay;

    /// Answers a single request and hands back the URL it was asked for.
    fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
        let server = Server::http("127.0.0.1:0").expect("bind test server");
        let addr = server.server_addr().to_ip().expect("ip listener");
        let handle = thread::spawn(move || {
            let request = server.recv().expect("request");
            let url = request.url().to_string();
            request
                .respond(Response::from_string(body).with_status_code(status))
                .expect("respond");
            url
        });
        (format!("http://{addr}/index.php"), handle)
    }

    fn client_for(base_url: &str) -> EsolatClient {
        EsolatClient::with_base_url(base_url, Duration::from_secs(2)).expect("client")
    }

    const SAMPLE: &str = r#"{
        "prayerTime": [
            {
                "hijri": "1448-04-27",
                "date": "19-Oct-2026",
                "day": "Monday",
                "imsak": "05:32:00",
                "fajr": "05:42:00",
                "syuruk": "06:51:00",
                "dhuhr": "12:53:00",
                "asr": "16:07:00",
                "maghrib": "18:52:00",
                "isha": "20:02:00"
            },
            {
                "hijri": "1448-04-28",
                "date": "20-Oct-2026",
                "imsak": "05:32:00",
                "fajr": "",
                "syuruk": "06:51:00",
                "dhuhr": "12:53:00",
                "asr": "16:07:00",
                "maghrib": "18:52:00",
                "isha": "20:02:00"
            },
            { "date": "not a date", "fajr": "05:42:00" }
        ],
        "status": "OK!",
        "serverTime": "2026-10-19 09:00:00",
        "periodType": "month",
        "zone": "TRG01"
    }"#;

    #[test]
    fn parses_and_normalizes_month_payload() {
        let days = parse_month_payload(SAMPLE).expect("valid payload");
        assert_eq!(days.len(), 2);
        let first = &days[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2026, 10, 19).expect("date"));
        assert_eq!(first.hijri, "1448-04-27");
        assert_eq!(first.subuh, TimeOfDay::new(5, 42));
        assert_eq!(first.zohor, TimeOfDay::new(12, 53));
        assert_eq!(first.isyak, TimeOfDay::new(20, 2));
        assert_eq!(days[1].subuh, None);
    }

    #[test]
    fn rejects_bad_status() {
        let err = parse_month_payload(r#"{"status":"NO RECORD!","prayerTime":[]}"#)
            .expect_err("status should fail");
        assert!(matches!(err, ResolveError::RemoteUnavailable(_)));
    }

    #[test]
    fn rejects_missing_day_list() {
        let err = parse_month_payload(r#"{"status":"OK!"}"#).expect_err("missing list");
        assert!(err.to_string().contains("prayerTime"));
    }

    #[test]
    fn rejects_non_json_body() {
        assert!(parse_month_payload("<html>maintenance</html>").is_err());
    }

    #[test]
    fn fetch_month_parses_successful_response() {
        let (base_url, server) = serve_once(200, SAMPLE);
        let days = client_for(&base_url).fetch_month("TRG01").expect("month");
        let url = server.join().expect("server thread");

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].zohor, TimeOfDay::new(12, 53));
        assert!(url.starts_with("/index.php?"));
        assert!(url.contains("zone=TRG01"));
        assert!(url.contains("period=month"));
    }

    #[test]
    fn fetch_month_reports_http_errors() {
        let (base_url, server) = serve_once(503, "maintenance");
        let err = client_for(&base_url)
            .fetch_month("TRG01")
            .expect_err("503 should fail");
        server.join().expect("server thread");

        assert!(matches!(err, ResolveError::RemoteUnavailable(_)));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn fetch_month_reports_unreachable_host() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let err = client_for(&format!("http://127.0.0.1:{port}/index.php"))
            .fetch_month("TRG01")
            .expect_err("closed port should fail");
        assert!(matches!(err, ResolveError::RemoteUnavailable(_)));
    }

    #[test]
    fn offline_remote_always_fails() {
        assert!(OfflineRemote.fetch_month("TRG01").is_err());
    }
}
