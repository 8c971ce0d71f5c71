use std::io::Read;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::clock::WallClock;
use crate::display::Frame;
use crate::prayer::model::{DailyTimes, Prayer, seconds_of_day};
use crate::prayer::next::{NextPrayer, next_prayer};
use crate::prayer::phase::{Phase, active_phase};
use crate::prayer::resolver::TimeSourceResolver;
use crate::prayer::zones::ZONES;
use crate::runtime::{RuntimeCommand, SharedSchedule};
use crate::settings::SettingsStore;

const MAX_BODY_BYTES: u64 = 64 * 1024;
const JSON_CONTENT: &str = "application/json; charset=utf-8";
const TEXT_CONTENT: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Everything a request handler may read or change.
#[derive(Clone)]
pub struct ApiContext {
    pub schedule: SharedSchedule,
    pub settings: Arc<Mutex<SettingsStore>>,
    pub resolver: Arc<TimeSourceResolver>,
    pub commands: Sender<RuntimeCommand>,
    pub clock: Arc<dyn WallClock>,
}

pub struct ApiServer {
    local_addr: Option<SocketAddr>,
    stop: Arc<AtomicBool>,
    http_join: Option<JoinHandle<()>>,
}

impl ApiServer {
    pub fn start(config: ApiServerConfig, context: ApiContext) -> Result<Self> {
        let bind = format!("{}:{}", config.bind_addr, config.port);
        let server = Server::http(&bind)
            .map_err(|err| anyhow::anyhow!("failed to start API server on {bind}: {err}"))?;
        let local_addr = server.server_addr().to_ip();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);
        let http_join = thread::Builder::new()
            .name("local-api".to_string())
            .spawn(move || run_server_loop(server, context, stop_for_thread))
            .context("failed to start API thread")?;
        Ok(Self {
            local_addr,
            stop,
            http_join: Some(http_join),
        })
    }

    /// The bound address, with the real port when started on port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(join) = self.http_join.take() {
            let _ = join.join();
        }
    }
}

fn run_server_loop(server: Server, context: ApiContext, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::Relaxed) {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => handle_request(request, &context),
            Ok(None) => continue,
            Err(_) => continue,
        }
    }
}

#[derive(Serialize)]
struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn failure(error: impl Into<String>) -> Envelope<()> {
    Envelope {
        success: false,
        data: None,
        error: Some(error.into()),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrayerTimesBody<'a> {
    zone: &'a str,
    #[serde(flatten)]
    times: &'a DailyTimes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PhaseBody {
    prayer: Prayer,
    phase: Phase,
    remaining_secs: Option<i64>,
    frame: Option<Frame>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateBody {
    now: String,
    zone: String,
    source: Option<String>,
    refreshed_at: Option<String>,
    phase: Option<PhaseBody>,
    next: Option<NextPrayer>,
    error: Option<String>,
}

fn handle_request(request: tiny_http::Request, context: &ApiContext) {
    let Some(remote_addr) = request.remote_addr() else {
        let _ = send_text(request, StatusCode(400), "missing remote address");
        return;
    };
    if !is_lan_client(remote_addr.ip()) {
        let _ = send_text(request, StatusCode(403), "forbidden: local network only");
        return;
    }

    let url = request.url().to_string();
    let (path, query) = split_path_query(&url);
    let method = request.method().clone();
    tracing::debug!(method = %method, path, "api request");

    let result = match (&method, path) {
        (Method::Get, "/healthz") => send_json(
            request,
            StatusCode(200),
            &serde_json::json!({ "status": "ok" }),
        ),
        (Method::Get, "/api/prayer-times") => {
            let zone = query_param(query, "zone").filter(|zone| !zone.trim().is_empty());
            handle_prayer_times(request, context, zone)
        }
        (Method::Get, "/api/settings") => match context.settings.lock() {
            Ok(store) => send_json(request, StatusCode(200), &store.document()),
            Err(_) => send_text(request, StatusCode(500), "internal state lock error"),
        },
        (Method::Post, "/api/settings") => handle_settings_update(request, context),
        (Method::Get, "/api/zones") => send_json(request, StatusCode(200), &ZONES),
        (Method::Get, "/api/state") => {
            let body = build_state(context);
            send_json(request, StatusCode(200), &body)
        }
        (_, "/healthz" | "/api/prayer-times" | "/api/settings" | "/api/zones" | "/api/state") => {
            send_text(request, StatusCode(405), "method not allowed")
        }
        _ => send_text(request, StatusCode(404), "not found"),
    };
    if let Err(err) = result {
        tracing::warn!(error = %format!("{err:#}"), "failed to send API response");
    }
}

fn handle_prayer_times(
    request: tiny_http::Request,
    context: &ApiContext,
    zone: Option<&str>,
) -> Result<()> {
    let slot = context.schedule.snapshot();
    let wanted = zone.map(|zone| zone.trim().to_ascii_uppercase());

    match wanted {
        Some(other) if !other.eq_ignore_ascii_case(&slot.zone) => {
            // A visitor's zone must not evict the kiosk's cached month.
            match context.resolver.lookup_today(&other) {
                Ok(times) => {
                    let body = PrayerTimesBody {
                        zone: &other,
                        times: &times,
                    };
                    send_json(request, StatusCode(200), &Envelope::ok(body))
                }
                Err(err) => send_json(request, StatusCode(200), &failure(err.to_string())),
            }
        }
        _ => match slot.times.as_deref() {
            Some(times) => {
                let body = PrayerTimesBody {
                    zone: &slot.zone,
                    times,
                };
                send_json(request, StatusCode(200), &Envelope::ok(body))
            }
            None => {
                let reason = slot
                    .error
                    .unwrap_or_else(|| "prayer times not loaded yet".to_string());
                send_json(request, StatusCode(200), &failure(reason))
            }
        },
    }
}

fn handle_settings_update(mut request: tiny_http::Request, context: &ApiContext) -> Result<()> {
    let mut body = String::new();
    let read = request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body);
    if let Err(err) = read {
        return send_json(
            request,
            StatusCode(400),
            &failure(format!("unreadable body: {err}")),
        );
    }
    let patch = match serde_json::from_str::<Value>(&body) {
        Ok(patch) => patch,
        Err(err) => {
            return send_json(
                request,
                StatusCode(400),
                &failure(format!("invalid JSON: {err}")),
            );
        }
    };

    let outcome = match context.settings.lock() {
        Ok(mut store) => store.apply_patch(patch),
        Err(_) => return send_text(request, StatusCode(500), "internal state lock error"),
    };
    match outcome {
        Ok(settings) => {
            tracing::info!(zone = %settings.zone, "settings updated");
            if context
                .commands
                .send(RuntimeCommand::SettingsChanged(Box::new(settings)))
                .is_err()
            {
                tracing::warn!("runtime is not accepting settings updates");
            }
            send_json(
                request,
                StatusCode(200),
                &serde_json::json!({ "success": true }),
            )
        }
        Err(err) => send_json(request, StatusCode(400), &failure(format!("{err:#}"))),
    }
}

fn build_state(context: &ApiContext) -> StateBody {
    let now = context.clock.now();
    let slot = context.schedule.snapshot();
    let config = match context.settings.lock() {
        Ok(store) => store.settings().map(|settings| settings.phase_config()).ok(),
        Err(_) => None,
    }
    .unwrap_or_default();

    let now_secs = seconds_of_day(now.time());
    let times = slot.times.as_deref();
    let phase = times
        .and_then(|times| active_phase(times, &config, now_secs))
        .map(|(prayer, phase, remaining_secs)| PhaseBody {
            prayer,
            phase,
            remaining_secs,
            frame: Frame::for_phase(phase, prayer, remaining_secs),
        });

    StateBody {
        now: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
        zone: slot.zone.clone(),
        source: times.map(|times| times.source.to_string()),
        refreshed_at: slot.refreshed_at.map(|at| at.to_rfc3339()),
        phase,
        next: times.and_then(|times| next_prayer(times, now_secs)),
        error: slot.error,
    }
}

fn respond(
    request: tiny_http::Request,
    status: StatusCode,
    content_type: &str,
    body: Vec<u8>,
) -> Result<()> {
    let header = Header::from_bytes("Content-Type", content_type)
        .map_err(|_| anyhow::anyhow!("invalid content type {content_type}"))?;
    request.respond(
        Response::from_data(body)
            .with_status_code(status)
            .with_header(header),
    )?;
    Ok(())
}

fn send_json<T: Serialize + ?Sized>(
    request: tiny_http::Request,
    status: StatusCode,
    body: &T,
) -> Result<()> {
    respond(request, status, JSON_CONTENT, serde_json::to_vec(body)?)
}

fn send_text(request: tiny_http::Request, status: StatusCode, body: &str) -> Result<()> {
    respond(request, status, TEXT_CONTENT, body.as_bytes().to_vec())
}

fn split_path_query(url: &str) -> (&str, &str) {
    url.split_once('?').unwrap_or((url, ""))
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        (name == key).then_some(value)
    })
}

/// Settings may only be changed from the surau's own network.
fn is_lan_client(ip: IpAddr) -> bool {
    let v4 = match ip {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4,
            None => {
                return v6.is_loopback() || v6.is_unique_local() || v6.is_unicast_link_local();
            }
        },
    };
    v4.is_loopback() || v4.is_private() || v4.is_link_local()
}
