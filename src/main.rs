mod api;
mod audio;
mod clock;
mod diagnostics;
mod display;
mod hijri;
mod prayer;
mod runtime;
mod settings;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::api::{ApiContext, ApiServer, ApiServerConfig};
use crate::audio::playback::{LoggingPlayback, Playback};
use crate::audio::sinks::{FileBackedSink, SynthesizedToneSink};
use crate::audio::{AudioChain, AudioSink};
use crate::clock::{SystemClock, WallClock, parse_simulated_start};
use crate::diagnostics::DiagnosticsOptions;
use crate::display::ConsoleDisplay;
use crate::prayer::cache::JsonFileCache;
use crate::prayer::remote::{DEFAULT_FETCH_TIMEOUT, EsolatClient, OfflineRemote, RemoteSource};
use crate::prayer::resolver::TimeSourceResolver;
use crate::runtime::{KioskLoop, Refresher, SharedSchedule, TickDriver};
use crate::settings::{Settings, SettingsStore};

#[derive(Parser, Debug)]
#[command(
    name = "surauclock",
    version,
    about = "Prayer-times kiosk core: schedule resolution, phase cues and local API"
)]
struct Cli {
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    #[arg(long, default_value = "prayer-cache.json")]
    cache: PathBuf,

    #[arg(long, default_value = "audio")]
    audio_dir: PathBuf,

    /// Zone code, overrides the settings file.
    #[arg(long)]
    zone: Option<String>,

    /// Skip the remote prayer-time service.
    #[arg(long)]
    offline: bool,

    #[arg(long)]
    diagnostics: bool,

    /// Replay the scheduler from this time today (HH:MM:SS).
    #[arg(long, value_name = "HH:MM:SS")]
    simulate: Option<String>,

    #[arg(long, default_value_t = 60)]
    simulate_span: u32,

    #[arg(long, default_value_t = runtime::DEFAULT_REFRESH_EVERY.as_secs())]
    refresh_secs: u64,

    #[arg(long, default_value = "127.0.0.1")]
    api_bind: String,

    #[arg(long, default_value_t = 3000)]
    api_port: u16,

    #[arg(long)]
    no_api: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    if cli.refresh_secs == 0 {
        bail!("--refresh-secs must be greater than zero");
    }

    let store = SettingsStore::load(&cli.settings)
        .with_context(|| format!("failed to load {}", cli.settings.display()))?;
    let mut settings = store.settings()?;
    if let Some(zone) = cli.zone.as_deref() {
        if zone.trim().is_empty() {
            bail!("--zone must not be empty");
        }
        settings.zone = zone.to_string();
    }
    let zone = settings.normalized_zone();
    let resolver = Arc::new(build_resolver(&cli));
    let clock: Arc<dyn WallClock> = Arc::new(SystemClock);

    if cli.diagnostics {
        return diagnostics::run_diagnostics(
            &resolver,
            &DiagnosticsOptions {
                zone: &zone,
                phase_config: settings.phase_config(),
                format_24h: settings.clock.format_24h,
                audio_dir: &cli.audio_dir,
                now: clock.now(),
            },
        );
    }

    let audio = build_audio_chain(&cli, &settings);

    if let Some(start) = cli.simulate.as_deref() {
        let start = parse_simulated_start(clock.now().date(), start)?;
        let times = resolver.resolve_for(&zone, start.date())?;
        tracing::info!(zone = %zone, source = %times.source, start = %start, "simulating");
        let mut driver = TickDriver::new(&settings, audio, Box::new(ConsoleDisplay::stdout()));
        for line in runtime::simulate(&mut driver, &times, start, cli.simulate_span) {
            println!("{line}");
        }
        driver.shutdown();
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))
        .context("failed to install SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))
        .context("failed to install SIGTERM handler")?;

    let schedule = SharedSchedule::default();
    let refresher = Refresher::spawn(
        Arc::clone(&resolver),
        schedule.clone(),
        zone.clone(),
        Duration::from_secs(cli.refresh_secs),
    )?;
    let (commands_tx, commands_rx) = mpsc::channel();

    let api_server = if cli.no_api {
        None
    } else {
        let server = ApiServer::start(
            ApiServerConfig {
                bind_addr: cli.api_bind.clone(),
                port: cli.api_port,
            },
            ApiContext {
                schedule: schedule.clone(),
                settings: Arc::new(Mutex::new(store)),
                resolver: Arc::clone(&resolver),
                commands: commands_tx,
                clock: Arc::clone(&clock),
            },
        )
        .with_context(|| {
            format!(
                "failed to start local API at {}:{}",
                cli.api_bind, cli.api_port
            )
        })?;
        if let Some(addr) = server.local_addr() {
            tracing::info!(addr = %addr, "local API listening");
        }
        Some(server)
    };

    tracing::info!(zone = %zone, clock = clock.label(), "kiosk running");
    let driver = TickDriver::new(&settings, audio, Box::new(ConsoleDisplay::stdout()));
    runtime::run_kiosk(
        driver,
        settings,
        KioskLoop {
            clock: clock.as_ref(),
            schedule,
            refresher: &refresher,
            commands: commands_rx,
            stop,
        },
    );

    drop(api_server);
    drop(refresher);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_resolver(cli: &Cli) -> TimeSourceResolver {
    let remote: Box<dyn RemoteSource> = if cli.offline {
        Box::new(OfflineRemote)
    } else {
        match EsolatClient::new(DEFAULT_FETCH_TIMEOUT) {
            Ok(client) => Box::new(client),
            Err(err) => {
                tracing::warn!(error = %err, "HTTP client unavailable, running offline");
                Box::new(OfflineRemote)
            }
        }
    };
    TimeSourceResolver::new(remote, Box::new(JsonFileCache::new(cli.cache.clone())))
}

fn build_audio_chain(cli: &Cli, settings: &Settings) -> AudioChain {
    let playback = select_playback();
    let sinks: Vec<Box<dyn AudioSink>> = vec![
        Box::new(FileBackedSink::new(cli.audio_dir.clone(), Arc::clone(&playback))),
        Box::new(SynthesizedToneSink::new(playback)),
    ];
    AudioChain::new(sinks, settings.azan.enabled, settings.azan.volume)
}

#[cfg(feature = "playback")]
fn select_playback() -> Arc<dyn Playback> {
    match audio::playback::RodioPlayback::new() {
        Ok(device) => Arc::new(device),
        Err(err) => {
            tracing::warn!(error = %err, "audio device unavailable, logging cues instead");
            Arc::new(LoggingPlayback)
        }
    }
}

#[cfg(not(feature = "playback"))]
fn select_playback() -> Arc<dyn Playback> {
    Arc::new(LoggingPlayback)
}
