pub mod activity;
pub mod alerts;
pub mod report;
pub mod sensing;
pub mod settings;
pub mod timeline;
pub mod timer;
mod utils;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};

use alerts::{Alert, AlertPlayer};
use report::SessionSummary;
use sensing::{SimulatedCamera, SimulatedDetector};
use settings::SettingsStore;
use timer::{
    commands::{dispatch, status_line, ControlCommand},
    CycleKind, DeviceStatus, Session, SessionConfig, SessionController, SessionEvent,
    SessionRunState,
};

const ENABLE_LOGS: bool = true;

pub const SETTINGS_ENV: &str = "FOCUSCAM_SETTINGS";
const DEFAULT_SETTINGS_FILE: &str = "focuscam.json";
/// Bounds, in seconds, for how long one simulated scene lasts.
const SIMULATED_SCENE_SECS: (u64, u64) = (3, 15);

const HELP: &str = "commands: g=start p=pause r=resume s=stop c=restart x=reset \
                    m <default|phone-freezes|pen-gated|phone-alerts> ?=status q=quit";

/// Focus-session timer driven by camera detections.
#[derive(Debug, Parser)]
#[command(name = "focuscam", version, about)]
struct CliOptions {
    /// JSON settings file; missing files fall back to defaults
    #[arg(env = SETTINGS_ENV, default_value = DEFAULT_SETTINGS_FILE)]
    settings_path: PathBuf,
    /// Print session summaries as JSON instead of the text report
    #[arg(long)]
    json: bool,
}

pub fn run() -> Result<()> {
    // RUST_LOG overrides the Info default.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let options = CliOptions::parse();
    let settings = SettingsStore::new(options.settings_path.clone())?;
    let config = settings.session_config()?;
    let alerts = AlertPlayer::new(settings.alerts()?);

    log_info!(
        "focuscam starting ({} x {}s focus / {}s break, {:?} mode)",
        config.total_sets,
        config.focus_secs,
        config.break_secs,
        config.mode
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, &settings, alerts, options.json))
}

fn simulated_scene_frames(config: &SessionConfig) -> std::ops::RangeInclusive<u32> {
    let per_sec = (1_000 / config.frame_interval_ms.max(1)).max(1);
    let (lo, hi) = SIMULATED_SCENE_SECS;
    let lo = u32::try_from(lo * per_sec).unwrap_or(u32::MAX);
    let hi = u32::try_from(hi * per_sec).unwrap_or(u32::MAX);
    lo..=hi
}

async fn serve(
    config: SessionConfig,
    settings: &SettingsStore,
    alerts: AlertPlayer,
    json: bool,
) -> Result<()> {
    let detector = SimulatedDetector::new(simulated_scene_frames(&config));
    let session = Session::new(config, Box::new(SimulatedCamera::new()), Box::new(detector))?;
    let controller = SessionController::new(session);
    let presenter = spawn_presenter(&controller, alerts, json);

    println!("{HELP}");
    println!("{}", status_line(&controller.get_snapshot().await));

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == ControlCommand::Quit {
            break;
        }
        match dispatch(&controller, command).await {
            Ok(status) => {
                println!("{status}");
                if let ControlCommand::Mode(mode) = command {
                    if let Err(err) = settings.set_mode(mode) {
                        log_warn!("mode not saved: {err:#}");
                    }
                }
            }
            Err(err) => println!("{err:#}"),
        }
    }

    let run_state = controller.get_snapshot().await.run_state;
    if matches!(run_state, SessionRunState::Running | SessionRunState::Paused) {
        controller.stop().await?;
    }
    controller.shutdown().await;

    // Dropping the last sender closes the channel, letting the presenter
    // flush what is left and exit.
    drop(controller);
    if let Err(err) = presenter.await {
        log_warn!("event presenter failed: {err}");
    }
    log_info!("focuscam exiting");
    Ok(())
}

/// Turns session events into sounds and terminal output.
fn spawn_presenter(
    controller: &SessionController,
    alerts: AlertPlayer,
    json: bool,
) -> JoinHandle<()> {
    let mut events = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => present(&event, &alerts, json),
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!("presenter lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn present(event: &SessionEvent, alerts: &AlertPlayer, json: bool) {
    let sound = match event {
        SessionEvent::RunStateChanged { run_state, .. } => {
            log_info!("session {run_state}");
            None
        }
        SessionEvent::ActivityChanged { from, to, .. } => {
            log_info!("activity {from} -> {to}");
            None
        }
        SessionEvent::CycleChanged { cycle, .. } => {
            println!(
                "set {} {}",
                cycle.set_index,
                match cycle.cycle_kind {
                    CycleKind::Focus => "focus",
                    CycleKind::Break => "break",
                }
            );
            Some(match cycle.cycle_kind {
                CycleKind::Focus => Alert::FocusStarted,
                CycleKind::Break => Alert::BreakStarted,
            })
        }
        SessionEvent::PhoneAlert { .. } => {
            println!("Put the phone away!");
            Some(Alert::PhoneWarning)
        }
        SessionEvent::DeviceStatus { status, .. } => {
            match status {
                DeviceStatus::Unavailable { reason } => log_warn!("camera unavailable: {reason}"),
                DeviceStatus::Failing {
                    consecutive_failures,
                    reason,
                } => log_warn!("camera failing ({consecutive_failures} reads): {reason}"),
                other => log_debug!("camera {other:?}"),
            }
            None
        }
        SessionEvent::Heartbeat {
            cycle, activity, ..
        } => {
            log_debug!(
                "heartbeat set {} {:?} {}s left, {activity}",
                cycle.set_index,
                cycle.cycle_kind,
                cycle.time_remaining_secs
            );
            None
        }
        SessionEvent::Finished { summary } => {
            print_summary(summary, json);
            (summary.outcome == SessionRunState::Completed).then_some(Alert::SessionFinished)
        }
    };

    if let Some(alert) = sound {
        if let Err(err) = alerts.play(alert) {
            log_warn!("alert playback failed: {err:#}");
        }
    }
}

fn print_summary(summary: &SessionSummary, json: bool) {
    if json {
        match serde_json::to_string_pretty(summary) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => log_warn!("failed to serialise summary: {err}"),
        }
    } else {
        println!("{}", summary.render());
    }
}
