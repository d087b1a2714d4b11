pub mod tone;

use anyhow::{anyhow, Result};
use rodio::{OutputStream, Sink};
use serde::{Deserialize, Serialize};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use tone::Tone;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Sounds the session can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    PhoneWarning,
    BreakStarted,
    FocusStarted,
    SessionFinished,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertSettings {
    pub enabled: bool,
    pub volume: f32,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.6,
        }
    }
}

/// (frequency Hz, length ms) steps making up each alert.
pub fn tone_steps(alert: Alert) -> &'static [(f32, u64)] {
    match alert {
        Alert::PhoneWarning => &[(988.0, 120), (0.0, 60), (988.0, 120), (0.0, 60), (988.0, 120)],
        Alert::BreakStarted => &[(784.0, 180), (523.0, 260)],
        Alert::FocusStarted => &[(523.0, 180), (784.0, 260)],
        Alert::SessionFinished => &[(523.0, 160), (659.0, 160), (784.0, 320)],
    }
}

/// Plays alert tones on a dedicated thread that owns the non-`Send` rodio
/// output stream. The thread is spawned on first use.
#[derive(Clone)]
pub struct AlertPlayer {
    tx: Arc<Mutex<Option<Sender<Alert>>>>,
    settings: AlertSettings,
}

impl AlertPlayer {
    pub fn new(settings: AlertSettings) -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
            settings,
        }
    }

    fn ensure_thread(&self) -> Result<Sender<Alert>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("alert player lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<Alert>();
        let volume = self.settings.volume.clamp(0.0, 1.0);

        thread::Builder::new()
            .name("alert-player".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<()> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| anyhow!("failed to open audio output: {e}"))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| anyhow!("failed to create audio sink: {e}"))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(alert) = rx.recv() {
                    if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                        log_warn!("dropping {alert:?} alert: {err}");
                        continue;
                    }
                    if let Some(ref s) = sink {
                        s.set_volume(volume);
                        for &(frequency, millis) in tone_steps(alert) {
                            let amplitude = if frequency > 0.0 { 0.5 } else { 0.0 };
                            s.append(Tone::new(
                                frequency,
                                Duration::from_millis(millis),
                                amplitude,
                            ));
                        }
                    }
                }
                log_debug!("alert player thread exiting");
            })
            .map_err(|e| anyhow!("failed to spawn alert thread: {e}"))?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    pub fn play(&self, alert: Alert) -> Result<()> {
        if !self.settings.enabled {
            return Ok(());
        }
        let tx = self.ensure_thread()?;
        tx.send(alert).map_err(|e| anyhow!("alert thread gone: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alert_has_audible_steps() {
        for alert in [
            Alert::PhoneWarning,
            Alert::BreakStarted,
            Alert::FocusStarted,
            Alert::SessionFinished,
        ] {
            assert!(tone_steps(alert).iter().any(|&(freq, ms)| freq > 0.0 && ms > 0));
        }
    }

    #[test]
    fn disabled_player_never_spawns_a_thread() {
        let player = AlertPlayer::new(AlertSettings {
            enabled: false,
            ..AlertSettings::default()
        });
        player.play(Alert::PhoneWarning).unwrap();
        assert!(player.tx.lock().unwrap().is_none());
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: AlertSettings = serde_json::from_str(r#"{"enabled":false}"#).unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.volume, AlertSettings::default().volume);
    }
}
