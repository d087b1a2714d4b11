use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::{
    sync::{broadcast, Mutex},
    task::{self, JoinHandle},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::report::SessionSummary;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

use super::{
    config::SessionConfig,
    events::SessionEvent,
    session::{Session, SessionSnapshot},
    state::SessionRunState,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

struct Ticker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Drives a [`Session`] on a tokio interval and fans its events out to
/// subscribers.
///
/// Commands and ticks serialize on the same mutex, so a command issued while a
/// frame is being processed takes effect right after that tick.
#[derive(Clone)]
pub struct SessionController {
    session: Arc<Mutex<Session>>,
    events: broadcast::Sender<SessionEvent>,
    ticker: Arc<Mutex<Option<Ticker>>>,
}

impl SessionController {
    pub fn new(session: Session) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            session: Arc::new(Mutex::new(session)),
            events,
            ticker: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn get_snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    pub async fn summary(&self) -> Option<SessionSummary> {
        self.session.lock().await.summary().cloned()
    }

    pub async fn config(&self) -> SessionConfig {
        self.session.lock().await.config().clone()
    }

    /// Replaces the session configuration; rejected unless the session is idle.
    pub async fn configure(&self, config: SessionConfig) -> Result<()> {
        self.apply(|session, _| session.configure(config)).await
    }

    pub async fn start(&self) -> Result<SessionSnapshot> {
        self.apply(|session, now| session.start(now)).await?;
        Ok(self.get_snapshot().await)
    }

    pub async fn pause(&self) -> Result<SessionSnapshot> {
        self.apply(|session, now| session.pause(now)).await?;
        Ok(self.get_snapshot().await)
    }

    pub async fn resume(&self) -> Result<SessionSnapshot> {
        self.apply(|session, now| session.resume(now)).await?;
        Ok(self.get_snapshot().await)
    }

    pub async fn stop(&self) -> Result<Option<SessionSummary>> {
        self.apply(|session, now| session.stop(now)).await?;
        Ok(self.summary().await)
    }

    pub async fn restart(&self) -> Result<SessionSnapshot> {
        self.apply(|session, now| session.restart(now)).await?;
        Ok(self.get_snapshot().await)
    }

    pub async fn reset(&self) -> Result<SessionSnapshot> {
        self.apply(|session, now| {
            session.reset(now);
            Ok(())
        })
        .await?;
        Ok(self.get_snapshot().await)
    }

    /// Stops the ticker and releases the camera.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        let mut guard = self.session.lock().await;
        guard.reset(Utc::now());
        publish(&self.events, guard.drain_events());
    }

    async fn apply<F>(&self, command: F) -> Result<()>
    where
        F: FnOnce(&mut Session, DateTime<Utc>) -> Result<()>,
    {
        let (result, running, tick_interval) = {
            let mut guard = self.session.lock().await;
            let result = command(&mut guard, Utc::now());
            publish(&self.events, guard.drain_events());
            (
                result,
                guard.run_state() == SessionRunState::Running,
                guard.config().frame_interval(),
            )
        };

        // The session lock is released before joining so an in-flight tick
        // can finish.
        if running {
            self.ensure_ticker(tick_interval).await;
        } else {
            self.cancel_ticker().await;
        }
        result
    }

    async fn ensure_ticker(&self, tick_interval: Duration) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(ticker) = ticker_guard.as_ref() {
            if !ticker.handle.is_finished() {
                return;
            }
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(ticker_loop(
            self.session.clone(),
            self.events.clone(),
            tick_interval,
            cancel_token.clone(),
        ));
        *ticker_guard = Some(Ticker {
            handle,
            cancel_token,
        });
    }

    async fn cancel_ticker(&self) {
        let ticker = self.ticker.lock().await.take();
        if let Some(ticker) = ticker {
            ticker.cancel_token.cancel();
            if let Err(err) = ticker.handle.await {
                log_error!("session ticker failed to join: {err}");
            }
        }
    }
}

async fn ticker_loop(
    session: Arc<Mutex<Session>>,
    events: broadcast::Sender<SessionEvent>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut interval = time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let guard = session.clone().lock_owned().await;
                // Frame reads and inference block, keep them off the runtime.
                let outcome = task::spawn_blocking(move || {
                    let mut guard = guard;
                    guard.tick(Utc::now());
                    (guard.run_state(), guard.drain_events())
                })
                .await;

                match outcome {
                    Ok((run_state, drained)) => {
                        publish(&events, drained);
                        if run_state != SessionRunState::Running {
                            log_info!("session {}; ticker exiting", run_state);
                            break;
                        }
                    }
                    Err(err) => {
                        log_error!("session tick worker failed: {err}");
                        break;
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                log_debug!("session ticker cancelled");
                break;
            }
        }
    }
}

fn publish(events: &broadcast::Sender<SessionEvent>, drained: Vec<SessionEvent>) {
    for event in drained {
        // No subscribers is fine; snapshots remain available.
        let _ = events.send(event);
    }
}
