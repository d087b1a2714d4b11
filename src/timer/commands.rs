use std::str::FromStr;

use anyhow::{anyhow, Result};

use super::{CycleKind, DetectionMode, SessionConfig, SessionController, SessionSnapshot};

/// Operator commands accepted on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Pause,
    Resume,
    Stop,
    Restart,
    Reset,
    /// Picks the detection mode for the next session; only while idle.
    Mode(DetectionMode),
    Status,
    Quit,
}

impl FromStr for ControlCommand {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self> {
        let input = input.trim().to_ascii_lowercase();
        let (verb, arg) = match input.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, Some(arg.trim())),
            None => (input.as_str(), None),
        };
        if let "m" | "mode" = verb {
            let arg = arg.ok_or_else(|| anyhow!("usage: m <mode>"))?;
            return Ok(ControlCommand::Mode(arg.parse()?));
        }
        if let Some(arg) = arg {
            return Err(anyhow!("'{verb}' takes no argument, got '{arg}'"));
        }
        match verb {
            "g" | "go" | "start" => Ok(ControlCommand::Start),
            "p" | "pause" => Ok(ControlCommand::Pause),
            "r" | "resume" => Ok(ControlCommand::Resume),
            "s" | "stop" => Ok(ControlCommand::Stop),
            "c" | "continue" | "restart" => Ok(ControlCommand::Restart),
            "x" | "reset" => Ok(ControlCommand::Reset),
            "?" | "status" => Ok(ControlCommand::Status),
            "q" | "quit" | "exit" => Ok(ControlCommand::Quit),
            other => Err(anyhow!(
                "unknown command '{other}' (g=start p=pause r=resume s=stop c=restart x=reset \
                 m <mode> ?=status q=quit)"
            )),
        }
    }
}

/// Applies `command` to the controller and returns a one-line status for the
/// operator. `Quit` is handled by the caller.
pub async fn dispatch(controller: &SessionController, command: ControlCommand) -> Result<String> {
    let snapshot = match command {
        ControlCommand::Start => controller.start().await?,
        ControlCommand::Pause => controller.pause().await?,
        ControlCommand::Resume => controller.resume().await?,
        ControlCommand::Stop => {
            controller.stop().await?;
            controller.get_snapshot().await
        }
        ControlCommand::Restart => controller.restart().await?,
        ControlCommand::Reset => controller.reset().await?,
        ControlCommand::Mode(mode) => {
            let config = SessionConfig {
                mode,
                ..controller.config().await
            };
            controller.configure(config).await?;
            controller.get_snapshot().await
        }
        ControlCommand::Status | ControlCommand::Quit => controller.get_snapshot().await,
    };
    Ok(status_line(&snapshot))
}

pub fn status_line(snapshot: &SessionSnapshot) -> String {
    let phase = match snapshot.cycle.cycle_kind {
        CycleKind::Focus => "focus",
        CycleKind::Break => "break",
    };
    let remaining = snapshot.cycle.time_remaining_secs;
    format!(
        "[{}] set {}/{} {} {:02}:{:02} | {} | {:?} mode",
        snapshot.run_state,
        snapshot.cycle.set_index,
        snapshot.total_sets,
        phase,
        remaining / 60,
        remaining % 60,
        snapshot.activity,
        snapshot.mode
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeCamera, FakeDetector};
    use crate::timer::{Session, SessionRunState};

    #[test]
    fn parses_short_and_long_forms() {
        assert_eq!("p".parse::<ControlCommand>().unwrap(), ControlCommand::Pause);
        assert_eq!(
            " Resume ".parse::<ControlCommand>().unwrap(),
            ControlCommand::Resume
        );
        assert_eq!("x".parse::<ControlCommand>().unwrap(), ControlCommand::Reset);
        assert!("dance".parse::<ControlCommand>().is_err());
    }

    #[test]
    fn mode_command_takes_a_mode_argument() {
        assert_eq!(
            "m pen".parse::<ControlCommand>().unwrap(),
            ControlCommand::Mode(DetectionMode::PenGated)
        );
        assert_eq!(
            "mode  phone-alerts".parse::<ControlCommand>().unwrap(),
            ControlCommand::Mode(DetectionMode::PhoneAlerts)
        );
        assert!("m".parse::<ControlCommand>().is_err());
        assert!("m sideways".parse::<ControlCommand>().is_err());
        assert!("p now".parse::<ControlCommand>().is_err());
    }

    #[tokio::test]
    async fn mode_changes_only_while_idle() {
        let session = Session::new(
            SessionConfig {
                frame_interval_ms: 10,
                ..SessionConfig::default()
            },
            Box::new(FakeCamera::new()),
            Box::new(FakeDetector::new()),
        )
        .unwrap();
        let controller = SessionController::new(session);

        let line = dispatch(&controller, ControlCommand::Mode(DetectionMode::PenGated))
            .await
            .unwrap();
        assert!(line.ends_with("PenGated mode"));
        assert_eq!(controller.config().await.mode, DetectionMode::PenGated);

        controller.start().await.unwrap();
        let changed = dispatch(&controller, ControlCommand::Mode(DetectionMode::Default)).await;
        assert!(changed.is_err());
        assert_eq!(controller.config().await.mode, DetectionMode::PenGated);
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn dispatch_reports_status_line() {
        let session = Session::new(
            SessionConfig {
                focus_secs: 90,
                frame_interval_ms: 10,
                ..SessionConfig::default()
            },
            Box::new(FakeCamera::new()),
            Box::new(FakeDetector::new()),
        )
        .unwrap();
        let controller = SessionController::new(session);

        let line = dispatch(&controller, ControlCommand::Start).await.unwrap();
        assert!(line.starts_with("[running] set 1/1 focus 01:"));

        dispatch(&controller, ControlCommand::Stop).await.unwrap();
        assert_eq!(
            controller.get_snapshot().await.run_state,
            SessionRunState::Stopped
        );
        assert!(dispatch(&controller, ControlCommand::Pause).await.is_err());
        controller.shutdown().await;
    }
}
