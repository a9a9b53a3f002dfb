use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use engine::{FixedStepClock, InputAction, InputSnapshot, LoopConfig};
use thiserror::Error;
use tracing::{debug, error, info};

use super::bootstrap::AppWiring;
use super::gameplay::GameSession;

/// Simulated wall time fed to the clock per frame.
const FRAME_WALL_TIME: Duration = Duration::from_millis(50);
/// Idle time simulated after every command so motion settles.
const SETTLE_SECONDS: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum RunnerCommand {
    Press(InputAction),
    NewGame,
    Continue,
    Retry,
    Menu,
    /// Zero-based inventory slot.
    Replace(usize),
    Cancel,
    Wait(f32),
    State,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum CommandError {
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("'{command}' expects {expected}")]
    BadArgument {
        command: &'static str,
        expected: &'static str,
    },
}

#[derive(Debug, Error)]
pub(crate) enum RunnerError {
    #[error("write runner output: {0}")]
    Io(#[from] io::Error),
    #[error("encode state json: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Parses one stdin line. Blank lines yield `None`.
pub(crate) fn parse_command(line: &str) -> Result<Option<RunnerCommand>, CommandError> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(None);
    };
    let argument = parts.next();
    let command = match head.to_ascii_lowercase().as_str() {
        "w" | "up" => RunnerCommand::Press(InputAction::MoveUp),
        "a" | "left" => RunnerCommand::Press(InputAction::MoveLeft),
        "s" | "down" => RunnerCommand::Press(InputAction::MoveDown),
        "d" | "right" => RunnerCommand::Press(InputAction::MoveRight),
        "use" | "e" => RunnerCommand::Press(InputAction::ActivateItem),
        "1" => RunnerCommand::Press(InputAction::SelectSlot1),
        "2" => RunnerCommand::Press(InputAction::SelectSlot2),
        "3" => RunnerCommand::Press(InputAction::SelectSlot3),
        "pause" | "p" => RunnerCommand::Press(InputAction::Pause),
        "new" => RunnerCommand::NewGame,
        "continue" => RunnerCommand::Continue,
        "retry" => RunnerCommand::Retry,
        "menu" => RunnerCommand::Menu,
        "replace" => {
            let slot = argument
                .and_then(|raw| raw.parse::<usize>().ok())
                .filter(|slot| *slot >= 1)
                .ok_or(CommandError::BadArgument {
                    command: "replace",
                    expected: "a slot number starting at 1",
                })?;
            RunnerCommand::Replace(slot - 1)
        }
        "cancel" => RunnerCommand::Cancel,
        "wait" => {
            let seconds = argument
                .and_then(|raw| raw.parse::<f32>().ok())
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .ok_or(CommandError::BadArgument {
                    command: "wait",
                    expected: "a non-negative number of seconds",
                })?;
            RunnerCommand::Wait(seconds)
        }
        "state" => RunnerCommand::State,
        "quit" | "q" | "exit" => RunnerCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

/// Drives a session from text commands on a fixed simulation step.
pub(crate) struct Runner<W> {
    session: GameSession,
    clock: FixedStepClock,
    out: W,
    ticks: u64,
}

impl<W: Write> Runner<W> {
    pub(crate) fn new(session: GameSession, config: &LoopConfig, out: W) -> Self {
        Self {
            session,
            clock: FixedStepClock::new(config),
            out,
            ticks: 0,
        }
    }

    pub(crate) fn session(&self) -> &GameSession {
        &self.session
    }

    pub(crate) fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns `false` once the runner should stop.
    pub(crate) fn execute(&mut self, command: RunnerCommand) -> Result<bool, RunnerError> {
        debug!(?command, "runner_command");
        match command {
            RunnerCommand::Press(action) => {
                let input = InputSnapshot::empty().with_action_down(action, true);
                self.tick(&input);
                self.idle(SETTLE_SECONDS);
            }
            RunnerCommand::NewGame => {
                self.session.new_game();
                self.idle(SETTLE_SECONDS);
            }
            RunnerCommand::Continue => {
                if self.session.continue_game().is_none() {
                    writeln!(self.out, "no saved progress")?;
                }
                self.idle(SETTLE_SECONDS);
            }
            RunnerCommand::Retry => {
                self.session.retry();
                self.idle(SETTLE_SECONDS);
            }
            RunnerCommand::Menu => self.session.to_main_menu(),
            RunnerCommand::Replace(slot) => {
                self.session.resolve_replace(Some(slot));
                self.idle(SETTLE_SECONDS);
            }
            RunnerCommand::Cancel => {
                self.session.resolve_replace(None);
            }
            RunnerCommand::Wait(seconds) => self.idle(seconds),
            RunnerCommand::State => {
                let dump = serde_json::to_string_pretty(&self.session.dump_state())?;
                writeln!(self.out, "{dump}")?;
                return Ok(true);
            }
            RunnerCommand::Quit => return Ok(false),
        }
        writeln!(self.out, "{}", self.session.hud_line())?;
        Ok(true)
    }

    /// Runs exactly one simulation tick with `input`.
    fn tick(&mut self, input: &InputSnapshot) {
        self.session.update(input, self.clock.fixed_dt_seconds());
        self.ticks += 1;
    }

    /// Feeds `seconds` of idle wall time through the fixed-step clock.
    fn idle(&mut self, seconds: f32) {
        let mut remaining = Duration::from_secs_f32(seconds);
        let empty = InputSnapshot::empty();
        while !remaining.is_zero() {
            let frame = remaining.min(FRAME_WALL_TIME);
            remaining = remaining.saturating_sub(frame);
            let plan = self.clock.advance(frame);
            for _ in 0..plan.ticks_to_run {
                self.tick(&empty);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.out
    }
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let stdout = io::stdout();
    let mut runner = Runner::new(app.session, &app.config, stdout.lock());
    let banner = runner.session().hud_line();
    if let Err(err) = writeln!(runner.out, "{banner}") {
        error!(error = %err, "runner_output_failed");
        return ExitCode::FAILURE;
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                error!(error = %err, "stdin_read_failed");
                return ExitCode::FAILURE;
            }
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                if writeln!(runner.out, "error: {err}").is_err() {
                    return ExitCode::FAILURE;
                }
                continue;
            }
        };
        match runner.execute(command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                error!(error = %err, "runner_failed");
                return ExitCode::FAILURE;
            }
        }
    }

    info!(ticks = runner.ticks(), "runner_finished");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use engine::{compile_defs_from_str, GameState};

    use super::*;
    use crate::app::gameplay::progress::MemoryProgressStore;
    use crate::app::gameplay::{LogAudioSink, SessionConfig};

    fn runner() -> Runner<Vec<u8>> {
        let defs = compile_defs_from_str(
            "runner.xml",
            r#"<Defs>
                <StageDef><defName>first</defName><label>First</label>
                    <layout><row>P.K</row></layout>
                </StageDef>
            </Defs>"#,
        )
        .expect("defs");
        let session = GameSession::from_defs(
            SessionConfig::default(),
            &defs,
            Box::new(MemoryProgressStore::default()),
            Box::new(LogAudioSink),
        )
        .expect("session");
        Runner::new(session, &LoopConfig::default(), Vec::new())
    }

    #[test]
    fn parses_movement_and_menu_commands() {
        assert_eq!(
            parse_command("d"),
            Ok(Some(RunnerCommand::Press(InputAction::MoveRight)))
        );
        assert_eq!(
            parse_command("  USE "),
            Ok(Some(RunnerCommand::Press(InputAction::ActivateItem)))
        );
        assert_eq!(parse_command("new"), Ok(Some(RunnerCommand::NewGame)));
        assert_eq!(parse_command(""), Ok(None));
        assert_eq!(
            parse_command("jump"),
            Err(CommandError::Unknown("jump".to_string()))
        );
    }

    #[test]
    fn parses_arguments_and_rejects_bad_ones() {
        assert_eq!(parse_command("replace 2"), Ok(Some(RunnerCommand::Replace(1))));
        assert_eq!(parse_command("wait 0.5"), Ok(Some(RunnerCommand::Wait(0.5))));
        assert!(matches!(
            parse_command("replace 0"),
            Err(CommandError::BadArgument { command: "replace", .. })
        ));
        assert!(matches!(
            parse_command("wait -1"),
            Err(CommandError::BadArgument { command: "wait", .. })
        ));
    }

    #[test]
    fn wait_runs_whole_ticks_of_the_fixed_step() {
        let mut runner = runner();
        runner.execute(RunnerCommand::Wait(0.5)).expect("wait");
        assert!((29..=30).contains(&runner.ticks()));
    }

    #[test]
    fn commands_drive_the_session_and_print_the_hud() {
        let mut runner = runner();
        assert!(runner.execute(RunnerCommand::NewGame).expect("new"));
        assert!(runner
            .execute(RunnerCommand::Press(InputAction::MoveRight))
            .expect("move"));
        assert!(runner
            .execute(RunnerCommand::Press(InputAction::MoveRight))
            .expect("move"));
        assert!(runner.execute(RunnerCommand::State).expect("state"));
        assert_eq!(runner.session().state(), GameState::Playing);
        assert!(!runner.execute(RunnerCommand::Quit).expect("quit"));

        let output = String::from_utf8(runner.into_output()).expect("utf8");
        assert!(output.contains("moves 2 | key yes"));
        assert!(output.contains("\"def_name\": \"first\""));
    }
}
