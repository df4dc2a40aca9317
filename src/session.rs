//! Session orchestrator.
//!
//! The control thread owns the link and the id to instance map. It reads one
//! lifecycle event at a time, answers it, and then kills any instance whose
//! destroy notification arrived while a capability call was in flight. The
//! link lock is only ever taken for a single send or receive, never while
//! waiting on a worker.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Value as Json, json};
use tracing::{debug, error, info};

use crate::config::RuntimeConfig;
use crate::error::{ErrorKind, ProgramError};
use crate::game::Team;
use crate::gateway::{Gateway, Link, SharedAuthority};
use crate::protocol::{Event, Method};
use crate::sandbox::{Bundle, Sandbox, SandboxOptions};
use crate::scheduler::{Failure, Robot};
use crate::transport::TransportError;
use crate::vm::Meter;

/// Competitor-facing diagnostics, prefixed `[<team>: #<id>@<round>]`.
#[derive(Debug, Clone)]
pub struct ErrorPrinter {
    team: Team,
    id: i64,
    round: Arc<AtomicI64>,
}

impl ErrorPrinter {
    /// Printer for one instance. `round` is shared with the session.
    #[must_use]
    pub const fn new(team: Team, id: i64, round: Arc<AtomicI64>) -> Self {
        Self { team, id, round }
    }

    /// Message prefix with the current round.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!(
            "[{}: #{}@{}]",
            self.team.label(),
            self.id,
            self.round.load(Ordering::Relaxed)
        )
    }

    /// Emit one diagnostic.
    pub fn print(&self, message: &str) {
        error!(target: "bot", "{} ERROR: {message}", self.prefix());
    }
}

/// Failure that ends the session.
#[derive(Debug)]
pub enum SessionError {
    /// The link failed.
    Transport(TransportError),
    /// The authority sent something the protocol does not allow.
    Protocol(String),
    /// A worker thread could not be started.
    Spawn(io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Spawn(e) => write!(f, "failed to start worker thread: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Spawn(e) => Some(e),
            Self::Protocol(_) => None,
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// One connection's worth of games.
pub struct Session {
    link: Arc<Mutex<Link>>,
    programs: HashMap<Team, Arc<Bundle>>,
    robots: HashMap<i64, Robot>,
    round: Arc<AtomicI64>,
    config: RuntimeConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("teams", &self.programs.keys().collect::<Vec<_>>())
            .field("robots", &self.robots.len())
            .field("round", &self.round.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Session over a connected link. Teams without a program get none.
    #[must_use]
    pub fn new(link: Link, config: RuntimeConfig) -> Self {
        Self {
            link: Arc::new(Mutex::new(link)),
            programs: HashMap::new(),
            robots: HashMap::new(),
            round: Arc::new(AtomicI64::new(0)),
            config,
        }
    }

    /// Run `bundle` for every instance spawned on `team`.
    #[must_use]
    pub fn with_program(mut self, team: Team, bundle: Arc<Bundle>) -> Self {
        self.programs.insert(team, bundle);
        self
    }

    /// Number of live instances.
    #[must_use]
    pub fn live(&self) -> usize {
        self.robots.len()
    }

    fn link(&self) -> Result<MutexGuard<'_, Link>, TransportError> {
        self.link.lock().map_err(|_| TransportError::Poisoned)
    }

    /// Serve events until `end_game` or a fatal error. Every instance is
    /// killed and the link closed either way.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if the link fails, the authority breaks the
    /// protocol, or a worker cannot be started.
    pub fn run(&mut self) -> Result<(), SessionError> {
        let result = self.serve();
        if let Err(e) = &result {
            error!("session failed: {e}");
        }
        self.shutdown();
        result
    }

    fn serve(&mut self) -> Result<(), SessionError> {
        loop {
            let message = self.link()?.receive()?;
            if message.is_null() {
                continue;
            }
            let event = parse_event(message)?;
            if self.config.debug {
                debug!(?event, "received");
            }
            let flow = self.handle(event)?;
            self.drain_destroyed()?;
            if flow == Flow::Stop {
                return Ok(());
            }
        }
    }

    fn handle(&mut self, event: Event) -> Result<Flow, SessionError> {
        match event {
            Event::SpawnBot { team, id } => self.spawn_bot(team, id)?,
            Event::DestroyBot { id } => {
                self.link()?.send_null()?;
                self.destroy(id);
            }
            Event::StartTurn { round, id } => self.start_turn(round, id)?,
            Event::EndGame => {
                info!(robots = self.robots.len(), "game over");
                self.robots.clear();
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn destroy(&mut self, id: i64) {
        if let Some(mut robot) = self.robots.remove(&id) {
            debug!(id, "destroying");
            robot.kill();
        }
    }

    fn drain_destroyed(&mut self) -> Result<(), SessionError> {
        let pending = self.link()?.take_destroyed();
        for id in pending {
            self.destroy(id);
        }
        Ok(())
    }

    fn spawn_bot(&mut self, team: usize, id: i64) -> Result<(), SessionError> {
        self.link()?.send_null()?;
        let team = Team::from_ordinal(team)
            .ok_or_else(|| SessionError::Protocol(format!("unknown team ordinal {team}")))?;
        let printer = ErrorPrinter::new(team, id, Arc::clone(&self.round));
        debug!(id, team = team.label(), "spawning");

        let Some(bundle) = self.programs.get(&team).cloned() else {
            let error = ProgramError::runtime(format!("No program for team {}.", team.label()));
            printer.print(&error.to_string());
            return self.report(Failure::Program(error));
        };

        let authority: SharedAuthority = self.link.clone();
        let limit = self.config.bytecode_limit;
        let options = SandboxOptions {
            entity_id: id,
            max_depth: self.config.max_depth,
        };
        let mut robot = Robot::spawn(id, self.config.stack_size, printer, move |suspend| {
            let gateway = Gateway::new(authority);
            Ok(Sandbox::new(bundle, &gateway, Meter::suspending(limit, suspend), options))
        })
        .map_err(SessionError::Spawn)?;

        match robot.init(limit) {
            Ok(report) => {
                debug!(id, used = report.used, paused = report.paused, "initialised");
                self.robots.insert(id, robot);
                self.link()?.send(Method::EndTurn, vec![json!(report.used)])?;
                Ok(())
            }
            Err(failure) => self.report(failure),
        }
    }

    fn start_turn(&mut self, round: i64, id: i64) -> Result<(), SessionError> {
        self.round.store(round, Ordering::Relaxed);
        let limit = self.config.bytecode_limit;
        let Some(robot) = self.robots.get_mut(&id) else {
            // Initialisation failed, so there is nothing to run.
            return Ok(self.link()?.send(Method::RcDisintegrate, Vec::new())?);
        };
        match robot.run_turn(limit) {
            Ok(report) => {
                debug!(id, round, used = report.used, paused = report.paused, "turn");
                self.link()?.send(Method::EndTurn, vec![json!(report.used)])?;
                Ok(())
            }
            Err(failure) => {
                self.robots.remove(&id);
                if self.config.debug {
                    debug!(id, round, "turn failed: {failure}");
                }
                self.report(failure)
            }
        }
    }

    /// Send the upstream report for an instance that failed.
    fn report(&self, failure: Failure) -> Result<(), SessionError> {
        let (method, params) = match failure {
            Failure::Transport(e) => return Err(e.into()),
            Failure::Program(e) => match e.kind() {
                ErrorKind::GameAction(kind) => (
                    Method::ThrowGameActionException,
                    vec![json!(kind.ordinal()), Json::String(e.format_traceback())],
                ),
                _ => (Method::ThrowException, vec![Json::String(e.format_traceback())]),
            },
            Failure::Crashed(message) => (
                Method::ThrowException,
                vec![Json::String(format!("RuntimeError: worker crashed: {message}\n"))],
            ),
        };
        self.link()?.send(method, params)?;
        Ok(())
    }

    fn shutdown(&mut self) {
        for (_, mut robot) in self.robots.drain() {
            robot.kill();
        }
        if let Ok(mut link) = self.link.lock() {
            link.close();
        }
    }
}

fn parse_event(message: Json) -> Result<Event, SessionError> {
    let kind = message.get("type").cloned().unwrap_or(Json::Null);
    serde_json::from_value(message)
        .map_err(|e| SessionError::Protocol(format!("Unknown message type: {kind} ({e})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printer_prefix_tracks_round() {
        let round = Arc::new(AtomicI64::new(0));
        let printer = ErrorPrinter::new(Team::Neutral, 12, Arc::clone(&round));
        assert_eq!(printer.prefix(), "[N: #12@0]");
        round.store(40, Ordering::Relaxed);
        assert_eq!(printer.prefix(), "[N: #12@40]");
    }

    #[test]
    fn test_parse_events() {
        assert_eq!(
            parse_event(json!({"type": "start_turn", "round": 3, "id": 9})).unwrap(),
            Event::StartTurn { round: 3, id: 9 }
        );
        assert_eq!(parse_event(json!({"type": "end_game"})).unwrap(), Event::EndGame);
        let err = parse_event(json!({"type": "reboot"})).unwrap_err();
        assert!(err.to_string().contains("Unknown message type: \"reboot\""));
    }
}
