//! Turn scheduler: one worker thread per program instance.
//!
//! The control thread drives a worker with [`Signal`]s and blocks until it
//! reports an [`Outcome`], so at most one turn of one instance is in flight.
//! A program that runs out of budget parks inside its metering call; the next
//! `Go` resumes it exactly where it stopped, with its whole call stack intact.

use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::error::ProgramError;
use crate::session::ErrorPrinter;
use crate::transport::TransportError;
use crate::vm::{Suspend, Unwind};

/// What a worker runs.
pub trait Program {
    /// Begin a turn with a fresh budget.
    fn start(&mut self, limit: i64);

    /// Budget left in the current turn.
    fn remaining(&self) -> i64;

    /// Whether `init` has completed. A turn requested before that runs
    /// `init` first; a repeated init request does nothing.
    fn initialized(&self) -> bool;

    /// Run the one-time initialisation.
    ///
    /// # Errors
    ///
    /// Whatever the program raises, or an unwind from the link or a kill.
    fn init(&mut self) -> Result<(), Unwind>;

    /// Run one turn.
    ///
    /// # Errors
    ///
    /// As [`Program::init`].
    fn turn(&mut self) -> Result<(), Unwind>;
}

/// Work the control thread asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Spawn-time initialisation.
    Init,
    /// One turn.
    Turn,
}

/// Control thread to worker.
#[derive(Debug, Clone, Copy)]
enum Signal {
    Go { limit: i64, request: Request },
    Kill,
}

/// Worker to control thread.
#[derive(Debug)]
enum Outcome {
    Paused { remaining: i64 },
    Completed { remaining: i64 },
    Failed(Failure),
}

/// Why an instance stopped for good.
#[derive(Debug)]
pub enum Failure {
    /// The program raised an error it did not handle.
    Program(ProgramError),
    /// A capability call lost the link.
    Transport(TransportError),
    /// The worker panicked or vanished.
    Crashed(String),
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Program(e) => write!(f, "{e}"),
            Self::Transport(e) => write!(f, "{e}"),
            Self::Crashed(msg) => write!(f, "RuntimeError: worker crashed: {msg}"),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Program(e) => Some(e),
            Self::Transport(e) => Some(e),
            Self::Crashed(_) => None,
        }
    }
}

impl From<ProgramError> for Failure {
    fn from(e: ProgramError) -> Self {
        Self::Program(e)
    }
}

impl From<TransportError> for Failure {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// Where an instance is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for the next turn.
    Idle,
    /// Executing on its worker.
    Running,
    /// Parked in a metering call after running out of budget.
    Paused,
    /// Killed, failed, or crashed.
    Finished,
}

/// Result of one `init` or turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnReport {
    /// Budget consumed; at least the limit when the turn paused.
    pub used: i64,
    /// The program ran out of budget and will resume next turn.
    pub paused: bool,
}

struct Channels {
    signals: Receiver<Signal>,
    outcomes: Sender<Outcome>,
    /// Request of the most recent `Go`, including one that resumed a pause.
    current: Cell<Request>,
}

/// Suspend hook that parks the worker until the next `Go`.
struct Parker {
    channels: Rc<Channels>,
    printer: ErrorPrinter,
}

impl Suspend for Parker {
    fn suspend(&mut self, remaining: i64) -> Result<i64, Unwind> {
        self.printer
            .print(&format!("Ran out of bytecode. Remaining bytecode: {remaining}"));
        self.channels
            .outcomes
            .send(Outcome::Paused { remaining })
            .map_err(|_| Unwind::Killed)?;
        match self.channels.signals.recv() {
            Ok(Signal::Go { limit, request }) => {
                self.channels.current.set(request);
                Ok(limit)
            }
            Ok(Signal::Kill) | Err(_) => Err(Unwind::Killed),
        }
    }
}

fn work<P: Program>(channels: &Channels, printer: &ErrorPrinter, mut program: P) {
    while let Ok(Signal::Go { limit, request }) = channels.signals.recv() {
        channels.current.set(request);
        program.start(limit);
        let mut result = if program.initialized() { Ok(()) } else { program.init() };
        // `current` moves to `Turn` when a turn resumed a paused init.
        if result.is_ok() && channels.current.get() == Request::Turn {
            result = program.turn();
        }
        let outcome = match result {
            Ok(()) => Outcome::Completed {
                remaining: program.remaining(),
            },
            Err(Unwind::Raise(e)) => {
                printer.print(&e.format_traceback());
                Outcome::Failed(Failure::Program(e))
            }
            Err(Unwind::Transport(e)) => Outcome::Failed(Failure::Transport(e)),
            Err(Unwind::Killed) => return,
        };
        let failed = matches!(outcome, Outcome::Failed(_));
        if channels.outcomes.send(outcome).is_err() || failed {
            return;
        }
    }
}

/// Handle to one instance's worker.
#[derive(Debug)]
pub struct Robot {
    id: i64,
    signals: Option<Sender<Signal>>,
    outcomes: Receiver<Outcome>,
    handle: Option<JoinHandle<()>>,
    state: TurnState,
}

impl Robot {
    /// Start a worker. `factory` builds the program on the worker thread and
    /// must install the given suspend hook in the program's meter.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the thread cannot be created.
    pub fn spawn<P, F>(
        id: i64,
        stack_size: usize,
        printer: ErrorPrinter,
        factory: F,
    ) -> io::Result<Self>
    where
        P: Program,
        F: FnOnce(Box<dyn Suspend>) -> Result<P, Failure> + Send + 'static,
    {
        let (signal_tx, signal_rx) = mpsc::channel();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("robot-{id}"))
            .stack_size(stack_size)
            .spawn(move || {
                let channels = Rc::new(Channels {
                    signals: signal_rx,
                    outcomes: outcome_tx,
                    current: Cell::new(Request::Init),
                });
                let parker = Parker {
                    channels: Rc::clone(&channels),
                    printer: printer.clone(),
                };
                match factory(Box::new(parker)) {
                    Ok(program) => work(&channels, &printer, program),
                    Err(failure) => {
                        if let Ok(Signal::Go { .. }) = channels.signals.recv() {
                            let _ = channels.outcomes.send(Outcome::Failed(failure));
                        }
                    }
                }
            })?;
        debug!(id, "worker started");
        Ok(Self {
            id,
            signals: Some(signal_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
            state: TurnState::Idle,
        })
    }

    /// Entity id.
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Run initialisation with `limit` budget.
    ///
    /// # Errors
    ///
    /// Returns the [`Failure`] that ended the instance; it is already killed.
    pub fn init(&mut self, limit: i64) -> Result<TurnReport, Failure> {
        self.go(Request::Init, limit)
    }

    /// Run one turn, resuming a paused one if there is one.
    ///
    /// # Errors
    ///
    /// As [`Robot::init`].
    pub fn run_turn(&mut self, limit: i64) -> Result<TurnReport, Failure> {
        self.go(Request::Turn, limit)
    }

    fn go(&mut self, request: Request, limit: i64) -> Result<TurnReport, Failure> {
        let Some(signals) = self.signals.as_ref() else {
            return Err(Failure::Crashed(format!("robot {} is not running", self.id)));
        };
        trace!(id = self.id, ?request, limit, resume = self.state == TurnState::Paused, "go");
        self.state = TurnState::Running;
        if signals.send(Signal::Go { limit, request }).is_err() {
            return Err(self.crashed());
        }
        match self.outcomes.recv() {
            Ok(Outcome::Paused { remaining }) => {
                self.state = TurnState::Paused;
                Ok(TurnReport {
                    used: limit - remaining,
                    paused: true,
                })
            }
            Ok(Outcome::Completed { remaining }) => {
                self.state = TurnState::Idle;
                Ok(TurnReport {
                    used: limit - remaining,
                    paused: false,
                })
            }
            Ok(Outcome::Failed(failure)) => {
                self.kill();
                Err(failure)
            }
            Err(_) => Err(self.crashed()),
        }
    }

    fn crashed(&mut self) -> Failure {
        self.signals = None;
        let message = match self.handle.take().map(JoinHandle::join) {
            Some(Err(panic)) => panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string()),
            _ => "worker exited unexpectedly".to_string(),
        };
        warn!(id = self.id, %message, "worker crashed");
        self.state = TurnState::Finished;
        Failure::Crashed(message)
    }

    /// Stop the worker and wait for it. Safe to call more than once.
    pub fn kill(&mut self) {
        if let Some(signals) = self.signals.take() {
            let _ = signals.send(Signal::Kill);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(id = self.id, "worker panicked during shutdown");
            }
            debug!(id = self.id, "worker stopped");
        }
        self.state = TurnState::Finished;
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Team;
    use crate::vm::Meter;

    /// Charges `cost` per step for `steps` steps per call.
    struct Stepper {
        meter: Meter,
        steps: i64,
        cost: i64,
        done: bool,
        turns: i64,
        fail_on_turn: Option<i64>,
    }

    impl Stepper {
        fn walk(&mut self) -> Result<(), Unwind> {
            for _ in 0..self.steps {
                self.meter.charge(self.cost)?;
            }
            Ok(())
        }
    }

    impl Program for Stepper {
        fn start(&mut self, limit: i64) {
            self.meter.reset(limit);
        }
        fn remaining(&self) -> i64 {
            self.meter.remaining()
        }
        fn initialized(&self) -> bool {
            self.done
        }
        fn init(&mut self) -> Result<(), Unwind> {
            self.walk()?;
            self.done = true;
            Ok(())
        }
        fn turn(&mut self) -> Result<(), Unwind> {
            self.turns += 1;
            if Some(self.turns) == self.fail_on_turn {
                return Err(ProgramError::runtime("boom").into());
            }
            self.walk()
        }
    }

    fn robot(steps: i64, fail_on_turn: Option<i64>) -> Robot {
        let printer = ErrorPrinter::new(Team::A, 1, std::sync::Arc::default());
        Robot::spawn(1, 1 << 20, printer, move |suspend| {
            Ok(Stepper {
                meter: Meter::suspending(0, suspend),
                steps,
                cost: 1,
                done: false,
                turns: 0,
                fail_on_turn,
            })
        })
        .unwrap()
    }

    #[test]
    fn test_complete_turn_reports_usage() {
        let mut robot = robot(30, None);
        assert_eq!(robot.init(100).unwrap(), TurnReport { used: 30, paused: false });
        assert_eq!(robot.run_turn(100).unwrap(), TurnReport { used: 30, paused: false });
        assert_eq!(robot.state(), TurnState::Idle);
    }

    #[test]
    fn test_pause_and_resume_into_turn() {
        let mut robot = robot(150, None);
        let report = robot.init(100).unwrap();
        assert!(report.paused);
        assert_eq!(report.used, 100);
        assert_eq!(robot.state(), TurnState::Paused);
        // Init finishes 50 in, then the turn itself walks 150 more.
        let report = robot.run_turn(100).unwrap();
        assert!(report.paused);
        let report = robot.run_turn(200).unwrap();
        assert_eq!(report, TurnReport { used: 100, paused: false });
    }

    #[test]
    fn test_turn_before_init_initializes_first() {
        let mut robot = robot(30, None);
        assert_eq!(robot.run_turn(100).unwrap(), TurnReport { used: 60, paused: false });
        assert_eq!(robot.init(100).unwrap(), TurnReport { used: 0, paused: false });
        assert_eq!(robot.run_turn(100).unwrap(), TurnReport { used: 30, paused: false });
    }

    #[test]
    fn test_failure_kills_worker() {
        let mut robot = robot(1, Some(2));
        robot.init(100).unwrap();
        robot.run_turn(100).unwrap();
        let failure = robot.run_turn(100).unwrap_err();
        assert!(matches!(failure, Failure::Program(_)));
        assert_eq!(robot.state(), TurnState::Finished);
        assert!(matches!(robot.run_turn(100), Err(Failure::Crashed(_))));
    }

    #[test]
    fn test_kill_while_paused() {
        let mut robot = robot(500, None);
        assert!(robot.init(100).unwrap().paused);
        robot.kill();
        robot.kill();
        assert_eq!(robot.state(), TurnState::Finished);
    }

    #[test]
    fn test_factory_failure_surfaces_on_first_go() {
        let printer = ErrorPrinter::new(Team::B, 2, std::sync::Arc::default());
        let mut robot = Robot::spawn(2, 1 << 20, printer, |_| -> Result<Stepper, Failure> {
            Err(ProgramError::runtime("no program").into())
        })
        .unwrap();
        assert!(matches!(robot.init(10), Err(Failure::Program(_))));
    }
}
