//! Outer tier: one OS thread and one current-thread runtime per pair.
//!
//! A unit that panics, or hangs past its grace period, is reported and left
//! behind; the other units keep running.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::panic_message;
use super::unit::{PairUnit, StatusLine, UnitReport};
use crate::config::{Config, PairConfig};
use crate::error::Error;
use crate::feed::AdapterFactory;

/// How one unit ended
#[derive(Debug)]
pub enum UnitOutcome {
    /// Reached STOPPED
    Stopped(UnitReport),
    /// Could not be built or its runtime failed
    Failed {
        /// Pair instrument name
        instrument: String,
        /// Cause
        error: Error,
    },
    /// Panicked; other units were unaffected
    Panicked {
        /// Pair instrument name
        instrument: String,
        /// Panic payload, if it was a string
        message: String,
    },
    /// Did not exit in time; its thread was detached
    Abandoned {
        /// Pair instrument name
        instrument: String,
    },
}

impl UnitOutcome {
    /// Pair instrument name
    pub fn instrument(&self) -> &str {
        match self {
            UnitOutcome::Stopped(report) => &report.instrument,
            UnitOutcome::Failed { instrument, .. }
            | UnitOutcome::Panicked { instrument, .. }
            | UnitOutcome::Abandoned { instrument } => instrument,
        }
    }

    /// Whether the unit shut down cleanly
    pub fn is_stopped(&self) -> bool {
        matches!(self, UnitOutcome::Stopped(_))
    }
}

type ThreadResult = Result<Result<UnitReport, Error>, String>;

struct UnitThread {
    instrument: String,
    done: oneshot::Receiver<ThreadResult>,
    // Dropped without joining when abandoned, which detaches the thread
    _thread: thread::JoinHandle<()>,
}

/// Runs every configured pair in its own failure domain
pub struct Supervisor {
    config: Config,
    factory: Arc<dyn AdapterFactory>,
    status_tx: mpsc::UnboundedSender<StatusLine>,
    stop: CancellationToken,
    units: Vec<UnitThread>,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("pairs", &self.config.pairs().len())
            .field("running", &self.units.len())
            .field("stopped", &self.stop.is_cancelled())
            .finish()
    }
}

impl Supervisor {
    /// Create a supervisor; status lines from every unit arrive on the
    /// returned receiver.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] if `config` does not validate.
    pub fn new(
        config: Config,
        factory: Arc<dyn AdapterFactory>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<StatusLine>), Error> {
        config.validate()?;
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let supervisor = Self {
            config,
            factory,
            status_tx,
            stop: CancellationToken::new(),
            units: Vec::new(),
        };
        Ok((supervisor, status_rx))
    }

    /// Token that stops every unit when cancelled
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Launch one thread per pair, `unit_start_delay` apart.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if a thread cannot be spawned. Units already launched
    /// keep running and are still reaped by [`Supervisor::join`].
    pub async fn start(&mut self) -> Result<(), Error> {
        let pairs = self.config.pairs().to_vec();
        for (i, pair) in pairs.into_iter().enumerate() {
            if i > 0 && !self.config.unit_start_delay().is_zero() {
                tokio::select! {
                    () = self.stop.cancelled() => return Ok(()),
                    () = tokio::time::sleep(self.config.unit_start_delay()) => {}
                }
            }
            self.spawn_unit(pair)?;
        }
        Ok(())
    }

    fn spawn_unit(&mut self, pair: PairConfig) -> Result<(), Error> {
        let instrument = pair.instrument.clone();
        let (done_tx, done_rx) = oneshot::channel();
        let config = self.config.clone();
        let factory = self.factory.clone();
        let status_tx = self.status_tx.clone();
        let stop = self.stop.clone();

        let thread = thread::Builder::new()
            .name(format!("unit-{instrument}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_unit_thread(pair, &config, factory.as_ref(), status_tx, stop)
                }))
                .map_err(panic_message);
                // The supervisor may have given up on this unit already
                let _ = done_tx.send(result);
            })?;

        info!(%instrument, "unit launched");
        self.units.push(UnitThread {
            instrument,
            done: done_rx,
            _thread: thread,
        });
        Ok(())
    }

    /// Request every unit to stop
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Stop every unit and wait for each to report.
    ///
    /// Each unit gets its own shutdown grace twice over: once for its tasks
    /// and once for its runtime. Units still running after that are
    /// abandoned.
    pub async fn join(self) -> Vec<UnitOutcome> {
        self.stop();
        // Durations are bounded by `Config::validate`
        let limit = self.config.shutdown_grace().saturating_mul(2);
        let deadline = tokio::time::Instant::now() + limit;

        let mut outcomes = Vec::with_capacity(self.units.len());
        for unit in self.units {
            let instrument = unit.instrument;
            let outcome = match tokio::time::timeout_at(deadline, unit.done).await {
                Ok(Ok(Ok(Ok(report)))) => UnitOutcome::Stopped(report),
                Ok(Ok(Ok(Err(error)))) => {
                    error!(%instrument, %error, "unit failed");
                    UnitOutcome::Failed { instrument, error }
                }
                Ok(Ok(Err(message))) => {
                    error!(%instrument, %message, "unit panicked");
                    UnitOutcome::Panicked { instrument, message }
                }
                Ok(Err(_)) => {
                    let error = Error::Runtime("unit thread exited without reporting".to_string());
                    error!(%instrument, %error, "unit failed");
                    UnitOutcome::Failed { instrument, error }
                }
                Err(_) => {
                    warn!(%instrument, ?limit, "unit did not stop in time, abandoning");
                    UnitOutcome::Abandoned { instrument }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Start every unit, run until `signal` resolves, then join.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::start`].
    pub async fn run_until<F>(mut self, signal: F) -> Result<Vec<UnitOutcome>, Error>
    where
        F: std::future::Future<Output = ()>,
    {
        let started = self.start().await;
        if let Err(error) = started {
            self.stop();
            let outcomes = self.join().await;
            error!(%error, reaped = outcomes.len(), "failed to launch units");
            return Err(error);
        }

        let stop = self.stop_token();
        tokio::select! {
            () = signal => info!("stop requested"),
            () = stop.cancelled() => {}
        }
        Ok(self.join().await)
    }

    /// Start every unit and run until the operator interrupts.
    ///
    /// # Errors
    ///
    /// See [`Supervisor::start`].
    pub async fn run_until_ctrl_c(self) -> Result<Vec<UnitOutcome>, Error> {
        self.run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                error!(%error, "cannot listen for ctrl-c, stopping");
            }
        })
        .await
    }
}

/// Body of a unit thread
fn run_unit_thread(
    pair: PairConfig,
    config: &Config,
    factory: &dyn AdapterFactory,
    status_tx: mpsc::UnboundedSender<StatusLine>,
    stop: CancellationToken,
) -> Result<UnitReport, Error> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let report = runtime.block_on(async {
        let unit = PairUnit::from_factory(pair, config, factory, status_tx)?;
        Ok::<_, Error>(unit.run(stop).await)
    });
    runtime.shutdown_timeout(config.shutdown_grace());
    report
}
