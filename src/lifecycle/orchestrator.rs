//! Process lifecycle orchestration.
//!
//! # Responsibilities
//! - Validate options before anything starts
//! - Arm the root context, then build and start subsystems
//! - Wait for the first of: cancellation, controller failure, listener failure
//! - Cancel siblings on failure and wait for every subsystem to return
//!
//! # Design Decisions
//! - Fail fast: config errors terminate before any subsystem exists
//! - Controllers and listener run as sibling tasks in one `JoinSet`
//! - The first fatal cause wins; later ones are logged at debug
//! - Draining is bounded; stragglers are aborted after the grace period

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{Id as TaskId, JoinError, JoinSet};

use crate::config::{validate, RawOptions, StartupOptions};
use crate::controller::ControllerError;
use crate::error::{ExitOutcome, HarvesterError};
use crate::lifecycle::shutdown::ExecutionContext;
use crate::lifecycle::signals::{self, HARD_EXIT_MARGIN};
use crate::lifecycle::subsystem::Subsystems;
use crate::net::ListenerError;
use crate::observability::metrics;

/// How long both required subsystems must survive before the process counts
/// as running.
pub const DEFAULT_STARTUP_WINDOW: Duration = Duration::from_secs(1);

/// Drain budget on top of the shutdown grace. The listener may spend the
/// whole grace on in-flight requests. Must stay below `HARD_EXIT_MARGIN`.
pub const DRAIN_MARGIN: Duration = Duration::from_secs(2);

/// Orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Validating,
    Starting,
    Running,
    Draining,
    Terminated,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Validating => "validating",
            Phase::Starting => "starting",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the root cancellation comes from.
pub enum RootContext {
    /// Arm a fresh context with SIGTERM/SIGINT.
    Signals,
    /// The caller owns cancellation.
    Token(ExecutionContext),
}

/// Which required subsystem a task result belongs to.
enum SubsystemExit {
    Controllers(Result<(), ControllerError>),
    Server(Result<(), ListenerError>),
}

/// Top-level driver for a harvester process.
pub struct ProcessOrchestrator {
    phase: watch::Sender<Phase>,
    startup_window: Duration,
}

impl ProcessOrchestrator {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Init);
        Self {
            phase,
            startup_window: DEFAULT_STARTUP_WINDOW,
        }
    }

    /// Override how long subsystems must survive before `Running`.
    pub fn with_startup_window(mut self, window: Duration) -> Self {
        self.startup_window = window;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Observe phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run the whole lifecycle and report how it ended.
    ///
    /// `build` is called once, after validation succeeded and the root
    /// context is armed. It is never called for invalid options.
    pub async fn run<F, Fut>(&self, raw: RawOptions, root: RootContext, build: F) -> ExitOutcome
    where
        F: FnOnce(Arc<StartupOptions>) -> Fut,
        Fut: Future<Output = Result<Subsystems, HarvesterError>>,
    {
        self.transition(Phase::Validating);
        let options = match validate(raw) {
            Ok(options) => Arc::new(options),
            Err(e) => return self.terminate(ExitOutcome::Fatal(e.into())),
        };

        tracing::info!(
            namespace = %options.namespace,
            threadiness = options.threadiness.get(),
            http_port = options.listener.http_port,
            https_port = options.listener.https_port,
            skip_authentication = options.skip_authentication,
            authentication_modes = ?options.authentication_modes,
            "Configuration validated"
        );

        self.transition(Phase::Starting);
        let ctx = match root {
            RootContext::Signals => {
                match signals::new_cancellable_root(options.shutdown_grace + HARD_EXIT_MARGIN) {
                    Ok(ctx) => ctx,
                    Err(e) => return self.terminate(ExitOutcome::Fatal(HarvesterError::Signals(e))),
                }
            }
            RootContext::Token(ctx) => ctx,
        };

        let subsystems = match build(options.clone()).await {
            Ok(subsystems) => subsystems,
            Err(e) => return self.terminate(ExitOutcome::Fatal(e)),
        };

        subsystems.diagnostics.start(&ctx);

        let mut tasks = JoinSet::new();
        let names = HashMap::from([
            (spawn_controllers(&mut tasks, &subsystems, &ctx, options.threadiness), "controllers"),
            (spawn_server(&mut tasks, &subsystems, &ctx), "management API"),
        ]);

        let mut cause = self.wait_first(&mut tasks, &names, &ctx).await;

        self.transition(Phase::Draining);
        ctx.cancel();

        let grace = options.shutdown_grace;
        let budget = grace + DRAIN_MARGIN;
        let drained = tokio::time::timeout(budget, async {
            while let Some(joined) = tasks.join_next().await {
                if let Some(err) = settle(joined, &names, &ctx) {
                    record(&mut cause, err);
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(budget = ?budget, remaining = tasks.len(), "Aborting subsystems that did not stop");
            tasks.abort_all();
            record(&mut cause, HarvesterError::ShutdownTimedOut(budget));
        }

        self.terminate(match cause {
            Some(cause) => ExitOutcome::Fatal(cause),
            None => ExitOutcome::Clean,
        })
    }

    /// Wait for cancellation or the first subsystem to return.
    async fn wait_first(
        &self,
        tasks: &mut JoinSet<SubsystemExit>,
        names: &HashMap<TaskId, &'static str>,
        ctx: &ExecutionContext,
    ) -> Option<HarvesterError> {
        let window = tokio::time::sleep(self.startup_window);
        tokio::pin!(window);
        let mut running = false;

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    tracing::info!(phase = %self.phase(), "Shutdown requested");
                    return None;
                }
                Some(joined) = tasks.join_next() => {
                    return settle(joined, names, ctx);
                }
                _ = &mut window, if !running => {
                    running = true;
                    self.transition(Phase::Running);
                }
            }
        }
    }

    fn transition(&self, next: Phase) {
        let previous = self.phase.send_replace(next);
        tracing::debug!(from = %previous, to = %next, "Lifecycle phase changed");
        metrics::record_phase(next.as_str());
    }

    fn terminate(&self, outcome: ExitOutcome) -> ExitOutcome {
        self.transition(Phase::Terminated);
        outcome
    }
}

impl Default for ProcessOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_controllers(
    tasks: &mut JoinSet<SubsystemExit>,
    subsystems: &Subsystems,
    ctx: &ExecutionContext,
    threadiness: NonZeroUsize,
) -> TaskId {
    let runtime = subsystems.controllers.clone();
    let ctx = ctx.clone();
    tasks
        .spawn(async move {
            tracing::info!(threadiness = threadiness.get(), "Starting controllers");
            SubsystemExit::Controllers(runtime.run(ctx, threadiness).await)
        })
        .id()
}

fn spawn_server(
    tasks: &mut JoinSet<SubsystemExit>,
    subsystems: &Subsystems,
    ctx: &ExecutionContext,
) -> TaskId {
    let server = subsystems.server.clone();
    let ctx = ctx.clone();
    tasks
        .spawn(async move {
            tracing::info!("Starting management API");
            SubsystemExit::Server(server.serve(ctx).await)
        })
        .id()
}

/// Turn a finished task into its fatal cause, if it has one.
///
/// A clean return is only acceptable once shutdown was requested.
fn settle(
    joined: Result<SubsystemExit, JoinError>,
    names: &HashMap<TaskId, &'static str>,
    ctx: &ExecutionContext,
) -> Option<HarvesterError> {
    let shutting_down = ctx.is_cancelled();
    match joined {
        Ok(SubsystemExit::Controllers(Ok(()))) if shutting_down => {
            tracing::info!("Controllers stopped");
            None
        }
        Ok(SubsystemExit::Controllers(Ok(()))) => Some(ControllerError::ExitedEarly.into()),
        Ok(SubsystemExit::Controllers(Err(e))) => Some(e.into()),
        Ok(SubsystemExit::Server(Ok(()))) if shutting_down => {
            tracing::info!("Management API stopped");
            None
        }
        Ok(SubsystemExit::Server(Ok(()))) => Some(ListenerError::StoppedEarly.into()),
        Ok(SubsystemExit::Server(Err(e))) => Some(e.into()),
        Err(e) if e.is_cancelled() => None,
        Err(e) => Some(HarvesterError::SubsystemPanicked {
            name: names.get(&e.id()).copied().unwrap_or("subsystem"),
        }),
    }
}

fn record(cause: &mut Option<HarvesterError>, err: HarvesterError) {
    match cause {
        Some(first) => {
            tracing::debug!(first = %first, error = %err, "Additional subsystem error during shutdown");
        }
        None => *cause = Some(err),
    }
}
