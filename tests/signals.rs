//! Signal-driven shutdown against the real process signal handlers.
//!
//! Kept in its own test binary: SIGTERM goes to the whole process.

mod common;

use std::time::Duration;

use harvester::{Phase, ProcessOrchestrator, RootContext};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use common::{valid_options, Behavior, Spies};

#[tokio::test]
async fn sigterm_drains_and_exits_clean() {
    let spies = Spies::new(Behavior::until_cancelled(), Behavior::until_cancelled());
    let orchestrator = ProcessOrchestrator::new().with_startup_window(Duration::from_millis(50));
    let mut phases = orchestrator.subscribe();
    let factory = spies.factory();
    let run = tokio::spawn(async move { orchestrator.run(valid_options(), RootContext::Signals, factory).await });

    tokio::time::timeout(Duration::from_secs(5), phases.wait_for(|p| *p == Phase::Running))
        .await
        .expect("orchestrator should reach Running")
        .unwrap();

    kill(Pid::this(), Signal::SIGTERM).unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("SIGTERM should stop the orchestrator")
        .unwrap();
    assert!(outcome.is_clean(), "{outcome:?}");
    assert!(spies.controllers.returned());
    assert!(spies.server.returned());
    assert_eq!(spies.builds(), 1);
}
