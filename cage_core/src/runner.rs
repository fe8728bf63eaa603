//! Poll loop around `Cage::tick`.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;

use crate::presence::Cage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stop flag raised or run duration reached.
    Stopped,
    /// The cage asked for a system restart.
    RebootRequested,
}

/// How a run ended. A failed shutdown does not change the outcome: a pending
/// reboot must still be handed off.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub shutdown_error: Option<eyre::Report>,
}

/// Ticks `cage` every poll period until `stop` is raised, the cage requests a
/// reboot, or `max_runtime` elapses. Tick errors are logged and the loop keeps
/// going. `Cage::shutdown` always runs before returning.
pub fn run(cage: &mut Cage, stop: &AtomicBool, max_runtime: Option<Duration>) -> RunReport {
    let clock = std::sync::Arc::clone(cage.clock());
    let poll = cage.config().session.poll;
    let started = clock.now();
    tracing::info!(poll_ms = poll.as_millis() as u64, "cage running");

    let outcome = loop {
        if stop.load(Ordering::Relaxed) {
            tracing::info!("stop requested");
            break RunOutcome::Stopped;
        }
        if cage.reboot_requested() {
            break RunOutcome::RebootRequested;
        }
        if let Some(limit) = max_runtime
            && clock.now().saturating_duration_since(started) >= limit
        {
            tracing::info!(limit_ms = limit.as_millis() as u64, "run duration reached");
            break RunOutcome::Stopped;
        }

        if let Err(e) = cage.tick() {
            tracing::error!(error = %e, state = cage.state().name(), "tick failed");
        }
        clock.sleep(poll);
    };

    let shutdown_error = cage.shutdown().wrap_err("cage shutdown").err();
    match &shutdown_error {
        None => tracing::info!(?outcome, "cage stopped"),
        Some(e) => tracing::error!(?outcome, error = %format!("{e:#}"), "cage stopped with unsaved data"),
    }
    RunReport {
        outcome,
        shutdown_error,
    }
}
