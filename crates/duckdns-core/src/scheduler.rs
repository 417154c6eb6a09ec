//! Self-re-arming tick scheduler
//!
//! State machine:
//!
//! ```text
//! IDLE ──tick──▶ RUNNING ──done──▶ REARM ──▶ IDLE
//!                 │
//!                 └── on-crash ──▶ REARM (via host restart)
//! ```
//!
//! Invariants:
//! - At most one tick in flight: the loop runs ticks serially, and
//!   `update_now` requests that arrive while a tick is running are
//!   drained and dropped afterwards (the running tick re-arms on its
//!   own completion).
//! - After every tick the scheduler re-arms for the interval read from
//!   that tick's configuration, so interval edits take effect on the
//!   next arming.
//! - `stop()` cancels the next arming only; an in-flight tick runs to
//!   completion.
//!
//! A crash of the process is recovered by the host supervisor restarting
//! the daemon; the scheduler attempts no in-process retry.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::engine::TickEngine;

/// Operator commands accepted between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Fire a tick immediately instead of waiting out the arming
    TickNow,
    /// Cancel the next arming and exit the loop
    Stop,
}

/// Handle for operator control of a running scheduler
///
/// Cheap to clone; all clones feed the same scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Request an immediate tick
    ///
    /// Dropped silently when a tick is already in flight or the
    /// scheduler has stopped.
    pub async fn update_now(&self) {
        let _ = self.tx.send(Command::TickNow).await;
    }

    /// Cancel the next arming; the in-flight tick (if any) completes
    pub async fn stop(&self) {
        let _ = self.tx.send(Command::Stop).await;
    }
}

/// Interval-driven scheduler over a [`TickEngine`]
pub struct Scheduler {
    engine: Arc<TickEngine>,
    rx: mpsc::Receiver<Command>,
}

impl Scheduler {
    /// Create a scheduler and its operator handle
    pub fn new(engine: Arc<TickEngine>) -> (Self, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(4);
        (Self { engine, rx }, SchedulerHandle { tx })
    }

    /// Run the scheduling loop until stopped
    ///
    /// The first tick fires after `initial_interval_minutes`; every
    /// subsequent arming uses the interval the previous tick read.
    pub async fn run(mut self, initial_interval_minutes: u64) {
        let mut delay = interval_to_delay(initial_interval_minutes);
        info!(
            "scheduler armed, first tick in {} minute(s)",
            initial_interval_minutes.max(1)
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    debug!("arming elapsed, firing tick");
                }
                cmd = self.rx.recv() => match cmd {
                    Some(Command::TickNow) => {
                        debug!("operator requested immediate tick");
                    }
                    Some(Command::Stop) | None => {
                        info!("scheduler stopped, next arming cancelled");
                        return;
                    }
                }
            }

            let report = self.engine.run_tick().await;

            // Requests that piled up while the tick ran are dropped; a
            // stop request still wins over the next arming.
            loop {
                match self.rx.try_recv() {
                    Ok(Command::TickNow) => {
                        debug!("dropping tick request received while a tick was in flight");
                    }
                    Ok(Command::Stop) => {
                        info!("scheduler stopped, next arming cancelled");
                        return;
                    }
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        info!("all scheduler handles dropped, stopping");
                        return;
                    }
                }
            }

            delay = interval_to_delay(report.interval_minutes);
            debug!(
                "re-armed for {} minute(s) after {:?}",
                report.interval_minutes.max(1),
                report.outcome
            );
        }
    }
}

/// Arming delay for an interval, clamped to ≥ 1 minute
fn interval_to_delay(interval_minutes: u64) -> Duration {
    Duration::from_secs(interval_minutes.max(1) * 60)
}
