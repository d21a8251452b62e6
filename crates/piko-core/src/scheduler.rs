// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PikoBridge.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Poll scheduling with bounded retries.
//!
//! ```text
//! Idle ──start──▶ Polling ──success──▶ SteadyWait ──timer──▶ Polling
//!                    │
//!                    ├──failure, n ≤ max──▶ RetryWait ──timer──▶ Polling
//!                    └──failure, n > max──▶ Stopped
//! any ──shutdown──▶ Stopped
//! ```

use crate::poll::{PollCycle, PollOutcome};
use crate::timer::Timer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Polling,
    SteadyWait,
    RetryWait,
    Stopped,
}

/// Delays and retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after a successful poll
    pub steady_interval: Duration,
    /// Delay after a failed poll while retries remain
    pub retry_interval: Duration,
    /// Consecutive failures tolerated before giving up
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            steady_interval: Duration::from_secs(10),
            retry_interval: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Steady,
    Retry,
}

/// The single outstanding next-poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledPoll {
    pub delay: Duration,
    pub kind: WaitKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    RetriesExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => f.write_str("shutdown requested"),
            Self::RetriesExhausted => f.write_str("retries exhausted"),
        }
    }
}

/// Result of one scheduler step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Scheduled(ScheduledPoll),
    Stopped(StopReason),
}

/// Drives [`PollCycle`] runs and owns the failure counter, the connection
/// state and the pending poll.
pub struct RetryScheduler {
    cycle: PollCycle,
    policy: RetryPolicy,
    timer: Arc<dyn Timer>,
    state: SchedulerState,
    failure_count: u32,
    connected: bool,
    pending: Option<ScheduledPoll>,
    last_outcome: Option<PollOutcome>,
    stop_reason: Option<StopReason>,
    shutdown_published: bool,
    shutdown_channel_closed: bool,
}

impl RetryScheduler {
    pub fn new(cycle: PollCycle, policy: RetryPolicy, timer: Arc<dyn Timer>) -> Self {
        Self {
            cycle,
            policy,
            timer,
            state: SchedulerState::Idle,
            failure_count: 0,
            connected: false,
            pending: None,
            last_outcome: None,
            stop_reason: None,
            shutdown_published: false,
            shutdown_channel_closed: false,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn pending(&self) -> Option<ScheduledPoll> {
        self.pending
    }

    pub fn last_outcome(&self) -> Option<&PollOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run one poll and apply its outcome.
    ///
    /// Once stopped, no further polls are issued.
    pub async fn step(&mut self) -> Transition {
        if let Some(reason) = self.stop_reason {
            return Transition::Stopped(reason);
        }

        self.state = SchedulerState::Polling;
        self.pending = None;

        let outcome = self.cycle.run().await;
        let transition = self.apply(&outcome);
        self.last_outcome = Some(outcome);
        transition
    }

    fn apply(&mut self, outcome: &PollOutcome) -> Transition {
        match outcome {
            PollOutcome::Success(_) => {
                if self.failure_count > 0 {
                    info!(
                        "🔄 [SCHEDULER] Inverter reachable again after {} failed attempts",
                        self.failure_count
                    );
                }
                self.failure_count = 0;
                self.connected = true;
                self.schedule(WaitKind::Steady)
            }
            PollOutcome::Failure(reason) => {
                self.connected = false;
                self.failure_count = self.failure_count.saturating_add(1);

                if self.failure_count <= self.policy.max_retries {
                    info!(
                        "Retry {} from {} in {} ms",
                        self.failure_count,
                        self.policy.max_retries,
                        self.policy.retry_interval.as_millis()
                    );
                    self.schedule(WaitKind::Retry)
                } else {
                    error!(
                        "🛑 [SCHEDULER] Giving up after {} failed attempts (last: {}). \
                         Please verify that the inverter is reachable and check the \
                         protocol, host and port settings",
                        self.failure_count, reason
                    );
                    self.state = SchedulerState::Stopped;
                    self.pending = None;
                    self.stop_reason = Some(StopReason::RetriesExhausted);
                    Transition::Stopped(StopReason::RetriesExhausted)
                }
            }
        }
    }

    fn schedule(&mut self, kind: WaitKind) -> Transition {
        let (state, delay) = match kind {
            WaitKind::Steady => (SchedulerState::SteadyWait, self.policy.steady_interval),
            WaitKind::Retry => (SchedulerState::RetryWait, self.policy.retry_interval),
        };
        let poll = ScheduledPoll { delay, kind };

        debug!("⏱️ [SCHEDULER] Next poll in {} ms ({:?})", delay.as_millis(), kind);
        self.state = state;
        self.pending = Some(poll);
        Transition::Scheduled(poll)
    }

    /// Poll until retries are exhausted or `shutdown` becomes true.
    ///
    /// The connection indicator is reset before the first poll. Shutdown
    /// interrupts both an in-flight fetch and a pending wait.
    pub async fn run(&mut self, shutdown: &mut watch::Receiver<bool>) -> StopReason {
        if self.state == SchedulerState::Idle {
            info!(
                "🚀 [SCHEDULER] Starting: interval {} ms, {} retries every {} ms",
                self.policy.steady_interval.as_millis(),
                self.policy.max_retries,
                self.policy.retry_interval.as_millis()
            );
            self.cycle.publish_connection(false).await;
        }

        loop {
            if *shutdown.borrow_and_update() {
                return self.shutdown().await;
            }
            if !self.shutdown_channel_closed && shutdown.has_changed().is_err() {
                self.shutdown_channel_closed = true;
                warn!("Shutdown channel closed, running until stopped otherwise");
            }

            let transition = tokio::select! {
                biased;
                () = wait_for_shutdown(shutdown) => None,
                transition = self.step() => Some(transition),
            };

            let poll = match transition {
                None => return self.shutdown().await,
                Some(Transition::Stopped(reason)) => return reason,
                Some(Transition::Scheduled(poll)) => poll,
            };

            let timer = Arc::clone(&self.timer);
            let interrupted = tokio::select! {
                biased;
                () = wait_for_shutdown(shutdown) => true,
                () = timer.sleep(poll.delay) => false,
            };
            if interrupted {
                return self.shutdown().await;
            }
        }
    }

    /// Cancel the pending poll and publish a disconnected state.
    ///
    /// Idempotent: the indicator is written on the first call only.
    pub async fn shutdown(&mut self) -> StopReason {
        self.pending = None;
        self.state = SchedulerState::Stopped;
        self.connected = false;
        let reason = *self.stop_reason.get_or_insert(StopReason::Shutdown);

        if !self.shutdown_published {
            self.shutdown_published = true;
            info!("👋 [SCHEDULER] Stopping ({})", reason);
            self.cycle.publish_connection(false).await;
        }
        reason
    }
}

impl fmt::Debug for RetryScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryScheduler")
            .field("state", &self.state)
            .field("failure_count", &self.failure_count)
            .field("connected", &self.connected)
            .field("pending", &self.pending)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Resolves once the flag is true; never resolves if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
