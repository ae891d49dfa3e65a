//! Fixed-interval job status poller.
//!
//! A started poller owns one tokio task. The task issues a status query right
//! away and then once per interval, strictly one at a time: if a query outlives
//! the interval, the missed ticks are skipped rather than queued. Failed queries
//! are reported and polling carries on. Only [`JobPoller::stop`] (or dropping the
//! poller) ends the loop; deciding when a status is final is left to the owner.

use std::sync::Arc;
use std::time::Duration;

use fusion_core::{JobId, JobStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::GenerationBackend;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Stopped,
}

/// Emitted on the channel returned by [`JobPoller::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// The observed status changed (the first observation always counts as a change).
    Status(JobStatus),
    /// A single query failed. Polling continues.
    Error(Error),
}

/// Latest observations of a poller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSnapshot {
    pub status: Option<JobStatus>,
    /// Failure of the most recent query; cleared by the next successful one.
    pub last_error: Option<Error>,
    /// Queries that completed and were applied.
    pub queries: u64,
}

pub struct JobPoller {
    backend: Arc<dyn GenerationBackend>,
    state: PollerState,
    job_id: Option<JobId>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    snapshot_tx: Option<watch::Sender<PollSnapshot>>,
    snapshot_rx: watch::Receiver<PollSnapshot>,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(PollSnapshot::default());
        Self {
            backend,
            state: PollerState::Idle,
            job_id: None,
            cancel: CancellationToken::new(),
            task: None,
            snapshot_tx: Some(snapshot_tx),
            snapshot_rx,
        }
    }

    /// Start polling `job_id` every `interval`.
    ///
    /// Must be called from within a tokio runtime. A poller runs once: starting
    /// one that is already polling or stopped is an `InvalidRequest`.
    pub fn start(
        &mut self,
        job_id: JobId,
        interval: Duration,
    ) -> Result<mpsc::UnboundedReceiver<PollEvent>> {
        if self.state != PollerState::Idle {
            return Err(Error::InvalidRequest(format!(
                "poller is {:?}, not idle",
                self.state
            )));
        }
        if interval.is_zero() {
            return Err(Error::InvalidRequest(
                "poll interval must be greater than zero".into(),
            ));
        }
        let snapshot = self
            .snapshot_tx
            .take()
            .ok_or_else(|| Error::InvalidRequest("poller already started".into()))?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let task = PollTask {
            backend: Arc::clone(&self.backend),
            job_id: job_id.clone(),
            interval,
            cancel: self.cancel.clone(),
            events: events_tx,
            snapshot,
        };

        tracing::debug!(%job_id, interval_ms = interval.as_millis() as u64, "starting poller");
        self.task = Some(tokio::spawn(task.run()));
        self.job_id = Some(job_id);
        self.state = PollerState::Polling;
        Ok(events_rx)
    }

    /// Stop polling. Safe to call any number of times, in any state.
    pub fn stop(&mut self) {
        if self.state == PollerState::Stopped {
            return;
        }
        self.cancel.cancel();
        // Detach; the cancelled token ends the task at its next await point.
        self.task.take();
        self.state = PollerState::Stopped;
        if let Some(job_id) = &self.job_id {
            tracing::debug!(%job_id, "poller stopped");
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn job_id(&self) -> Option<&JobId> {
        self.job_id.as_ref()
    }

    /// Current observations.
    pub fn snapshot(&self) -> PollSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch observations as they change.
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshot_rx.clone()
    }
}

impl Drop for JobPoller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct PollTask {
    backend: Arc<dyn GenerationBackend>,
    job_id: JobId,
    interval: Duration,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<PollEvent>,
    snapshot: watch::Sender<PollSnapshot>,
}

impl PollTask {
    async fn run(self) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_status: Option<JobStatus> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.backend.get_status(&self.job_id) => result,
            };

            // A query that lands after stop() must not touch state.
            if self.cancel.is_cancelled() {
                break;
            }
            self.apply(result, &mut last_status);
        }
    }

    fn apply(&self, result: Result<JobStatus>, last_status: &mut Option<JobStatus>) {
        match result {
            Ok(status) => {
                if !self.record(|s| {
                    s.queries += 1;
                    s.status = Some(status.clone());
                    s.last_error = None;
                }) {
                    return;
                }
                if last_status.as_ref() != Some(&status) {
                    tracing::debug!(job_id = %self.job_id, %status, "job status changed");
                    *last_status = Some(status.clone());
                    self.emit(PollEvent::Status(status));
                }
            }
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, error = %e, "status query failed");
                if self.record(|s| {
                    s.queries += 1;
                    s.last_error = Some(e.clone());
                }) {
                    self.emit(PollEvent::Error(e));
                }
            }
        }
    }

    /// Update the snapshot unless stop() has been requested. Returns whether it was applied.
    fn record(&self, update: impl FnOnce(&mut PollSnapshot)) -> bool {
        self.snapshot.send_if_modified(|s| {
            if self.cancel.is_cancelled() {
                return false;
            }
            update(s);
            true
        })
    }

    fn emit(&self, event: PollEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // The owner may have stopped listening; polling still runs until stop().
        let _ = self.events.send(event);
    }
}
