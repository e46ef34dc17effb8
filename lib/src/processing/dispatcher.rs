// Copyright 2025 The Cairn Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded job dispatcher.
//!
//! Jobs are spawned on a [`TaskTracker`] and gated by a semaphore of `pool_size`
//! permits, so at most `pool_size` processors run at once while the rest wait their
//! turn in submission order. A job's outcome (error, panic, or error problems in its
//! result) is recorded against the job and never reaches the submitter.
//!
//! Shutdown closes the submission gate first, then drains: every job accepted before
//! the gate closed runs to completion before the dispatcher reports `TERMINATED`.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use cairn_core::problems::{Problem, Problems};
use futures::FutureExt;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::Job;
use crate::config::{DispatcherConfig, DEFAULT_PROBLEM_CAPACITY};
use crate::context::ProcessingContext;
use crate::error::{CairnError, Result};
use crate::federation::Federation;
use crate::lifecycle::{Lifecycle, LifecycleState, ShutdownStep};
use crate::managers::{
    log_component_error, log_component_start, log_component_stop, panic_message,
};

/// Point-in-time counters of a dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub rejected: u64,
    /// Jobs accepted but not yet finished, waiting ones included
    pub in_flight: usize,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

pub struct JobDispatcher {
    engine_id: String,
    pool_size: usize,
    lifecycle: Lifecycle,
    federation: Arc<Federation>,
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
    accepting: Mutex<bool>,
    counters: Arc<Counters>,
    problems: Arc<Mutex<Problems>>,
    problem_capacity: usize,
}

impl JobDispatcher {
    pub fn new(
        engine_id: impl Into<String>,
        config: &DispatcherConfig,
        federation: Arc<Federation>,
    ) -> Self {
        let engine_id = engine_id.into();
        let pool_size = config.pool_size.max(1);
        Self {
            lifecycle: Lifecycle::new("dispatcher", engine_id.clone()),
            engine_id,
            pool_size,
            federation,
            permits: Arc::new(Semaphore::new(pool_size)),
            tracker: TaskTracker::new(),
            accepting: Mutex::new(true),
            counters: Arc::new(Counters::default()),
            problems: Arc::new(Mutex::new(Problems::new())),
            problem_capacity: DEFAULT_PROBLEM_CAPACITY,
        }
    }

    /// Keeps at most `capacity` job problems, evicting the oldest first.
    pub fn with_problem_capacity(mut self, capacity: usize) -> Self {
        self.problem_capacity = capacity.max(1);
        self
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn start(&self) -> Result<()> {
        if self.lifecycle.begin_start()? {
            log_component_start("dispatcher", &self.engine_id);
            debug!(
                "[{}] Dispatcher runs at most {} job(s) concurrently",
                self.engine_id, self.pool_size
            );
            self.lifecycle.mark_running();
        }
        Ok(())
    }

    /// Accepts a job for asynchronous execution and returns its id.
    ///
    /// # Errors
    ///
    /// `CairnError::JobRejected` unless the dispatcher is running and still accepting.
    pub fn submit(&self, job: Job) -> Result<Uuid> {
        let accepting = lock(&self.accepting);
        if !*accepting || !self.lifecycle.is_running() {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(
                "[{}] Rejected {job}: dispatcher is {}",
                self.engine_id,
                self.lifecycle.state()
            );
            return Err(CairnError::job_rejected(job.rule_name(), &job.input));
        }

        let id = job.id;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        trace!("[{}] Accepted {job}", self.engine_id);
        let worker = Worker {
            engine_id: self.engine_id.clone(),
            federation: self.federation.clone(),
            permits: self.permits.clone(),
            counters: self.counters.clone(),
            problems: self.problems.clone(),
            problem_capacity: self.problem_capacity,
        };
        self.tracker.spawn(worker.run(job));
        drop(accepting);
        Ok(id)
    }

    /// Stops accepting jobs and starts draining the accepted ones in the background.
    ///
    /// Returns immediately; use [`JobDispatcher::await_termination`] to wait for the
    /// drain. A dispatcher that was never started terminates at once.
    pub async fn shutdown(&self) {
        *lock(&self.accepting) = false;
        match self.lifecycle.begin_shutdown() {
            ShutdownStep::AlreadyShuttingDown => {}
            ShutdownStep::Terminated => {
                self.tracker.close();
            }
            ShutdownStep::Drain => {
                log_component_stop("dispatcher", &self.engine_id);
                self.tracker.close();
                let tracker = self.tracker.clone();
                let lifecycle = self.lifecycle.clone();
                let engine_id = self.engine_id.clone();
                tokio::spawn(async move {
                    debug!(
                        "[{engine_id}] Dispatcher draining {} job(s)",
                        tracker.len()
                    );
                    tracker.wait().await;
                    lifecycle.mark_terminated();
                });
            }
        }
    }

    /// Waits until every accepted job has finished. Returns `false` on timeout or if
    /// shutdown was never requested.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        self.lifecycle.await_termination(timeout).await
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            in_flight: self.tracker.len(),
        }
    }

    /// Problems reported by jobs so far, each tagged with the job it came from.
    pub fn problems(&self) -> Problems {
        lock(&self.problems).clone()
    }
}

impl std::fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("engine_id", &self.engine_id)
            .field("pool_size", &self.pool_size)
            .field("state", &self.lifecycle.state())
            .field("stats", &self.stats())
            .finish()
    }
}

struct Worker {
    engine_id: String,
    federation: Arc<Federation>,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
    problems: Arc<Mutex<Problems>>,
    problem_capacity: usize,
}

impl Worker {
    async fn run(self, job: Job) {
        let label = format!("job {} ({})", job.id, job.rule_name());
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                self.fail(&job, &label, format!("no worker available: {e}"));
                return;
            }
        };

        trace!("[{}] Running {job}", self.engine_id);
        let context = ProcessingContext::new(job.id, job.rule_name(), self.federation.clone());
        let outcome = AssertUnwindSafe(job.processor.process(
            &job.input,
            &job.output,
            &job.rule.properties,
            &context,
        ))
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(reported)) => {
                let failed = reported.has_errors();
                self.record(&label, reported);
                if failed {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    log_component_error(
                        "dispatcher",
                        &self.engine_id,
                        &format!("{job} reported errors"),
                    );
                } else {
                    self.counters.completed.fetch_add(1, Ordering::Relaxed);
                    debug!("[{}] Completed {job}", self.engine_id);
                }
            }
            Ok(Err(e)) => self.fail(&job, &label, format!("{e:#}")),
            Err(panic) => self.fail(
                &job,
                &label,
                format!("panicked: {}", panic_message(panic.as_ref())),
            ),
        }
    }

    fn fail(&self, job: &Job, label: &str, cause: String) {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        log_component_error(
            "dispatcher",
            &self.engine_id,
            &format!("{job} failed: {cause}"),
        );
        let mut problems = Problems::new();
        problems.push(
            Problem::error("Processor for rule '{}' failed on {}")
                .with_parameter(job.rule_name())
                .with_parameter(&job.input)
                .with_cause(cause),
        );
        self.record(label, problems);
    }

    fn record(&self, label: &str, reported: Problems) {
        if reported.is_empty() {
            return;
        }
        let mut problems = lock(&self.problems);
        for mut problem in reported {
            if problem.resource.is_none() {
                problem.resource = Some(label.to_string());
            }
            problems.push_bounded(problem, self.problem_capacity);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
