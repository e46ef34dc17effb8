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

//! Shared start/shutdown/await-termination state machine.
//!
//! Every stateful component (federation, dispatcher, processing service) and the
//! engine itself hold a [`Lifecycle`] by composition. The state lives in a
//! `tokio::sync::watch` channel so transitions are atomic and waiters are woken
//! when a component reaches `Terminated`.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{CairnError, Result};
use crate::managers::{transition_for, Operation, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    NotStarted,
    Starting,
    Running,
    Stopping,
    Terminated,
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LifecycleState::NotStarted => "NOT_STARTED",
            LifecycleState::Starting => "STARTING",
            LifecycleState::Running => "RUNNING",
            LifecycleState::Stopping => "STOPPING",
            LifecycleState::Terminated => "TERMINATED",
        };
        write!(f, "{label}")
    }
}

/// What a caller of [`Lifecycle::begin_shutdown`] has to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStep {
    /// The component was running and is now `Stopping`; the caller owns the drain
    /// and must call [`Lifecycle::mark_terminated`] when it is done.
    Drain,
    /// The component never started and went straight to `Terminated`.
    Terminated,
    /// Another caller already began (or finished) the shutdown.
    AlreadyShuttingDown,
}

/// Monotonic lifecycle state shared by all clones.
#[derive(Clone)]
pub struct Lifecycle {
    component: &'static str,
    id: Arc<str>,
    state: Arc<watch::Sender<LifecycleState>>,
}

impl Lifecycle {
    pub fn new(component: &'static str, id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(LifecycleState::NotStarted);
        Self {
            component,
            id: Arc::from(id.into()),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Applies `operation` atomically and returns the transition that was taken.
    fn apply(&self, operation: Operation) -> (LifecycleState, Transition) {
        let mut outcome = (LifecycleState::NotStarted, Transition::Skip);
        self.state.send_if_modified(|state| {
            let transition = transition_for(*state, operation);
            outcome = (*state, transition);
            match transition {
                Transition::Enter(next) => {
                    *state = next;
                    true
                }
                Transition::Skip | Transition::Reject(_) => false,
            }
        });
        outcome
    }

    /// Moves `NotStarted` to `Starting`.
    ///
    /// Returns `Ok(true)` when this caller owns the start sequence and must finish it
    /// with [`Lifecycle::mark_running`], `Ok(false)` when the component is already
    /// starting or running.
    ///
    /// # Errors
    ///
    /// Returns `CairnError::NotRunning` when the component is stopping or terminated.
    pub fn begin_start(&self) -> Result<bool> {
        match self.apply(Operation::Start) {
            (_, Transition::Enter(_)) => {
                debug!("{} '{}' is starting", self.component, self.id);
                Ok(true)
            }
            (_, Transition::Skip) => Ok(false),
            (state, Transition::Reject(reason)) => Err(CairnError::not_running(format!(
                "{} '{}' is {}: {}",
                self.component, self.id, state, reason
            ))),
        }
    }

    /// Completes a start begun by [`Lifecycle::begin_start`].
    ///
    /// Has no effect if a shutdown overtook the start.
    pub fn mark_running(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Starting {
                *state = LifecycleState::Running;
                true
            } else {
                false
            }
        });
        if changed {
            info!("{} '{}' is running", self.component, self.id);
        }
    }

    pub fn begin_shutdown(&self) -> ShutdownStep {
        match self.apply(Operation::Shutdown) {
            (_, Transition::Enter(LifecycleState::Terminated)) => {
                info!(
                    "{} '{}' shut down before it was started",
                    self.component, self.id
                );
                ShutdownStep::Terminated
            }
            (_, Transition::Enter(_)) => {
                debug!("{} '{}' is stopping", self.component, self.id);
                ShutdownStep::Drain
            }
            (_, Transition::Skip) | (_, Transition::Reject(_)) => {
                ShutdownStep::AlreadyShuttingDown
            }
        }
    }

    pub fn mark_terminated(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Terminated {
                false
            } else {
                *state = LifecycleState::Terminated;
                true
            }
        });
        if changed {
            info!("{} '{}' terminated", self.component, self.id);
        }
    }

    /// Waits until the component is `Terminated` or `timeout` elapses.
    ///
    /// Returns `true` immediately when already terminated, `false` immediately when
    /// no shutdown is in progress, and otherwise whether termination happened in time.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        match self.state() {
            LifecycleState::Terminated => return true,
            LifecycleState::Stopping => {}
            _ => return false,
        }
        let mut receiver = self.state.subscribe();
        let reached = tokio::time::timeout(
            timeout,
            receiver.wait_for(|state| *state == LifecycleState::Terminated),
        )
        .await;
        matches!(reached, Ok(Ok(_)))
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("component", &self.component)
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
