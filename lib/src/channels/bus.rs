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

//! Fan-out change bus with per-observer failure isolation.
//!
//! ```text
//! Connector ──publish──▶ ChangeBus ──▶ observer 1 (registration order)
//!                                 ──▶ observer 2
//!                                 ──▶ observer N
//! ```
//!
//! Delivery is sequential on the publishing task. An observer that returns an error
//! or panics is logged and recorded on the bus's problems; delivery continues with
//! the next observer and the publisher never sees the failure. Observers should hand
//! expensive work off (the processing observer submits jobs to the dispatcher).

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use cairn_core::models::ChangeEvent;
use cairn_core::problems::{Problem, Problems};
use futures::FutureExt;
use log::{debug, trace};
use tokio::sync::RwLock;

use crate::config::DEFAULT_PROBLEM_CAPACITY;
use crate::managers::{log_component_warning, panic_message};

/// Handle returned by [`ChangeBus::register`], used to unregister.
pub type ObserverId = u64;

/// Receives change events from the bus.
#[async_trait]
pub trait ChangeObserver: Send + Sync {
    /// Name used in logs and problem records.
    fn name(&self) -> &str;

    /// Handle one event. Errors are recorded by the bus and never reach the publisher.
    async fn notify(&self, event: &ChangeEvent) -> Result<()>;
}

/// Outcome of one [`ChangeBus::publish`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// The engine's change bus. One instance per engine, shared through `Arc`.
pub struct ChangeBus {
    engine_id: String,
    observers: RwLock<Vec<(ObserverId, Arc<dyn ChangeObserver>)>>,
    next_id: AtomicU64,
    problems: Mutex<Problems>,
    problem_capacity: usize,
}

impl ChangeBus {
    pub fn new(engine_id: impl Into<String>) -> Self {
        Self {
            engine_id: engine_id.into(),
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            problems: Mutex::new(Problems::new()),
            problem_capacity: DEFAULT_PROBLEM_CAPACITY,
        }
    }

    /// Keeps at most `capacity` observer failures, evicting the oldest first.
    pub fn with_problem_capacity(mut self, capacity: usize) -> Self {
        self.problem_capacity = capacity.max(1);
        self
    }

    pub async fn register(&self, observer: Arc<dyn ChangeObserver>) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            "[{}] Registering change observer '{}' as #{id}",
            self.engine_id,
            observer.name()
        );
        self.observers.write().await.push((id, observer));
        id
    }

    /// Removes an observer. Returns `false` if the id was not registered.
    pub async fn unregister(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().await;
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        let removed = observers.len() != before;
        if removed {
            debug!("[{}] Unregistered change observer #{id}", self.engine_id);
        }
        removed
    }

    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Delivers `event` to every currently registered observer, in registration order.
    ///
    /// Observers registered or removed while a publish is in flight take effect for
    /// the next event.
    pub async fn publish(&self, event: &ChangeEvent) -> DeliveryReport {
        let snapshot: Vec<(ObserverId, Arc<dyn ChangeObserver>)> =
            self.observers.read().await.clone();
        trace!(
            "[{}] Publishing {event} to {} observer(s)",
            self.engine_id,
            snapshot.len()
        );

        let mut report = DeliveryReport::default();
        for (_, observer) in snapshot {
            let outcome = AssertUnwindSafe(observer.notify(event))
                .catch_unwind()
                .await;
            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{e:#}")),
                Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
            };
            match failure {
                None => report.delivered += 1,
                Some(cause) => {
                    report.failed += 1;
                    self.record_failure(observer.name(), event, cause);
                }
            }
        }
        report
    }

    /// Snapshot of the observer failures recorded so far.
    pub fn problems(&self) -> Problems {
        match self.problems.lock() {
            Ok(problems) => problems.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_failure(&self, observer: &str, event: &ChangeEvent, cause: String) {
        log_component_warning(
            "change bus",
            &self.engine_id,
            &format!("observer '{observer}' failed on {event}: {cause}"),
        );
        let problem = Problem::error("Observer '{}' failed to handle change event {}")
            .with_parameter(observer)
            .with_parameter(event)
            .with_resource(observer)
            .with_cause(cause);
        let mut problems = match self.problems.lock() {
            Ok(problems) => problems,
            Err(poisoned) => poisoned.into_inner(),
        };
        problems.push_bounded(problem, self.problem_capacity);
    }
}

impl std::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("engine_id", &self.engine_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{FailingObserver, PanickingObserver, RecordingObserver};
    use cairn_core::models::{ChangeKind, NodePath};

    fn event(sequence: u64) -> ChangeEvent {
        ChangeEvent::new(
            "content",
            ChangeKind::Added,
            vec![NodePath::parse("/files/a.pdf").unwrap()],
            sequence,
        )
    }

    #[tokio::test]
    async fn test_publish_without_observers() {
        let bus = ChangeBus::new("test");
        let report = bus.publish(&event(1)).await;
        assert_eq!(report, DeliveryReport::default());
    }

    #[tokio::test]
    async fn test_delivery_follows_registration_order() {
        let bus = ChangeBus::new("test");
        let journal = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            bus.register(Arc::new(RecordingObserver::with_journal(
                name,
                journal.clone(),
            )))
            .await;
        }

        bus.publish(&event(1)).await;
        bus.publish(&event(2)).await;

        let journal = journal.lock().unwrap().clone();
        assert_eq!(
            journal,
            vec![
                ("first".to_string(), 1),
                ("second".to_string(), 1),
                ("third".to_string(), 1),
                ("first".to_string(), 2),
                ("second".to_string(), 2),
                ("third".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_observers_do_not_block_others() {
        let bus = ChangeBus::new("test");
        let before = Arc::new(RecordingObserver::new("before"));
        let after = Arc::new(RecordingObserver::new("after"));
        bus.register(before.clone()).await;
        bus.register(Arc::new(FailingObserver::new("broken"))).await;
        bus.register(Arc::new(PanickingObserver::new("panicky"))).await;
        bus.register(after.clone()).await;

        let report = bus.publish(&event(7)).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(before.sequences(), vec![7]);
        assert_eq!(after.sequences(), vec![7]);

        let problems = bus.problems();
        assert_eq!(problems.error_count(), 2);
        let resources: Vec<_> = problems
            .iter()
            .filter_map(|p| p.resource.clone())
            .collect();
        assert_eq!(resources, vec!["broken", "panicky"]);
    }

    #[tokio::test]
    async fn test_recorded_failures_are_bounded() {
        let bus = ChangeBus::new("test").with_problem_capacity(2);
        bus.register(Arc::new(FailingObserver::new("broken"))).await;

        for sequence in 1..=5 {
            bus.publish(&event(sequence)).await;
        }

        let problems = bus.problems();
        assert_eq!(problems.len(), 2);
        let messages: Vec<String> = problems.iter().map(|p| p.message()).collect();
        assert!(messages[0].contains("content#4"), "{messages:?}");
        assert!(messages[1].contains("content#5"), "{messages:?}");
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let bus = ChangeBus::new("test");
        let observer = Arc::new(RecordingObserver::new("watcher"));
        let id = bus.register(observer.clone()).await;
        bus.publish(&event(1)).await;

        assert!(bus.unregister(id).await);
        assert!(!bus.unregister(id).await);
        bus.publish(&event(2)).await;

        assert_eq!(observer.sequences(), vec![1]);
        assert_eq!(bus.observer_count().await, 0);
    }
}
