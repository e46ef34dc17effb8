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

use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

use super::{JobDispatcher, ProcessingObserver, RuleMatcher};
use crate::channels::{ChangeBus, ObserverId};
use crate::error::Result;
use crate::lifecycle::{Lifecycle, LifecycleState, ShutdownStep};
use crate::managers::{log_component_start, log_component_stop};

/// Owns the processing observer's registration on the bus.
///
/// While running, every change event is matched and turned into jobs. Shutting the
/// service down detaches it from the bus; jobs already submitted are the
/// dispatcher's to drain.
pub struct ProcessingService {
    engine_id: String,
    lifecycle: Lifecycle,
    bus: Arc<ChangeBus>,
    matcher: Arc<RuleMatcher>,
    dispatcher: Arc<JobDispatcher>,
    registration: Mutex<Option<ObserverId>>,
}

impl ProcessingService {
    pub fn new(
        engine_id: impl Into<String>,
        bus: Arc<ChangeBus>,
        matcher: Arc<RuleMatcher>,
        dispatcher: Arc<JobDispatcher>,
    ) -> Self {
        let engine_id = engine_id.into();
        Self {
            lifecycle: Lifecycle::new("processing service", engine_id.clone()),
            engine_id,
            bus,
            matcher,
            dispatcher,
            registration: Mutex::new(None),
        }
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn matcher(&self) -> &Arc<RuleMatcher> {
        &self.matcher
    }

    pub fn dispatcher(&self) -> &Arc<JobDispatcher> {
        &self.dispatcher
    }

    pub async fn start(&self) -> Result<()> {
        let mut registration = self.registration.lock().await;
        if !self.lifecycle.begin_start()? {
            return Ok(());
        }
        log_component_start("processing service", &self.engine_id);
        let observer = ProcessingObserver::new(self.matcher.clone(), self.dispatcher.clone());
        *registration = Some(self.bus.register(Arc::new(observer)).await);
        debug!(
            "[{}] Processing {} rule(s)",
            self.engine_id,
            self.matcher.len()
        );
        self.lifecycle.mark_running();
        Ok(())
    }

    /// Detaches from the bus. Idempotent.
    pub async fn shutdown(&self) {
        let step = self.lifecycle.begin_shutdown();
        if step == ShutdownStep::AlreadyShuttingDown {
            return;
        }
        let mut registration = self.registration.lock().await;
        if let Some(id) = registration.take() {
            log_component_stop("processing service", &self.engine_id);
            self.bus.unregister(id).await;
        }
        self.lifecycle.mark_terminated();
    }
}
