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

use anyhow::{bail, Result};
use async_trait::async_trait;
use cairn_core::models::{ChangeEvent, ChangeKind};
use log::trace;

use super::{JobDispatcher, RuleMatcher};
use crate::channels::ChangeObserver;

pub const PROCESSING_OBSERVER: &str = "processing";

/// Bridges the change bus to the dispatcher: matches each event against the rules
/// and submits the resulting jobs. Removed nodes have no content left to process.
pub struct ProcessingObserver {
    matcher: Arc<RuleMatcher>,
    dispatcher: Arc<JobDispatcher>,
}

impl ProcessingObserver {
    pub fn new(matcher: Arc<RuleMatcher>, dispatcher: Arc<JobDispatcher>) -> Self {
        Self {
            matcher,
            dispatcher,
        }
    }
}

#[async_trait]
impl ChangeObserver for ProcessingObserver {
    fn name(&self) -> &str {
        PROCESSING_OBSERVER
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        if event.kind() == ChangeKind::Removed {
            trace!("Ignoring {event}");
            return Ok(());
        }

        let mut rejected = Vec::new();
        for job in self.matcher.on_event(event) {
            if let Err(e) = self.dispatcher.submit(job) {
                rejected.push(e.to_string());
            }
        }
        if !rejected.is_empty() {
            bail!("{} job(s) rejected: {}", rejected.len(), rejected.join("; "));
        }
        Ok(())
    }
}
