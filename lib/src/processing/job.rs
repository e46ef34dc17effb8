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

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use cairn_core::models::Location;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::ProcessorRule;
use crate::plugin_core::Processor;

/// One scheduled invocation of a processor against a matched path.
#[derive(Clone)]
pub struct Job {
    pub id: Uuid,
    pub input: Location,
    pub output: Location,
    pub rule: Arc<ProcessorRule>,
    pub processor: Arc<dyn Processor>,
    /// Sequence of the change event that produced the job
    pub event_sequence: u64,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        input: Location,
        output: Location,
        rule: Arc<ProcessorRule>,
        processor: Arc<dyn Processor>,
        event_sequence: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
            output,
            rule,
            processor,
            event_sequence,
            submitted_at: Utc::now(),
        }
    }

    pub fn rule_name(&self) -> &str {
        &self.rule.name
    }
}

impl Display for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "job {} (rule '{}': {} -> {})",
            self.id, self.rule.name, self.input, self.output
        )
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("rule", &self.rule.name)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("event_sequence", &self.event_sequence)
            .field("submitted_at", &self.submitted_at)
            .finish()
    }
}
