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

//! Rule matching.
//!
//! Maps the paths of a change event to jobs. For every path, every rule is tried;
//! within one rule the first expression that matches decides the output path.
//! Matching does no I/O and never blocks on other tasks, so it is safe to call from
//! the bus's delivery path.

use std::sync::{Arc, RwLock};

use cairn_core::models::{ChangeEvent, Location};
use log::{debug, warn};

use super::Job;
use crate::config::ProcessorRule;
use crate::plugin_core::Processor;

/// A rule together with the processor it was bound to.
#[derive(Clone)]
pub struct BoundRule {
    pub rule: Arc<ProcessorRule>,
    pub processor: Arc<dyn Processor>,
}

impl BoundRule {
    pub fn new(rule: ProcessorRule, processor: Arc<dyn Processor>) -> Self {
        Self {
            rule: Arc::new(rule),
            processor,
        }
    }
}

#[derive(Default)]
pub struct RuleMatcher {
    rules: RwLock<Vec<BoundRule>>,
}

impl RuleMatcher {
    pub fn new(rules: Vec<BoundRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    pub fn add_rule(&self, rule: BoundRule) {
        match self.rules.write() {
            Ok(mut rules) => rules.push(rule),
            Err(poisoned) => poisoned.into_inner().push(rule),
        }
    }

    pub fn rules(&self) -> Vec<Arc<ProcessorRule>> {
        self.snapshot().into_iter().map(|bound| bound.rule).collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The jobs `event` calls for, in path order then rule order.
    pub fn on_event(&self, event: &ChangeEvent) -> Vec<Job> {
        let rules = self.snapshot();
        let mut jobs = Vec::new();
        for path in event.paths() {
            for bound in &rules {
                let Some((expression, matcher)) = bound.rule.first_match(path) else {
                    continue;
                };
                let template = bound.rule.output_template_for(expression);
                match matcher.substitute(template) {
                    Ok(output) => {
                        debug!(
                            "Rule '{}' matched {}:{path} via '{}' -> {output}",
                            bound.rule.name,
                            event.source_name(),
                            expression
                        );
                        jobs.push(Job::new(
                            Location::new(event.source_name(), path.clone()),
                            Location::new(event.source_name(), output),
                            bound.rule.clone(),
                            bound.processor.clone(),
                            event.sequence(),
                        ));
                    }
                    Err(e) => warn!(
                        "Rule '{}' matched {path} but output template '{template}' is not a valid path: {e}",
                        bound.rule.name
                    ),
                }
            }
        }
        jobs
    }

    fn snapshot(&self) -> Vec<BoundRule> {
        match self.rules.read() {
            Ok(rules) => rules.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
