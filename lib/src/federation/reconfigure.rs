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

//! Reconciling the federation with the source descriptors in configuration.
//!
//! Used once at boot and again whenever the configuration source reports a change
//! below `<root>/cairn:sources`. Reloads are serialized.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

use anyhow::Result;
use async_trait::async_trait;
use cairn_core::models::{ChangeEvent, NodePath};
use cairn_core::problems::{Problem, Problems};
use log::{debug, info, warn};

use super::{Federation, Graph};
use crate::channels::ChangeObserver;
use crate::config::{lexicon, ConfigurationReader, SourceDescriptor};
use crate::lifecycle::LifecycleState;

/// What one reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub added: Vec<String>,
    pub replaced: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty() && self.removed.is_empty()
    }
}

impl Federation {
    /// Makes the configured sources match `descriptors`.
    ///
    /// New names are registered, changed descriptors replace their source, and
    /// configured sources missing from `descriptors` are removed. Sources registered
    /// with a connector instance (the configuration source among them) are never
    /// removed. Failures are recorded in `problems`.
    pub async fn apply_descriptors(
        &self,
        descriptors: Vec<SourceDescriptor>,
        problems: &mut Problems,
    ) -> Reconciliation {
        let current: HashMap<String, Option<Arc<SourceDescriptor>>> = self
            .pools
            .read()
            .await
            .iter()
            .map(|(name, pool)| (name.clone(), pool.descriptor().cloned()))
            .collect();

        let mut outcome = Reconciliation::default();
        let mut wanted = HashSet::new();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            if name == self.configuration_source {
                problems.push(
                    Problem::warning("Source '{}' has the configuration source's name and is ignored")
                        .with_parameter(&name)
                        .with_resource(&name),
                );
                continue;
            }
            if !wanted.insert(name.clone()) {
                // The reader already reported the duplicate; the first definition wins.
                continue;
            }
            let existing = current.get(&name);
            if let Some(Some(existing)) = existing {
                if **existing == descriptor {
                    outcome.unchanged.push(name);
                    continue;
                }
            }
            match self.register(descriptor).await {
                Ok(()) if existing.is_some() => outcome.replaced.push(name),
                Ok(()) => outcome.added.push(name),
                Err(e) => problems.push(
                    Problem::error("Unable to register source '{}'")
                        .with_parameter(&name)
                        .with_resource(&name)
                        .with_cause(e),
                ),
            }
        }

        for (name, descriptor) in current {
            if descriptor.is_some() && !wanted.contains(&name) && self.remove(&name).await {
                outcome.removed.push(name);
            }
        }
        outcome
    }

    /// Re-reads the source descriptors from the configuration source and applies them.
    ///
    /// A configuration tree that cannot be read leaves the federation untouched.
    pub async fn reload_sources(
        self: &Arc<Self>,
        root: &NodePath,
        workspace: Option<String>,
    ) -> Problems {
        let _serialized = self.reload.lock().await;
        let mut problems = Problems::new();
        if matches!(
            self.state(),
            LifecycleState::Stopping | LifecycleState::Terminated
        ) {
            return problems;
        }

        let graph = Graph::new(self.clone(), self.configuration_source.clone(), workspace);
        let reader = ConfigurationReader::new(graph, root.clone());
        match reader.try_scan_sources(&mut problems).await {
            Ok(descriptors) => {
                let outcome = self.apply_descriptors(descriptors, &mut problems).await;
                if outcome.is_empty() {
                    debug!("[{}] Source configuration reloaded, nothing changed", self.engine_id);
                } else {
                    info!(
                        "[{}] Source configuration reloaded: added {:?}, replaced {:?}, removed {:?}",
                        self.engine_id, outcome.added, outcome.replaced, outcome.removed
                    );
                }
            }
            Err(e) => problems.push(
                Problem::error("Unable to reload source configuration from '{}'")
                    .with_parameter(&self.configuration_source)
                    .with_cause(e),
            ),
        }

        for problem in problems.iter() {
            warn!("[{}] {problem}", self.engine_id);
        }
        self.record_problems(problems.clone());
        problems
    }
}

/// Reloads source descriptors when the configuration source changes below
/// `<root>/cairn:sources`.
///
/// Holds the federation weakly: the bus it is registered on belongs to the federation.
pub struct SourceConfigurationObserver {
    federation: Weak<Federation>,
    root: NodePath,
    sources: NodePath,
    workspace: Option<String>,
}

impl SourceConfigurationObserver {
    pub fn new(
        federation: &Arc<Federation>,
        root: NodePath,
        workspace: Option<String>,
    ) -> crate::error::Result<Self> {
        let sources = root.child(lexicon::SOURCES).map_err(|e| {
            crate::error::CairnError::invalid_config(format!("Invalid configuration root: {e}"))
        })?;
        Ok(Self {
            federation: Arc::downgrade(federation),
            root,
            sources,
            workspace,
        })
    }
}

#[async_trait]
impl ChangeObserver for SourceConfigurationObserver {
    fn name(&self) -> &str {
        "source-configuration"
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        let Some(federation) = self.federation.upgrade() else {
            return Ok(());
        };
        let other_workspace = match (&self.workspace, event.workspace()) {
            (Some(pinned), Some(changed)) => pinned != changed,
            _ => false,
        };
        if event.source_name() != federation.configuration_source()
            || other_workspace
            || !event.touches(&self.sources)
        {
            return Ok(());
        }
        debug!("Configuration change {event} affects sources; reloading");
        let problems = federation
            .reload_sources(&self.root, self.workspace.clone())
            .await;
        if problems.has_errors() {
            anyhow::bail!(
                "source reload finished with {} error(s)",
                problems.error_count()
            );
        }
        Ok(())
    }
}
