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

//! Fluent builder for [`Engine`] instances.
//!
//! Building an engine boots it from its configuration tree:
//!
//! 1. The configuration source's connector is registered with the federation.
//! 2. The configuration tree is scanned for sources, processor rules and detectors.
//! 3. Configured sources are registered; rules and detectors are bound to the
//!    factories registered on the builder by their `cairn:classname`.
//! 4. The federation starts watching the configuration source for source changes.
//!
//! Nothing in the configuration makes `build` fail. Every issue found becomes a
//! [`Problem`], and error problems prevent [`Engine::start`].
//!
//! # Example
//!
//! ```ignore
//! use cairn_lib::Engine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::builder()
//!     .with_id("content-engine")
//!     .with_configuration_source(configuration_connector)
//!     .with_configuration_path("/config")
//!     .with_pool_size(4)
//!     .with_processor_factory("text-extractor", |_rule| Ok(Arc::new(TextExtractor) as Arc<dyn Processor>))
//!     .build()
//!     .await?;
//!
//! if engine.problems().has_errors() {
//!     for problem in engine.problems().errors() {
//!         eprintln!("{problem}");
//!     }
//! }
//! engine.start().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use cairn_core::problems::{Problem, Problems};
use log::{debug, info};

use crate::channels::ChangeBus;
use crate::config::{ConfigurationReader, DetectorRule, EngineConfig, ProcessorRule, ScanResult};
use crate::connectors::{InMemoryConnector, MEMORY_CONNECTOR_TYPE};
use crate::error::Result;
use crate::federation::{Federation, SourceConfigurationObserver};
use crate::lib_core::Engine;
use crate::managers::log_problems;
use crate::mime::MimeTypeDetectors;
use crate::plugin_core::{
    Connector, ConnectorRegistry, Detector, DetectorRegistry, Processor, ProcessorRegistry,
};
use crate::processing::{BoundRule, JobDispatcher, ProcessingService, RuleMatcher};
use crate::repository::RepositoryService;

/// Fluent builder for creating [`Engine`] instances.
///
/// Use `Engine::builder()` to get started. Without a configuration source the engine
/// boots from an empty in-memory store.
pub struct EngineBuilder {
    config: EngineConfig,
    configuration_connector: Option<Arc<dyn Connector>>,
    connectors: ConnectorRegistry,
    processors: ProcessorRegistry,
    detectors: DetectorRegistry,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        let mut connectors = ConnectorRegistry::new();
        connectors.register(MEMORY_CONNECTOR_TYPE, |descriptor| {
            Ok(Arc::new(InMemoryConnector::from_descriptor(descriptor)) as Arc<dyn Connector>)
        });
        Self {
            config: EngineConfig::default(),
            configuration_connector: None,
            connectors,
            processors: ProcessorRegistry::new(),
            detectors: DetectorRegistry::new(),
        }
    }

    /// Replace the whole engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the engine ID.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the connector serving the configuration source, taking ownership.
    pub fn with_configuration_source(mut self, connector: impl Connector + 'static) -> Self {
        self.configuration_connector = Some(Arc::new(connector));
        self
    }

    /// Set the name the configuration source is registered under.
    pub fn with_configuration_source_name(mut self, name: impl Into<String>) -> Self {
        self.config.configuration_source = name.into();
        self
    }

    /// Set the root of the configuration tree within the configuration source.
    pub fn with_configuration_path(mut self, path: impl Into<String>) -> Self {
        self.config.configuration_path = path.into();
        self
    }

    /// Pin the configuration source to a workspace.
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.config.workspace = Some(workspace.into());
        self
    }

    /// Set the number of jobs that may run concurrently.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.config.dispatcher.pool_size = pool_size;
        self
    }

    /// Set how many runtime problems each component keeps before evicting the oldest.
    pub fn with_problem_capacity(mut self, capacity: usize) -> Self {
        self.config.problem_capacity = capacity;
        self
    }

    /// Set how long shutdown waits for running jobs before closing sources.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.config.dispatcher.drain_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Register a connector factory for a `cairn:connectorType`.
    ///
    /// The `memory` type is registered by default and may be overridden.
    pub fn with_connector_factory<F>(mut self, connector_type: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&crate::config::SourceDescriptor) -> anyhow::Result<Arc<dyn Connector>>
            + Send
            + Sync
            + 'static,
    {
        self.connectors.register(connector_type, factory);
        self
    }

    /// Register a processor factory for a processor rule's `cairn:classname`.
    pub fn with_processor_factory<F>(mut self, classname: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ProcessorRule) -> anyhow::Result<Arc<dyn Processor>> + Send + Sync + 'static,
    {
        self.processors.register(classname, factory);
        self
    }

    /// Register a detector factory for a detector rule's `cairn:classname`.
    pub fn with_detector_factory<F>(mut self, classname: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&DetectorRule) -> anyhow::Result<Arc<dyn Detector>> + Send + Sync + 'static,
    {
        self.detectors.register(classname, factory);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// - `CairnError::InvalidConfig` if the engine configuration itself is invalid
    /// - `CairnError::Connection` if the configuration connector fails to initialize
    pub async fn build(self) -> Result<Engine> {
        let Self {
            config,
            configuration_connector,
            connectors,
            processors,
            detectors,
        } = self;
        config.validate()?;
        let root = config.configuration_root()?;
        info!("[{}] Building engine from '{}:{}'", config.id, config.configuration_source, root);

        let bus = Arc::new(
            ChangeBus::new(config.id.clone()).with_problem_capacity(config.problem_capacity),
        );
        let federation = Arc::new(
            Federation::new(
                config.id.clone(),
                config.configuration_source.clone(),
                bus.clone(),
                connectors,
                &config.federation,
            )
            .with_problem_capacity(config.problem_capacity),
        );
        let configuration_connector = configuration_connector
            .unwrap_or_else(|| Arc::new(InMemoryConnector::new()) as Arc<dyn Connector>);
        federation
            .register_connector(config.configuration_source.clone(), configuration_connector)
            .await?;

        let repository = RepositoryService::new(federation.clone(), root.clone(), config.workspace.clone());
        let reader = ConfigurationReader::new(repository.configuration_graph().await?, root.clone());
        let ScanResult {
            sources,
            processors: processor_rules,
            detectors: detector_rules,
            mut problems,
        } = reader.scan().await;

        let reconciliation = federation.apply_descriptors(sources, &mut problems).await;
        debug!(
            "[{}] Registered configured sources: {:?}",
            config.id, reconciliation.added
        );

        let matcher = Arc::new(RuleMatcher::new(bind_processors(
            &processors,
            processor_rules,
            &mut problems,
        )));
        let detectors = Arc::new(MimeTypeDetectors::new(bind_detectors(
            &detectors,
            detector_rules,
            &mut problems,
        )));

        let observer = SourceConfigurationObserver::new(&federation, root, config.workspace.clone())?;
        bus.register(Arc::new(observer)).await;

        let dispatcher = Arc::new(
            JobDispatcher::new(config.id.clone(), &config.dispatcher, federation.clone())
                .with_problem_capacity(config.problem_capacity),
        );
        let processing = Arc::new(ProcessingService::new(
            config.id.clone(),
            bus.clone(),
            matcher.clone(),
            dispatcher.clone(),
        ));

        log_problems(&config.id, &problems);
        info!(
            "[{}] Engine built: {} source(s), {} processor rule(s), {} detector(s), {} problem(s)",
            config.id,
            federation.source_names().await.len(),
            matcher.len(),
            detectors.len(),
            problems.len()
        );

        Ok(Engine::new(
            config,
            bus,
            federation,
            dispatcher,
            processing,
            repository,
            detectors,
            problems,
        ))
    }
}

fn bind_processors(
    registry: &ProcessorRegistry,
    rules: Vec<ProcessorRule>,
    problems: &mut Problems,
) -> Vec<BoundRule> {
    let mut bound = Vec::with_capacity(rules.len());
    for rule in rules {
        // A missing classname was reported by the reader.
        if rule.classname.is_empty() {
            continue;
        }
        match registry.create(&rule) {
            Ok(processor) => bound.push(BoundRule::new(rule, processor)),
            Err(e) => problems.push(
                Problem::error("Processor rule '{}' names an unknown implementation '{}'")
                    .with_parameter(&rule.name)
                    .with_parameter(&rule.classname)
                    .with_resource(&rule.name)
                    .with_cause(e),
            ),
        }
    }
    bound
}

fn bind_detectors(
    registry: &DetectorRegistry,
    rules: Vec<DetectorRule>,
    problems: &mut Problems,
) -> Vec<(String, Arc<dyn Detector>)> {
    let mut bound = Vec::with_capacity(rules.len());
    for rule in rules {
        match registry.create(&rule) {
            Ok(detector) => bound.push((rule.name, detector)),
            Err(e) => problems.push(
                Problem::error("Detector '{}' names an unknown implementation '{}'")
                    .with_parameter(&rule.name)
                    .with_parameter(&rule.classname)
                    .with_resource(&rule.name)
                    .with_cause(e),
            ),
        }
    }
    bound
}
