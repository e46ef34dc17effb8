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

//! Plugin Registry Module
//!
//! Factory registries for creating connectors, processors and detectors from the
//! records the configuration reader produces.
//!
//! # Example
//!
//! ```ignore
//! use cairn_lib::plugin_core::{ConnectorRegistry, Connector};
//!
//! let mut registry = ConnectorRegistry::new();
//!
//! // Register a factory for the "memory" connector type
//! registry.register("memory", |descriptor| {
//!     Ok(Arc::new(InMemoryConnector::from_descriptor(descriptor)) as Arc<dyn Connector>)
//! });
//!
//! let descriptor = SourceDescriptor::new("assets", "memory");
//! let connector = registry.create(&descriptor)?;
//! ```

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Arc;

use super::{Connector, Detector, Processor};
use crate::config::{DetectorRule, ProcessorRule, SourceDescriptor};

/// Factory function type for creating connectors from a source descriptor.
pub type ConnectorFactory =
    Box<dyn Fn(&SourceDescriptor) -> Result<Arc<dyn Connector>> + Send + Sync>;

/// Factory function type for creating processors from a processor rule.
pub type ProcessorFactory = Box<dyn Fn(&ProcessorRule) -> Result<Arc<dyn Processor>> + Send + Sync>;

/// Factory function type for creating detectors from a detector rule.
pub type DetectorFactory = Box<dyn Fn(&DetectorRule) -> Result<Arc<dyn Detector>> + Send + Sync>;

/// Registry for connector factories, keyed by connector type.
pub struct ConnectorRegistry {
    factories: HashMap<String, ConnectorFactory>,
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorRegistry {
    /// Create a new empty connector registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory function for a connector type.
    ///
    /// # Arguments
    ///
    /// * `connector_type` - The type name used in `cairn:connectorType` (e.g., "memory")
    /// * `factory` - Factory function that creates connector instances
    pub fn register<F>(&mut self, connector_type: impl Into<String>, factory: F)
    where
        F: Fn(&SourceDescriptor) -> Result<Arc<dyn Connector>> + Send + Sync + 'static,
    {
        self.factories
            .insert(connector_type.into(), Box::new(factory));
    }

    /// Create a connector for a source descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No factory is registered for the descriptor's connector type
    /// - The factory returns an error
    pub fn create(&self, descriptor: &SourceDescriptor) -> Result<Arc<dyn Connector>> {
        let factory = self
            .factories
            .get(&descriptor.connector_type)
            .ok_or_else(|| anyhow!("Unknown connector type: '{}'", descriptor.connector_type))?;

        factory(descriptor)
    }

    /// Check if a factory is registered for a connector type.
    pub fn has_factory(&self, connector_type: &str) -> bool {
        self.factories.contains_key(connector_type)
    }

    /// Get a list of registered connector types.
    pub fn registered_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

/// Registry for processor factories, keyed by the rule's `cairn:classname`.
pub struct ProcessorRegistry {
    factories: HashMap<String, ProcessorFactory>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, classname: impl Into<String>, factory: F)
    where
        F: Fn(&ProcessorRule) -> Result<Arc<dyn Processor>> + Send + Sync + 'static,
    {
        self.factories.insert(classname.into(), Box::new(factory));
    }

    /// Create the processor a rule names.
    ///
    /// # Errors
    ///
    /// Returns an error if no factory is registered for the rule's classname or the
    /// factory fails.
    pub fn create(&self, rule: &ProcessorRule) -> Result<Arc<dyn Processor>> {
        let factory = self
            .factories
            .get(&rule.classname)
            .ok_or_else(|| anyhow!("Unknown processor implementation: '{}'", rule.classname))?;

        factory(rule)
    }

    pub fn has_factory(&self, classname: &str) -> bool {
        self.factories.contains_key(classname)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

/// Registry for MIME type detector factories, keyed by the rule's `cairn:classname`.
pub struct DetectorRegistry {
    factories: HashMap<String, DetectorFactory>,
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, classname: impl Into<String>, factory: F)
    where
        F: Fn(&DetectorRule) -> Result<Arc<dyn Detector>> + Send + Sync + 'static,
    {
        self.factories.insert(classname.into(), Box::new(factory));
    }

    pub fn create(&self, rule: &DetectorRule) -> Result<Arc<dyn Detector>> {
        let factory = self
            .factories
            .get(&rule.classname)
            .ok_or_else(|| anyhow!("Unknown detector implementation: '{}'", rule.classname))?;

        factory(rule)
    }

    pub fn has_factory(&self, classname: &str) -> bool {
        self.factories.contains_key(classname)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::InMemoryConnector;
    use crate::mime::ExtensionDetector;
    use crate::test_support::helpers::RecordingProcessor;

    #[test]
    fn test_connector_registry_creates_by_type() {
        let mut registry = ConnectorRegistry::new();
        registry.register("memory", |_descriptor| {
            Ok(Arc::new(InMemoryConnector::new()) as Arc<dyn Connector>)
        });

        assert!(registry.has_factory("memory"));
        assert!(!registry.has_factory("jdbc"));
        assert_eq!(registry.registered_types(), vec!["memory"]);

        let connector = registry
            .create(&SourceDescriptor::new("assets", "memory"))
            .unwrap();
        assert_eq!(connector.type_name(), "memory");
    }

    #[test]
    fn test_connector_registry_unknown_type() {
        let registry = ConnectorRegistry::new();
        let result = registry.create(&SourceDescriptor::new("assets", "jdbc"));
        match result {
            Err(e) => assert!(e.to_string().contains("Unknown connector type: 'jdbc'")),
            Ok(_) => panic!("expected an error for an unregistered connector type"),
        }
    }

    #[test]
    fn test_processor_registry_creates_by_classname() {
        let mut registry = ProcessorRegistry::new();
        let processor = Arc::new(RecordingProcessor::new());
        let shared = processor.clone();
        registry.register("text-extractor", move |_rule| {
            Ok(shared.clone() as Arc<dyn Processor>)
        });

        let rule = ProcessorRule::new("text", "text-extractor");
        assert!(registry.create(&rule).is_ok());

        let unknown = ProcessorRule::new("other", "missing");
        assert!(registry.create(&unknown).is_err());
    }

    #[test]
    fn test_detector_registry_creates_by_classname() {
        let mut registry = DetectorRegistry::new();
        registry.register("extension", |_rule| {
            Ok(Arc::new(ExtensionDetector::new()) as Arc<dyn Detector>)
        });

        let detector = registry
            .create(&DetectorRule::new("by-extension", "extension"))
            .unwrap();
        assert_eq!(
            detector.detect(Some("report.pdf"), &[]).unwrap().as_deref(),
            Some("application/pdf")
        );
    }
}
