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

use std::path::Path;
use std::time::Duration;

use cairn_core::models::NodePath;
use serde::{Deserialize, Serialize};

use crate::error::{CairnError, Result};

/// Name under which the configuration source is registered unless configured otherwise.
pub const DEFAULT_CONFIGURATION_SOURCE: &str = "cairn:configuration";

/// Runtime problems kept per component before the oldest are evicted.
pub const DEFAULT_PROBLEM_CAPACITY: usize = 1000;

/// Engine configuration.
///
/// Loadable from YAML or JSON; every field has a default, so an empty document is
/// a valid configuration.
///
/// # Examples
///
/// ```yaml
/// id: content-engine
/// configuration_source: "cairn:configuration"
/// configuration_path: /config
/// workspace: system
/// problem_capacity: 500
/// dispatcher:
///   pool_size: 4
///   drain_timeout_ms: 10000
/// federation:
///   max_idle_per_source: 8
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Unique identifier for this engine instance (defaults to UUID)
    #[serde(default = "default_id")]
    pub id: String,
    /// Name of the source holding the configuration tree
    #[serde(
        default = "default_configuration_source",
        alias = "configurationSource"
    )]
    pub configuration_source: String,
    /// Root of the configuration tree within that source
    #[serde(default = "default_configuration_path", alias = "configurationPath")]
    pub configuration_path: String,
    /// Workspace of the configuration source that holds the configuration tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    /// Runtime problems kept by the change bus, the dispatcher and the federation (default: 1000)
    #[serde(default = "default_problem_capacity", alias = "problemCapacity")]
    pub problem_capacity: usize,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub federation: FederationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            id: default_id(),
            configuration_source: default_configuration_source(),
            configuration_path: default_configuration_path(),
            workspace: None,
            problem_capacity: default_problem_capacity(),
            dispatcher: DispatcherConfig::default(),
            federation: FederationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DispatcherConfig {
    /// Number of jobs that may run concurrently (default: 10)
    #[serde(default = "default_pool_size", alias = "poolSize")]
    pub pool_size: usize,
    /// Upper bound the engine waits for running jobs before closing sources (default: 30000)
    #[serde(default = "default_drain_timeout_ms", alias = "drainTimeoutMs")]
    pub drain_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl DispatcherConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FederationConfig {
    /// Idle connections kept per source (default: 8)
    #[serde(default = "default_max_idle", alias = "maxIdlePerSource")]
    pub max_idle_per_source: usize,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            max_idle_per_source: default_max_idle(),
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)
            .map_err(|e| CairnError::invalid_config(format!("Failed to parse YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| CairnError::invalid_config(format!("Failed to parse JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CairnError::invalid_config(format!("Failed to read '{}': {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CairnError::invalid_config("Engine id cannot be empty"));
        }
        if self.configuration_source.trim().is_empty() {
            return Err(CairnError::invalid_config(
                "Configuration source name cannot be empty",
            ));
        }
        if let Err(e) = NodePath::parse(&self.configuration_path) {
            return Err(CairnError::invalid_config(format!(
                "Invalid configuration path: {e}"
            )));
        }
        if matches!(&self.workspace, Some(workspace) if workspace.trim().is_empty()) {
            return Err(CairnError::invalid_config("Workspace name cannot be empty"));
        }
        if self.problem_capacity == 0 {
            return Err(CairnError::invalid_config(
                "Problem capacity must be at least 1",
            ));
        }
        if self.dispatcher.pool_size == 0 {
            return Err(CairnError::invalid_config(
                "Dispatcher pool size must be at least 1",
            ));
        }
        Ok(())
    }

    /// The configuration root as a path. Call [`EngineConfig::validate`] first.
    pub fn configuration_root(&self) -> Result<NodePath> {
        NodePath::parse(&self.configuration_path)
            .map_err(|e| CairnError::invalid_config(format!("Invalid configuration path: {e}")))
    }
}

fn default_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_configuration_source() -> String {
    DEFAULT_CONFIGURATION_SOURCE.to_string()
}

fn default_configuration_path() -> String {
    "/".to_string()
}

fn default_problem_capacity() -> usize {
    DEFAULT_PROBLEM_CAPACITY
}

fn default_pool_size() -> usize {
    10
}

fn default_drain_timeout_ms() -> u64 {
    30_000
}

fn default_max_idle() -> usize {
    8
}
