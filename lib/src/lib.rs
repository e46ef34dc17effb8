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

//! Runtime core of the Cairn content engine.
//!
//! An [`Engine`] boots from a configuration tree stored in one of its own sources,
//! federates every configured source behind named, pooled connections, and turns
//! content changes into processing jobs:
//!
//! ```text
//! connector ──ChangeEvent──▶ ChangeBus ──▶ ProcessingObserver ──▶ RuleMatcher ──▶ JobDispatcher
//!                               └──────▶ SourceConfigurationObserver ──▶ Federation
//! ```

// ============================================================================
// Core Public Modules
// ============================================================================

/// Fluent builder for engines
pub mod builder;

/// Contexts handed to connectors and processors
pub mod context;

/// Error types for cairn-lib
pub mod error;

/// Configuration schema, configuration-tree reader and typed records
pub mod config;

/// Capability traits and factory registries for plugins
pub mod plugin_core;

/// Built-in connectors
pub mod connectors;

/// MIME type detection
pub mod mime;

// ============================================================================
// Internal Modules (public so integration tests can reach them)
// ============================================================================

#[cfg_attr(not(test), doc(hidden))]
pub mod channels;
#[cfg_attr(not(test), doc(hidden))]
pub mod federation;
#[cfg_attr(not(test), doc(hidden))]
pub mod lib_core;
#[cfg_attr(not(test), doc(hidden))]
pub mod lifecycle;
#[cfg_attr(not(test), doc(hidden))]
pub mod managers;
#[cfg_attr(not(test), doc(hidden))]
pub mod processing;
#[cfg_attr(not(test), doc(hidden))]
pub mod repository;
#[cfg_attr(not(test), doc(hidden))]
pub mod state_guard;

#[cfg(test)]
pub(crate) mod test_support;

// ============================================================================
// Clean Public API
// ============================================================================

/// The engine - use `Engine::builder()` to create instances
///
/// # Examples
///
/// ```no_run
/// use cairn_lib::Engine;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Engine::builder()
///     .with_id("content-engine")
///     .build()
///     .await?;
/// engine.start().await?;
/// # Ok(())
/// # }
/// ```
pub use lib_core::Engine;

/// Error types for cairn-lib
pub use error::{CairnError, Result};

/// Fluent builder for engines
pub use builder::EngineBuilder;

/// Configuration types
pub use config::{
    DetectorRule, DispatcherConfig, EngineConfig, FederationConfig, ProcessorRule,
    SourceDescriptor,
};

/// Change bus types
pub use channels::{ChangeBus, ChangeObserver, DeliveryReport, ObserverId};

/// Federation types
pub use federation::{Federation, Graph, PooledConnection};

/// Lifecycle states shared by every component
pub use lifecycle::LifecycleState;

/// Processing types
pub use processing::{DispatcherStats, Job};

/// Repository service
pub use repository::RepositoryService;

/// Plugin capability traits
pub use plugin_core::{Connection, Connector, Detector, Processor};

/// Plugin contexts
pub use context::{ConnectorContext, ProcessingContext};

/// Built-in in-memory connector
pub use connectors::InMemoryConnector;

/// MIME type detection
pub use mime::{ExtensionDetector, MimeTypeDetectors};
