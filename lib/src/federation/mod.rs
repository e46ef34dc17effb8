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

//! Connection federation.
//!
//! The federation maps source names to connection pools and is the single place
//! where a logical source name is resolved to a usable connection. It is also the
//! connection factory that [`Graph`] views are built on.
//!
//! Sources come from two places: connectors handed to the engine directly (the
//! configuration source) and descriptors read from the configuration tree. Only the
//! latter are touched when the configuration changes at runtime.

pub mod graph;
pub mod pool;
mod reconfigure;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cairn_core::problems::Problems;
use log::{debug, info};
use tokio::sync::RwLock;

use crate::channels::ChangeBus;
use crate::config::{FederationConfig, SourceDescriptor, DEFAULT_PROBLEM_CAPACITY};
use crate::context::ConnectorContext;
use crate::error::{CairnError, Result};
use crate::lifecycle::{Lifecycle, LifecycleState, ShutdownStep};
use crate::managers::{log_component_start, log_component_stop};
use crate::plugin_core::{Connector, ConnectorRegistry};

pub use graph::Graph;
pub use pool::{ConnectionPool, PooledConnection};
pub use reconfigure::{Reconciliation, SourceConfigurationObserver};

pub struct Federation {
    engine_id: String,
    configuration_source: String,
    lifecycle: Lifecycle,
    bus: Arc<ChangeBus>,
    connectors: ConnectorRegistry,
    max_idle: usize,
    pools: RwLock<HashMap<String, Arc<ConnectionPool>>>,
    problems: Mutex<Problems>,
    problem_capacity: usize,
    reload: tokio::sync::Mutex<()>,
}

impl Federation {
    pub fn new(
        engine_id: impl Into<String>,
        configuration_source: impl Into<String>,
        bus: Arc<ChangeBus>,
        connectors: ConnectorRegistry,
        config: &FederationConfig,
    ) -> Self {
        let engine_id = engine_id.into();
        Self {
            lifecycle: Lifecycle::new("federation", engine_id.clone()),
            engine_id,
            configuration_source: configuration_source.into(),
            bus,
            connectors,
            max_idle: config.max_idle_per_source,
            pools: RwLock::new(HashMap::new()),
            problems: Mutex::new(Problems::new()),
            problem_capacity: DEFAULT_PROBLEM_CAPACITY,
            reload: tokio::sync::Mutex::new(()),
        }
    }

    /// Keeps at most `capacity` reload problems, evicting the oldest first.
    pub fn with_problem_capacity(mut self, capacity: usize) -> Self {
        self.problem_capacity = capacity.max(1);
        self
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Name of the source that holds the configuration tree.
    pub fn configuration_source(&self) -> &str {
        &self.configuration_source
    }

    pub fn connector_registry(&self) -> &ConnectorRegistry {
        &self.connectors
    }

    pub fn start(&self) -> Result<()> {
        if self.lifecycle.begin_start()? {
            log_component_start("federation", &self.engine_id);
            self.lifecycle.mark_running();
        }
        Ok(())
    }

    /// Closes every pool. Idempotent.
    ///
    /// Registered names stay listed, but no connection can be borrowed afterwards.
    pub async fn shutdown(&self) {
        let step = self.lifecycle.begin_shutdown();
        if step == ShutdownStep::AlreadyShuttingDown {
            return;
        }
        log_component_stop("federation", &self.engine_id);
        for pool in self.pools.read().await.values() {
            pool.close();
        }
        if step == ShutdownStep::Drain {
            self.lifecycle.mark_terminated();
        }
    }

    /// Adds or replaces a source described by configuration.
    ///
    /// # Errors
    ///
    /// - `CairnError::InvalidConfig` if no connector factory matches the descriptor
    /// - `CairnError::Connection` if the connector fails to initialize
    /// - `CairnError::NotRunning` once the federation is shutting down
    pub async fn register(&self, descriptor: SourceDescriptor) -> Result<()> {
        let connector = self.connectors.create(&descriptor).map_err(|e| {
            CairnError::invalid_config(format!("Source '{}': {e}", descriptor.name))
        })?;
        let name = descriptor.name.clone();
        self.install(name, connector, Some(Arc::new(descriptor)))
            .await
    }

    /// Adds or replaces a source served by an existing connector instance.
    pub async fn register_connector(
        &self,
        name: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) -> Result<()> {
        self.install(name.into(), connector, None).await
    }

    async fn install(
        &self,
        name: String,
        connector: Arc<dyn Connector>,
        descriptor: Option<Arc<SourceDescriptor>>,
    ) -> Result<()> {
        self.ensure_open()?;
        connector
            .initialize(ConnectorContext::new(
                self.engine_id.clone(),
                name.clone(),
                self.bus.clone(),
            ))
            .await
            .map_err(|e| CairnError::connection(name.clone(), e))?;

        let pool = Arc::new(ConnectionPool::new(
            name.clone(),
            connector,
            descriptor,
            self.max_idle,
        ));
        let mut pools = self.pools.write().await;
        // Shutdown may have walked the pools while the connector was initializing.
        if let Err(e) = self.ensure_open() {
            drop(pools);
            pool.close();
            debug!("[{}] Discarded source '{name}' registered during shutdown", self.engine_id);
            return Err(e);
        }
        let replaced = pools.insert(name.clone(), pool);
        drop(pools);
        match replaced {
            Some(old) => {
                info!(
                    "[{}] Replaced source '{name}' ({} connector)",
                    self.engine_id,
                    old.connector_type()
                );
                old.close();
            }
            None => info!("[{}] Registered source '{name}'", self.engine_id),
        }
        Ok(())
    }

    /// Deregisters a source and closes its pool. Returns `false` if it was unknown.
    pub async fn remove(&self, name: &str) -> bool {
        let removed = self.pools.write().await.remove(name);
        match removed {
            Some(pool) => {
                pool.close();
                info!("[{}] Removed source '{name}'", self.engine_id);
                true
            }
            None => false,
        }
    }

    /// Borrows a connection to the named source.
    ///
    /// # Errors
    ///
    /// - `CairnError::UnknownSource` if nothing is registered under `name`
    /// - `CairnError::Connection` if the connector cannot open a connection
    /// - `CairnError::NotRunning` once the federation is shutting down
    pub async fn get_connection(&self, name: &str) -> Result<PooledConnection> {
        self.ensure_open()?;
        let pool = self.pool(name).await?;
        match pool.checkout().await {
            Ok(connection) => Ok(connection),
            // The source was replaced between lookup and checkout; the new pool serves it.
            Err(_) if pool.is_closed() => {
                self.ensure_open()?;
                self.pool(name)
                    .await?
                    .checkout()
                    .await
                    .map_err(|e| CairnError::connection(name, e))
            }
            Err(e) => Err(CairnError::connection(name, e)),
        }
    }

    /// A graph view over the named source in its default workspace.
    pub async fn graph(self: &Arc<Self>, name: &str) -> Result<Graph> {
        if !self.contains(name).await {
            return Err(CairnError::unknown_source(name));
        }
        Ok(Graph::new(self.clone(), name, None))
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.pools.read().await.contains_key(name)
    }

    /// Registered source names, sorted.
    pub async fn source_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn descriptor(&self, name: &str) -> Option<Arc<SourceDescriptor>> {
        self.pools
            .read()
            .await
            .get(name)
            .and_then(|pool| pool.descriptor().cloned())
    }

    /// Problems recorded by runtime source reloads.
    pub fn problems(&self) -> Problems {
        match self.problems.lock() {
            Ok(problems) => problems.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_problems(&self, problems: Problems) {
        if problems.is_empty() {
            return;
        }
        let mut recorded = match self.problems.lock() {
            Ok(recorded) => recorded,
            Err(poisoned) => poisoned.into_inner(),
        };
        for problem in problems {
            recorded.push_bounded(problem, self.problem_capacity);
        }
    }

    async fn pool(&self, name: &str) -> Result<Arc<ConnectionPool>> {
        let pool = self.pools.read().await.get(name).cloned();
        pool.ok_or_else(|| {
            debug!("[{}] Unknown source '{name}' requested", self.engine_id);
            CairnError::unknown_source(name)
        })
    }

    fn ensure_open(&self) -> Result<()> {
        match self.lifecycle.state() {
            LifecycleState::Stopping | LifecycleState::Terminated => Err(
                CairnError::not_running(format!("Federation for engine '{}' is shut down", self.engine_id)),
            ),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for Federation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Federation")
            .field("engine_id", &self.engine_id)
            .field("configuration_source", &self.configuration_source)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}
