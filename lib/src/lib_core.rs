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
use std::time::Duration;

use cairn_core::problems::Problems;
use log::{error, info};
use tokio::sync::Mutex;

use crate::channels::ChangeBus;
use crate::config::EngineConfig;
use crate::error::{CairnError, Result};
use crate::federation::{Federation, Graph, PooledConnection};
use crate::lifecycle::{Lifecycle, LifecycleState, ShutdownStep};
use crate::managers::{log_component_error, log_component_start, log_component_stop, log_component_warning};
use crate::mime::MimeTypeDetectors;
use crate::processing::{DispatcherStats, JobDispatcher, ProcessingService};
use crate::repository::RepositoryService;
use crate::state_guard::StateGuard;

/// The content engine.
///
/// `Engine` is the main entry point for embedding Cairn. It owns the federation of
/// sources, the change bus, and the processing pipeline that turns content changes
/// into jobs.
///
/// # Lifecycle
///
/// ```text
/// NOT_STARTED ──start()──▶ STARTING ──▶ RUNNING ──shutdown()──▶ STOPPING ──▶ TERMINATED
///      └────────────────────────shutdown()───────────────────────────────────────▲
/// ```
///
/// - `start()` refuses to run while the boot [`Problems`] contain errors, and then
///   leaves every component untouched.
/// - `shutdown()` returns at once. Job intake stops first, the processing observer
///   detaches from the bus, and in the background the engine waits for running jobs
///   (up to the configured drain timeout) before it closes every source.
/// - `await_termination(timeout)` waits for that background work.
///
/// Accessors that hand out connections or services fail with
/// `CairnError::NotRunning` unless the engine is running.
///
/// # Thread Safety
///
/// `Engine` is `Clone` (all clones share the same underlying state) and all methods
/// are thread-safe.
///
/// # Example
///
/// ```ignore
/// use cairn_lib::Engine;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = Engine::builder()
///     .with_configuration_source(configuration_connector)
///     .build()
///     .await?;
///
/// engine.start().await?;
///
/// let graph = engine.graph("assets").await?;
/// let node = graph.node(&NodePath::parse("/files/report.pdf")?).await?;
///
/// engine.shutdown().await;
/// engine.await_termination(Duration::from_secs(30)).await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Engine {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) bus: Arc<ChangeBus>,
    pub(crate) federation: Arc<Federation>,
    pub(crate) dispatcher: Arc<JobDispatcher>,
    pub(crate) processing: Arc<ProcessingService>,
    pub(crate) repository: RepositoryService,
    pub(crate) detectors: Arc<MimeTypeDetectors>,
    pub(crate) problems: Arc<Problems>,
    pub(crate) state_guard: StateGuard,
    // Serializes start and shutdown
    transition: Arc<Mutex<()>>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: EngineConfig,
        bus: Arc<ChangeBus>,
        federation: Arc<Federation>,
        dispatcher: Arc<JobDispatcher>,
        processing: Arc<ProcessingService>,
        repository: RepositoryService,
        detectors: Arc<MimeTypeDetectors>,
        problems: Problems,
    ) -> Self {
        let state_guard = StateGuard::new(
            federation.lifecycle().clone(),
            dispatcher.lifecycle().clone(),
        );
        Self {
            lifecycle: Lifecycle::new("engine", config.id.clone()),
            config: Arc::new(config),
            bus,
            federation,
            dispatcher,
            processing,
            repository,
            detectors,
            problems: Arc::new(problems),
            state_guard,
            transition: Arc::new(Mutex::new(())),
        }
    }

    /// Create a builder for configuring a new engine.
    pub fn builder() -> crate::builder::EngineBuilder {
        crate::builder::EngineBuilder::new()
    }

    // ============================================================================
    // Lifecycle
    // ============================================================================

    /// Start the federation, the dispatcher and the processing service, in that order.
    ///
    /// Calling `start` on a running engine does nothing.
    ///
    /// # Errors
    ///
    /// `CairnError::NotRunning` if the boot problems contain errors (each is logged
    /// first), or if the engine was already shut down.
    pub async fn start(&self) -> Result<()> {
        let _transition = self.transition.lock().await;
        let id = self.id();

        if self.problems.has_errors() {
            log_component_error(
                "engine",
                id,
                "errors in the configuration prevent the engine from starting",
            );
            for problem in self.problems.errors() {
                error!("[{id}] {problem}");
            }
            return Err(CairnError::not_running(format!(
                "{} configuration error(s) prevent engine '{id}' from starting",
                self.problems.error_count()
            )));
        }

        if !self.lifecycle.begin_start()? {
            return Ok(());
        }
        log_component_start("engine", id);

        if let Err(e) = self.start_components().await {
            log_component_error("engine", id, &format!("failed to start: {e}"));
            self.dispatcher.shutdown().await;
            self.processing.shutdown().await;
            self.federation.shutdown().await;
            self.lifecycle.mark_terminated();
            return Err(e);
        }

        self.lifecycle.mark_running();
        info!("[{id}] Engine started");
        Ok(())
    }

    async fn start_components(&self) -> Result<()> {
        self.federation.start()?;
        self.dispatcher.start()?;
        self.processing.start().await
    }

    /// Begin an orderly shutdown. Idempotent, and returns without waiting for jobs.
    ///
    /// An engine that was never started terminates immediately.
    pub async fn shutdown(&self) {
        let _transition = self.transition.lock().await;
        let id = self.id().to_string();

        match self.lifecycle.begin_shutdown() {
            ShutdownStep::AlreadyShuttingDown => {}
            ShutdownStep::Terminated => {
                self.dispatcher.shutdown().await;
                self.processing.shutdown().await;
                self.federation.shutdown().await;
            }
            ShutdownStep::Drain => {
                log_component_stop("engine", &id);
                self.dispatcher.shutdown().await;
                self.processing.shutdown().await;

                let dispatcher = self.dispatcher.clone();
                let federation = self.federation.clone();
                let lifecycle = self.lifecycle.clone();
                let drain_timeout = self.config.dispatcher.drain_timeout();
                tokio::spawn(async move {
                    if !dispatcher.await_termination(drain_timeout).await {
                        log_component_warning(
                            "engine",
                            &id,
                            &format!(
                                "jobs still running after {drain_timeout:?}; closing sources anyway ({:?})",
                                dispatcher.stats()
                            ),
                        );
                    }
                    federation.shutdown().await;
                    lifecycle.mark_terminated();
                });
            }
        }
    }

    /// Wait until shutdown has completed. Returns `false` on timeout, or right away if
    /// shutdown was never requested.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        self.lifecycle.await_termination(timeout).await
    }

    // ============================================================================
    // Guarded Access
    // ============================================================================

    /// Borrow a connection to the named source.
    ///
    /// # Errors
    ///
    /// - `CairnError::NotRunning` if the engine is not running
    /// - `CairnError::UnknownSource` if no source has that name
    /// - `CairnError::Connection` if the source's connector fails
    pub async fn get_connection(&self, source_name: &str) -> Result<PooledConnection> {
        self.state_guard.require_running()?;
        self.federation.get_connection(source_name).await
    }

    /// The connection factory for every source.
    pub fn get_connection_factory(&self) -> Result<Arc<Federation>> {
        self.state_guard.require_running()?;
        Ok(self.federation.clone())
    }

    pub fn get_repository_service(&self) -> Result<RepositoryService> {
        self.state_guard.require_running()?;
        Ok(self.repository.clone())
    }

    pub fn processing_service(&self) -> Result<Arc<ProcessingService>> {
        self.state_guard.require_running()?;
        Ok(self.processing.clone())
    }

    /// The MIME type detector chain: configured detectors, then detection by extension.
    pub fn mime_type_detector(&self) -> Result<Arc<MimeTypeDetectors>> {
        self.state_guard.require_running()?;
        Ok(self.detectors.clone())
    }

    /// A graph over the named source. The configuration source is pinned to the
    /// configured workspace.
    pub async fn graph(&self, source_name: &str) -> Result<Graph> {
        self.state_guard.require_running()?;
        self.repository.graph(source_name).await
    }

    // ============================================================================
    // Unguarded Access
    // ============================================================================

    /// A graph over the configuration tree's source, usable before `start`.
    pub async fn configuration_graph(&self) -> Result<Graph> {
        self.repository.configuration_graph().await
    }

    /// Problems found while building the engine from its configuration.
    pub fn problems(&self) -> Problems {
        self.problems.as_ref().clone()
    }

    /// Problems reported by jobs.
    pub fn processing_problems(&self) -> Problems {
        self.dispatcher.problems()
    }

    pub fn dispatcher_stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }

    pub fn change_bus(&self) -> Arc<ChangeBus> {
        self.bus.clone()
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running() && self.state_guard.is_running()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.config.id)
            .field("state", &self.lifecycle.state())
            .field("federation", &self.federation.state())
            .field("dispatcher", &self.dispatcher.state())
            .field("processing", &self.processing.state())
            .finish()
    }
}
