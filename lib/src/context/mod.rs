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

//! Runtime context types handed to plugins.
//!
//! Connectors receive a [`ConnectorContext`] once, when their source is registered
//! with the federation. Processors receive a [`ProcessingContext`] with every job.
//! Both are cheap to clone; shared services are held in `Arc`s.
//!
//! # Example - Connector Plugin
//!
//! ```ignore
//! use cairn_lib::context::ConnectorContext;
//!
//! #[async_trait]
//! impl Connector for MyConnector {
//!     async fn initialize(&self, context: ConnectorContext) -> anyhow::Result<()> {
//!         // Keep the context to publish change events later
//!         *self.context.write().await = Some(context);
//!         Ok(())
//!     }
//!     // ...
//! }
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::channels::ChangeBus;
use crate::federation::Federation;

/// Context provided to connectors during initialization.
///
/// # Available Services
///
/// - `engine_id`: The engine instance ID (for log correlation)
/// - `source_name`: The name the connector's source is registered under
/// - `bus`: The engine's change bus, on which the connector publishes change events
#[derive(Clone)]
pub struct ConnectorContext {
    /// Engine instance ID
    pub engine_id: String,

    /// Name of the source this connector serves
    pub source_name: String,

    /// The engine's change bus
    pub bus: Arc<ChangeBus>,
}

impl ConnectorContext {
    pub fn new(
        engine_id: impl Into<String>,
        source_name: impl Into<String>,
        bus: Arc<ChangeBus>,
    ) -> Self {
        Self {
            engine_id: engine_id.into(),
            source_name: source_name.into(),
            bus,
        }
    }

    pub fn engine_id(&self) -> &str {
        &self.engine_id
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn bus(&self) -> &Arc<ChangeBus> {
        &self.bus
    }
}

impl std::fmt::Debug for ConnectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorContext")
            .field("engine_id", &self.engine_id)
            .field("source_name", &self.source_name)
            .field("bus", &"<ChangeBus>")
            .finish()
    }
}

/// Context provided to a processor for one job.
///
/// The federation is the processor's way back into the engine: it can borrow
/// connections to read its input. The federation stays open until every job
/// submitted before shutdown has finished.
#[derive(Clone)]
pub struct ProcessingContext {
    /// Identifier of the job being processed
    pub job_id: Uuid,

    /// Name of the rule that produced the job
    pub rule_name: String,

    /// Connection resolution for every registered source
    pub federation: Arc<Federation>,
}

impl ProcessingContext {
    pub fn new(job_id: Uuid, rule_name: impl Into<String>, federation: Arc<Federation>) -> Self {
        Self {
            job_id,
            rule_name: rule_name.into(),
            federation,
        }
    }

    pub fn federation(&self) -> &Arc<Federation> {
        &self.federation
    }
}

impl std::fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("job_id", &self.job_id)
            .field("rule_name", &self.rule_name)
            .field("federation", &"<Federation>")
            .finish()
    }
}
