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

//! Plugin core module for connector abstractions
//!
//! A connector bridges the engine to one kind of backing store. The federation
//! initializes it once with a [`ConnectorContext`] and then asks it for
//! [`Connection`]s, which it pools per source.
//!
//! cairn-lib has no knowledge of which connectors exist - it only knows about
//! these traits. Connectors are created from configuration through the
//! [`super::ConnectorRegistry`], or handed to the engine builder directly.

use anyhow::Result;
use async_trait::async_trait;
use cairn_core::models::{NodePath, Subgraph};

use crate::context::ConnectorContext;

/// A live handle to one source's backing store.
///
/// A connection is used by one caller at a time; the federation hands it out
/// wrapped in a `PooledConnection` and takes it back when the borrow ends.
#[async_trait]
pub trait Connection: Send {
    /// Name of the source this connection belongs to
    fn source_name(&self) -> &str;

    /// Check that the backing store is reachable
    async fn ping(&mut self) -> Result<()>;

    /// Read the nodes at most `depth` levels below `root`.
    ///
    /// `workspace` selects a workspace within the source; `None` means the
    /// source's default workspace. Returns `Ok(None)` when `root` does not exist.
    async fn read_subgraph(
        &mut self,
        workspace: Option<&str>,
        root: &NodePath,
        depth: usize,
    ) -> Result<Option<Subgraph>>;

    /// Whether this connection may go back into the pool after use.
    ///
    /// Default is `true`. Connectors return `false` once a connection is broken.
    fn is_reusable(&self) -> bool {
        true
    }

    /// Release the connection's resources. Called at most once.
    fn close(&mut self);
}

/// Trait defining the interface for all connector implementations.
///
/// # Example Implementation
///
/// ```ignore
/// #[async_trait]
/// impl Connector for FileConnector {
///     fn type_name(&self) -> &str {
///         "file"
///     }
///
///     async fn initialize(&self, context: ConnectorContext) -> anyhow::Result<()> {
///         self.watch(self.root.clone(), context.bus.clone());
///         Ok(())
///     }
///
///     async fn new_connection(&self) -> anyhow::Result<Box<dyn Connection>> {
///         Ok(Box::new(FileConnection::open(&self.root)?))
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the connector type name (e.g., "memory", "file")
    fn type_name(&self) -> &str;

    /// Called once when the connector's source is registered.
    ///
    /// The context carries the change bus on which the connector publishes
    /// change events whenever its backing store mutates.
    async fn initialize(&self, context: ConnectorContext) -> Result<()>;

    /// Open a new connection to the backing store.
    async fn new_connection(&self) -> Result<Box<dyn Connection>>;
}
