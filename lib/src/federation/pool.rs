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

//! Per-source connection pooling.
//!
//! Each registered source gets one [`ConnectionPool`]. Borrowers receive a
//! [`PooledConnection`]; dropping it hands the connection back to its pool, or
//! closes it when the pool is closed, full, or the connector vetoes reuse.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use cairn_core::models::{NodePath, Subgraph};
use log::{debug, trace};

use crate::config::SourceDescriptor;
use crate::plugin_core::{Connection, Connector};

pub struct ConnectionPool {
    source_name: String,
    connector: Arc<dyn Connector>,
    descriptor: Option<Arc<SourceDescriptor>>,
    idle: Mutex<Vec<Box<dyn Connection>>>,
    max_idle: usize,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(
        source_name: impl Into<String>,
        connector: Arc<dyn Connector>,
        descriptor: Option<Arc<SourceDescriptor>>,
        max_idle: usize,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            connector,
            descriptor,
            idle: Mutex::new(Vec::new()),
            max_idle,
            closed: AtomicBool::new(false),
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The descriptor the source was configured with; `None` for sources
    /// registered directly with a connector instance.
    pub fn descriptor(&self) -> Option<&Arc<SourceDescriptor>> {
        self.descriptor.as_ref()
    }

    pub fn connector_type(&self) -> &str {
        self.connector.type_name()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.lock_idle().len()
    }

    /// Borrows an idle connection, or opens a new one through the connector.
    pub async fn checkout(self: &Arc<Self>) -> Result<PooledConnection> {
        if self.is_closed() {
            bail!("connection pool for '{}' is closed", self.source_name);
        }
        let reused = self.lock_idle().pop();
        let connection = match reused {
            Some(connection) => {
                trace!("Reusing pooled connection to '{}'", self.source_name);
                connection
            }
            None => {
                debug!("Opening new connection to '{}'", self.source_name);
                self.connector.new_connection().await?
            }
        };
        Ok(PooledConnection {
            pool: self.clone(),
            connection: Some(connection),
        })
    }

    fn release(&self, mut connection: Box<dyn Connection>) {
        if self.is_closed() || !connection.is_reusable() {
            connection.close();
            return;
        }
        let mut idle = self.lock_idle();
        if idle.len() >= self.max_idle {
            drop(idle);
            connection.close();
        } else {
            idle.push(connection);
        }
    }

    /// Closes every idle connection. Connections still borrowed are closed when
    /// they come back.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let drained: Vec<Box<dyn Connection>> = self.lock_idle().drain(..).collect();
        debug!(
            "Closing connection pool for '{}' ({} idle connection(s))",
            self.source_name,
            drained.len()
        );
        for mut connection in drained {
            connection.close();
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Box<dyn Connection>>> {
        match self.idle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A borrowed connection. Returned to its pool on drop.
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    connection: Option<Box<dyn Connection>>,
}

impl PooledConnection {
    pub fn source_name(&self) -> &str {
        self.pool.source_name()
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.inner()?.ping().await
    }

    pub async fn read_subgraph(
        &mut self,
        workspace: Option<&str>,
        root: &NodePath,
        depth: usize,
    ) -> Result<Option<Subgraph>> {
        self.inner()?.read_subgraph(workspace, root, depth).await
    }

    /// Direct access to the connector's connection.
    pub fn connection_mut(&mut self) -> Result<&mut (dyn Connection + 'static)> {
        self.inner().map(|c| c.as_mut())
    }

    fn inner(&mut self) -> Result<&mut Box<dyn Connection>> {
        let source_name = self.pool.source_name.as_str();
        self.connection
            .as_mut()
            .ok_or_else(|| anyhow!("connection to '{source_name}' was already released"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("source_name", &self.pool.source_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::InMemoryConnector;

    fn pool(connector: &InMemoryConnector, max_idle: usize) -> Arc<ConnectionPool> {
        Arc::new(ConnectionPool::new(
            "content",
            Arc::new(connector.clone()),
            None,
            max_idle,
        ))
    }

    #[tokio::test]
    async fn test_connections_are_reused() {
        let connector = InMemoryConnector::new();
        let pool = pool(&connector, 2);

        let first = pool.checkout().await.unwrap();
        drop(first);
        assert_eq!(pool.idle_count(), 1);

        let mut second = pool.checkout().await.unwrap();
        second.ping().await.unwrap();
        assert_eq!(connector.connections_created(), 1);
        drop(second);
    }

    #[tokio::test]
    async fn test_idle_list_is_bounded() {
        let connector = InMemoryConnector::new();
        let pool = pool(&connector, 1);

        let a = pool.checkout().await.unwrap();
        let b = pool.checkout().await.unwrap();
        assert_eq!(connector.open_connections(), 2);
        drop(a);
        drop(b);

        assert_eq!(pool.idle_count(), 1);
        assert_eq!(connector.open_connections(), 1);
    }

    #[tokio::test]
    async fn test_close_releases_idle_and_returned_connections() {
        let connector = InMemoryConnector::new();
        let pool = pool(&connector, 4);

        let borrowed = pool.checkout().await.unwrap();
        drop(pool.checkout().await.unwrap());
        assert_eq!(connector.open_connections(), 2);

        pool.close();
        assert_eq!(connector.open_connections(), 1);
        assert!(pool.checkout().await.is_err());

        drop(borrowed);
        assert_eq!(connector.open_connections(), 0);
    }
}
