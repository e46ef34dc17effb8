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

//! In-memory connector.
//!
//! Keeps every workspace as an ordered map from path to properties. Mutations go
//! through the connector handle and, once the connector has been initialized,
//! publish a [`ChangeEvent`] tagged with the workspace on the engine's bus.
//! Publishing is serialized per connector, so observers see events in mutation
//! order.
//!
//! Observers must not mutate the publishing connector from inside `notify`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use cairn_core::models::{ChangeEvent, ChangeKind, Node, NodePath, PropertyMap, Subgraph};
use log::debug;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::config::SourceDescriptor;
use crate::context::ConnectorContext;
use crate::plugin_core::{Connection, Connector};

pub const MEMORY_CONNECTOR_TYPE: &str = "memory";
pub const DEFAULT_WORKSPACE: &str = "default";

type Workspace = BTreeMap<NodePath, PropertyMap>;

struct Store {
    default_workspace: String,
    workspaces: RwLock<HashMap<String, Workspace>>,
    context: RwLock<Option<ConnectorContext>>,
    sequence: AtomicU64,
    publish_order: Mutex<()>,
    open_connections: AtomicUsize,
    connections_created: AtomicUsize,
    unavailable: AtomicBool,
}

/// Connector over an in-process tree. Clones share the same store.
#[derive(Clone)]
pub struct InMemoryConnector {
    store: Arc<Store>,
}

impl Default for InMemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::with_default_workspace(DEFAULT_WORKSPACE)
    }

    pub fn with_default_workspace(name: impl Into<String>) -> Self {
        Self::with_workspaces(name.into(), Vec::new())
    }

    /// Builds a connector from a source descriptor.
    ///
    /// Recognized properties: `defaultWorkspace` and `workspaces` (a list of
    /// additional workspace names).
    pub fn from_descriptor(descriptor: &SourceDescriptor) -> Self {
        let default_workspace = descriptor
            .properties
            .get("defaultWorkspace")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_WORKSPACE);
        let extra = match descriptor.properties.get("workspaces") {
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(name)) => vec![name.clone()],
            _ => Vec::new(),
        };
        Self::with_workspaces(default_workspace.to_string(), extra)
    }

    fn with_workspaces(default_workspace: String, extra: Vec<String>) -> Self {
        let mut workspaces = HashMap::new();
        workspaces.insert(default_workspace.clone(), empty_workspace());
        for name in extra {
            workspaces.entry(name).or_insert_with(empty_workspace);
        }
        Self {
            store: Arc::new(Store {
                default_workspace,
                workspaces: RwLock::new(workspaces),
                context: RwLock::new(None),
                sequence: AtomicU64::new(0),
                publish_order: Mutex::new(()),
                open_connections: AtomicUsize::new(0),
                connections_created: AtomicUsize::new(0),
                unavailable: AtomicBool::new(false),
            }),
        }
    }

    pub fn default_workspace(&self) -> &str {
        &self.store.default_workspace
    }

    pub async fn create_workspace(&self, name: &str) {
        self.store
            .workspaces
            .write()
            .await
            .entry(name.to_string())
            .or_insert_with(empty_workspace);
    }

    /// Creates or replaces the node at `path` in the default workspace.
    ///
    /// Missing ancestors are created with no properties.
    pub async fn put_node<K, V>(
        &self,
        path: &str,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let workspace = self.store.default_workspace.clone();
        self.put_node_in(&workspace, path, properties).await
    }

    pub async fn put_node_in<K, V>(
        &self,
        workspace: &str,
        path: &str,
        properties: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let path = NodePath::parse(path)?;
        let properties: PropertyMap = properties
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let _order = self.store.publish_order.lock().await;
        let kind = {
            let mut workspaces = self.store.workspaces.write().await;
            let nodes = workspace_mut(&mut workspaces, workspace)?;
            let mut ancestor = path.parent();
            while let Some(current) = ancestor {
                nodes.entry(current.clone()).or_default();
                ancestor = current.parent();
            }
            match nodes.insert(path.clone(), properties) {
                Some(_) => ChangeKind::Modified,
                None => ChangeKind::Added,
            }
        };
        self.publish(workspace, kind, vec![path]).await;
        Ok(())
    }

    pub async fn set_property(
        &self,
        path: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let path = NodePath::parse(path)?;
        let workspace = self.store.default_workspace.clone();

        let _order = self.store.publish_order.lock().await;
        {
            let mut workspaces = self.store.workspaces.write().await;
            let nodes = workspace_mut(&mut workspaces, &workspace)?;
            let node = nodes
                .get_mut(&path)
                .ok_or_else(|| anyhow!("node '{path}' does not exist"))?;
            node.insert(name.to_string(), value.into());
        }
        self.publish(&workspace, ChangeKind::Modified, vec![path])
            .await;
        Ok(())
    }

    /// Removes the node and everything below it. Returns `false` if it did not exist.
    pub async fn remove_node(&self, path: &str) -> Result<bool> {
        let path = NodePath::parse(path)?;
        if path.is_root() {
            bail!("the root node cannot be removed");
        }
        let workspace = self.store.default_workspace.clone();

        let _order = self.store.publish_order.lock().await;
        let removed = {
            let mut workspaces = self.store.workspaces.write().await;
            let nodes = workspace_mut(&mut workspaces, &workspace)?;
            let doomed: Vec<NodePath> = nodes
                .range(path.clone()..)
                .take_while(|(p, _)| p.is_at_or_below(&path))
                .map(|(p, _)| p.clone())
                .collect();
            for p in &doomed {
                nodes.remove(p);
            }
            !doomed.is_empty()
        };
        if removed {
            self.publish(&workspace, ChangeKind::Removed, vec![path])
                .await;
        }
        Ok(removed)
    }

    /// Moves a node and its subtree. The event lists the old and the new path.
    pub async fn move_node(&self, from: &str, to: &str) -> Result<()> {
        let from = NodePath::parse(from)?;
        let to = NodePath::parse(to)?;
        if to.is_at_or_below(&from) {
            bail!("cannot move '{from}' below itself");
        }
        let workspace = self.store.default_workspace.clone();

        let _order = self.store.publish_order.lock().await;
        {
            let mut workspaces = self.store.workspaces.write().await;
            let nodes = workspace_mut(&mut workspaces, &workspace)?;
            if !nodes.contains_key(&from) {
                bail!("node '{from}' does not exist");
            }
            if nodes.contains_key(&to) {
                bail!("node '{to}' already exists");
            }
            let moved: Vec<(NodePath, PropertyMap)> = nodes
                .range(from.clone()..)
                .take_while(|(p, _)| p.is_at_or_below(&from))
                .map(|(p, props)| (p.clone(), props.clone()))
                .collect();
            for (old, _) in &moved {
                nodes.remove(old);
            }
            let mut ancestor = to.parent();
            while let Some(current) = ancestor {
                nodes.entry(current.clone()).or_default();
                ancestor = current.parent();
            }
            for (old, props) in moved {
                let mut segments: Vec<String> = to.segments().to_vec();
                segments.extend_from_slice(&old.segments()[from.depth()..]);
                let target = NodePath::parse(&format!("/{}", segments.join("/")))?;
                nodes.insert(target, props);
            }
        }
        self.publish(&workspace, ChangeKind::Moved, vec![from, to])
            .await;
        Ok(())
    }

    /// Properties of the node at `path` in the default workspace.
    pub async fn node(&self, path: &str) -> Option<PropertyMap> {
        let path = NodePath::parse(path).ok()?;
        let workspaces = self.store.workspaces.read().await;
        workspaces
            .get(&self.store.default_workspace)?
            .get(&path)
            .cloned()
    }

    /// Connections handed out and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.store.open_connections.load(Ordering::SeqCst)
    }

    /// Connections created over the connector's lifetime.
    pub fn connections_created(&self) -> usize {
        self.store.connections_created.load(Ordering::SeqCst)
    }

    /// Makes `new_connection` fail, as if the backing store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.store.unavailable.store(unavailable, Ordering::SeqCst);
    }

    async fn publish(&self, workspace: &str, kind: ChangeKind, paths: Vec<NodePath>) {
        let context = self.store.context.read().await.clone();
        let Some(context) = context else {
            return;
        };
        let sequence = self.store.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ChangeEvent::new(context.source_name.clone(), kind, paths, sequence)
            .with_workspace(workspace);
        context.bus.publish(&event).await;
    }
}

fn empty_workspace() -> Workspace {
    let mut nodes = Workspace::new();
    nodes.insert(NodePath::root(), PropertyMap::new());
    nodes
}

fn workspace_mut<'a>(
    workspaces: &'a mut HashMap<String, Workspace>,
    name: &str,
) -> Result<&'a mut Workspace> {
    workspaces
        .get_mut(name)
        .ok_or_else(|| anyhow!("workspace '{name}' does not exist"))
}

#[async_trait]
impl Connector for InMemoryConnector {
    fn type_name(&self) -> &str {
        MEMORY_CONNECTOR_TYPE
    }

    async fn initialize(&self, context: ConnectorContext) -> Result<()> {
        debug!(
            "[{}] In-memory connector initialized for source '{}'",
            context.engine_id, context.source_name
        );
        *self.store.context.write().await = Some(context);
        Ok(())
    }

    async fn new_connection(&self) -> Result<Box<dyn Connection>> {
        let source_name = self
            .store
            .context
            .read()
            .await
            .as_ref()
            .map(|c| c.source_name.clone())
            .unwrap_or_else(|| MEMORY_CONNECTOR_TYPE.to_string());
        if self.store.unavailable.load(Ordering::SeqCst) {
            bail!("in-memory store for '{source_name}' is unavailable");
        }
        self.store.connections_created.fetch_add(1, Ordering::SeqCst);
        self.store.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            store: self.store.clone(),
            source_name,
            closed: false,
        }))
    }
}

struct InMemoryConnection {
    store: Arc<Store>,
    source_name: String,
    closed: bool,
}

#[async_trait]
impl Connection for InMemoryConnection {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    async fn ping(&mut self) -> Result<()> {
        if self.closed {
            bail!("connection to '{}' is closed", self.source_name);
        }
        if self.store.unavailable.load(Ordering::SeqCst) {
            bail!("in-memory store for '{}' is unavailable", self.source_name);
        }
        Ok(())
    }

    async fn read_subgraph(
        &mut self,
        workspace: Option<&str>,
        root: &NodePath,
        depth: usize,
    ) -> Result<Option<Subgraph>> {
        self.ping().await?;
        let workspaces = self.store.workspaces.read().await;
        let name = workspace.unwrap_or(&self.store.default_workspace);
        let nodes = workspaces
            .get(name)
            .ok_or_else(|| anyhow!("workspace '{name}' does not exist in '{}'", self.source_name))?;
        if !nodes.contains_key(root) {
            return Ok(None);
        }

        let mut subgraph = Subgraph::new(root.clone(), depth);
        let within: Vec<(&NodePath, &PropertyMap)> = nodes
            .range(root.clone()..)
            .take_while(|(p, _)| p.is_at_or_below(root))
            .filter(|(p, _)| p.depth() - root.depth() <= depth)
            .collect();
        for (path, properties) in within {
            let children = nodes
                .range(path.clone()..)
                .skip(1)
                .take_while(|(p, _)| p.is_descendant_of(path))
                .filter(|(p, _)| p.depth() == path.depth() + 1)
                .map(|(p, _)| p.clone())
                .collect();
            subgraph.insert(Node {
                path: path.clone(),
                properties: properties.clone(),
                children,
            });
        }
        Ok(Some(subgraph))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.store.open_connections.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChangeBus;
    use crate::test_support::helpers::RecordingObserver;
    use serde_json::json;

    fn path(text: &str) -> NodePath {
        NodePath::parse(text).unwrap()
    }

    #[tokio::test]
    async fn test_read_subgraph_respects_depth() {
        let connector = InMemoryConnector::new();
        connector
            .put_node("/a/b/c", [("title", "deep")])
            .await
            .unwrap();
        connector.put_node("/a/d", [("title", "leaf")]).await.unwrap();

        let mut connection = connector.new_connection().await.unwrap();
        let subgraph = connection
            .read_subgraph(None, &path("/a"), 1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(subgraph.len(), 3);
        let children: Vec<&str> = subgraph.children(&path("/a")).map(|n| n.name()).collect();
        assert_eq!(children, vec!["b", "d"]);
        assert!(subgraph.node(&path("/a/b/c")).is_none());
        assert_eq!(
            subgraph.node(&path("/a/b")).unwrap().children,
            vec![path("/a/b/c")]
        );

        assert!(connection
            .read_subgraph(None, &path("/missing"), 1)
            .await
            .unwrap()
            .is_none());
        connection.close();
        assert_eq!(connector.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_workspaces_are_separate() {
        let connector = InMemoryConnector::new();
        connector.create_workspace("system").await;
        connector
            .put_node_in("system", "/config", [("x", 1)])
            .await
            .unwrap();

        let mut connection = connector.new_connection().await.unwrap();
        assert!(connection
            .read_subgraph(None, &path("/config"), 0)
            .await
            .unwrap()
            .is_none());
        assert!(connection
            .read_subgraph(Some("system"), &path("/config"), 0)
            .await
            .unwrap()
            .is_some());
        assert!(connection
            .read_subgraph(Some("nowhere"), &path("/"), 0)
            .await
            .is_err());
        connection.close();
    }

    #[tokio::test]
    async fn test_mutations_publish_in_order() {
        let bus = Arc::new(ChangeBus::new("test"));
        let observer = Arc::new(RecordingObserver::new("watcher"));
        bus.register(observer.clone()).await;

        let connector = InMemoryConnector::new();
        connector
            .initialize(ConnectorContext::new("test", "content", bus.clone()))
            .await
            .unwrap();

        connector.put_node("/files/a.pdf", [("size", 1)]).await.unwrap();
        connector.set_property("/files/a.pdf", "size", 2).await.unwrap();
        connector.move_node("/files", "/archive").await.unwrap();
        assert!(connector.remove_node("/archive").await.unwrap());
        assert!(!connector.remove_node("/archive").await.unwrap());

        let events = observer.events();
        let kinds: Vec<ChangeKind> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Added,
                ChangeKind::Modified,
                ChangeKind::Moved,
                ChangeKind::Removed
            ]
        );
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence()).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert!(events.iter().all(|e| e.source_name() == "content"));
        assert_eq!(events[2].paths(), &[path("/files"), path("/archive")]);
    }

    #[tokio::test]
    async fn test_move_carries_subtree() {
        let connector = InMemoryConnector::new();
        connector
            .put_node("/in/doc", [("body", json!("text"))])
            .await
            .unwrap();
        connector.move_node("/in", "/out/moved").await.unwrap();

        assert!(connector.node("/in/doc").await.is_none());
        let moved = connector.node("/out/moved/doc").await.unwrap();
        assert_eq!(moved.get("body"), Some(&json!("text")));
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_connections() {
        let connector = InMemoryConnector::new();
        connector.set_unavailable(true);
        assert!(connector.new_connection().await.is_err());
        connector.set_unavailable(false);
        assert!(connector.new_connection().await.is_ok());
        assert_eq!(connector.connections_created(), 1);
    }
}
