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

//! Read-only graph view over one source.

use std::sync::Arc;

use async_trait::async_trait;
use cairn_core::models::{Node, NodePath, Subgraph};

use super::Federation;
use crate::config::SubgraphReader;
use crate::error::{CairnError, Result};

/// A view over one named source, optionally pinned to a workspace.
///
/// The view holds no connection: each read borrows one from the federation and
/// returns it when the read completes.
#[derive(Clone)]
pub struct Graph {
    federation: Arc<Federation>,
    source_name: String,
    workspace: Option<String>,
}

impl Graph {
    pub(crate) fn new(
        federation: Arc<Federation>,
        source_name: impl Into<String>,
        workspace: Option<String>,
    ) -> Self {
        Self {
            federation,
            source_name: source_name.into(),
            workspace,
        }
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    /// The same source, pinned to `workspace`.
    pub fn in_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub async fn subgraph(&self, root: &NodePath, depth: usize) -> Result<Option<Subgraph>> {
        let mut connection = self.federation.get_connection(&self.source_name).await?;
        connection
            .read_subgraph(self.workspace.as_deref(), root, depth)
            .await
            .map_err(|e| CairnError::connection(self.source_name.clone(), e))
    }

    pub async fn node(&self, path: &NodePath) -> Result<Option<Node>> {
        let subgraph = self.subgraph(path, 0).await?;
        Ok(subgraph.and_then(|s| s.root().cloned()))
    }

    /// The direct children of `path`, in child order. Empty when `path` is absent.
    pub async fn children(&self, path: &NodePath) -> Result<Vec<Node>> {
        let Some(subgraph) = self.subgraph(path, 1).await? else {
            return Ok(Vec::new());
        };
        Ok(subgraph.children(path).cloned().collect())
    }
}

#[async_trait]
impl SubgraphReader for Graph {
    async fn read_subgraph(&self, root: &NodePath, depth: usize) -> Result<Option<Subgraph>> {
        self.subgraph(root, depth).await
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("source_name", &self.source_name)
            .field("workspace", &self.workspace)
            .finish()
    }
}
