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

//! The repository service: the federation together with where its configuration lives.

use std::sync::Arc;

use cairn_core::models::NodePath;
use cairn_core::problems::Problems;

use crate::error::Result;
use crate::federation::{Federation, Graph};

/// Access to every source of an engine and to the engine's configuration tree.
#[derive(Clone)]
pub struct RepositoryService {
    federation: Arc<Federation>,
    configuration_root: NodePath,
    workspace: Option<String>,
}

impl RepositoryService {
    pub fn new(
        federation: Arc<Federation>,
        configuration_root: NodePath,
        workspace: Option<String>,
    ) -> Self {
        Self {
            federation,
            configuration_root,
            workspace,
        }
    }

    /// The connection factory for every registered source.
    pub fn federation(&self) -> &Arc<Federation> {
        &self.federation
    }

    pub fn configuration_source(&self) -> &str {
        self.federation.configuration_source()
    }

    pub fn configuration_root(&self) -> &NodePath {
        &self.configuration_root
    }

    pub fn configuration_workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    /// A graph over the named source. The configuration source is pinned to the
    /// configured workspace, if any.
    pub async fn graph(&self, source_name: &str) -> Result<Graph> {
        let graph = self.federation.graph(source_name).await?;
        match &self.workspace {
            Some(workspace) if source_name == self.configuration_source() => {
                Ok(graph.in_workspace(workspace.clone()))
            }
            _ => Ok(graph),
        }
    }

    pub async fn configuration_graph(&self) -> Result<Graph> {
        self.graph(self.configuration_source()).await
    }

    /// Re-reads the source descriptors below the configuration root and applies them.
    pub async fn reload_sources(&self) -> Problems {
        self.federation
            .reload_sources(&self.configuration_root, self.workspace.clone())
            .await
    }
}

impl std::fmt::Debug for RepositoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryService")
            .field("configuration_source", &self.configuration_source())
            .field("configuration_root", &self.configuration_root)
            .field("workspace", &self.workspace)
            .finish()
    }
}
