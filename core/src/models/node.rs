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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NodePath;

/// Property bag keyed by property name. Multi-valued properties are JSON arrays.
pub type PropertyMap = BTreeMap<String, Value>;

/// A node read from a source: its path, its properties and the paths of its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub path: NodePath,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub children: Vec<NodePath>,
}

impl Node {
    pub fn new(path: NodePath) -> Self {
        Node {
            path,
            properties: PropertyMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Local name of the node; the root node has an empty name.
    pub fn name(&self) -> &str {
        self.path.last_segment().unwrap_or("")
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// First value of the property rendered as a string.
    ///
    /// Returns `None` when the property is absent, null or an empty array.
    pub fn string_value(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::Array(values) => values.iter().find_map(scalar_to_string),
            other => scalar_to_string(other),
        }
    }

    /// Every value of the property rendered as a string, in order.
    pub fn string_values(&self, name: &str) -> Vec<String> {
        match self.properties.get(name) {
            Some(Value::Array(values)) => values.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// The nodes found within a bounded depth below a root path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    root: NodePath,
    depth: usize,
    nodes: BTreeMap<NodePath, Node>,
}

impl Subgraph {
    pub fn new(root: NodePath, depth: usize) -> Self {
        Subgraph {
            root,
            depth,
            nodes: BTreeMap::new(),
        }
    }

    /// Adds a node, ignoring nodes outside the subgraph's bounds.
    pub fn insert(&mut self, node: Node) -> bool {
        let within = node.path.is_at_or_below(&self.root)
            && node.path.depth() - self.root.depth() <= self.depth;
        if within {
            self.nodes.insert(node.path.clone(), node);
        }
        within
    }

    pub fn root_path(&self) -> &NodePath {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.get(&self.root)
    }

    pub fn node(&self, path: &NodePath) -> Option<&Node> {
        self.nodes.get(path)
    }

    /// Children of `path` that were loaded into this subgraph, in child order.
    pub fn children<'a>(&'a self, path: &NodePath) -> impl Iterator<Item = &'a Node> + 'a {
        let children = self
            .nodes
            .get(path)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        children.into_iter().filter_map(move |p| self.nodes.get(&p))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
