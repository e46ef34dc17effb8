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

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::NodePath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
    Moved,
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
            ChangeKind::Moved => "moved",
        };
        write!(f, "{label}")
    }
}

/// Notification that paths under one source changed.
///
/// Events are immutable once published. `sequence` is assigned by the publishing
/// source and increases monotonically per source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workspace: Option<String>,
    paths: Vec<NodePath>,
    kind: ChangeKind,
    sequence: u64,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChangeEvent {
    pub fn new(
        source_name: impl Into<String>,
        kind: ChangeKind,
        paths: Vec<NodePath>,
        sequence: u64,
    ) -> Self {
        ChangeEvent {
            source_name: source_name.into(),
            workspace: None,
            paths,
            kind,
            sequence,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Tags the event with the workspace it happened in.
    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn workspace(&self) -> Option<&str> {
        self.workspace.as_deref()
    }

    pub fn paths(&self) -> &[NodePath] {
        &self.paths
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn timestamp(&self) -> chrono::DateTime<chrono::Utc> {
        self.timestamp
    }

    /// True if any affected path is at or below `path`, or is an ancestor of it.
    pub fn touches(&self, path: &NodePath) -> bool {
        self.paths
            .iter()
            .any(|p| p.is_at_or_below(path) || path.is_descendant_of(p))
    }
}

impl Display for ChangeEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let paths: Vec<String> = self.paths.iter().map(NodePath::to_string).collect();
        write!(
            f,
            "{}#{} {} [{}]",
            self.source_name,
            self.sequence,
            self.kind,
            paths.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touches_descendants_and_ancestors() {
        let event = ChangeEvent::new(
            "config",
            ChangeKind::Modified,
            vec![NodePath::parse("/cairn:sources/db").unwrap()],
            7,
        );
        assert!(event.touches(&NodePath::parse("/cairn:sources").unwrap()));
        assert!(event.touches(&NodePath::parse("/cairn:sources/db/x").unwrap()));
        assert!(!event.touches(&NodePath::parse("/cairn:processors").unwrap()));
        assert_eq!(event.to_string(), "config#7 modified [/cairn:sources/db]");
    }
}
