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

//! Configuration reader.
//!
//! Reads the two-level configuration tree below a root path and turns it into
//! typed records:
//!
//! ```text
//! <root>
//! ├── cairn:sources/<name>            → SourceDescriptor
//! ├── cairn:processors/<name>         → ProcessorRule
//! └── cairn:mimeTypeDetectors/<name>  → DetectorRule
//! ```
//!
//! Every issue found is recorded as a [`Problem`]; nothing here fails. A missing
//! container yields no records and no problem. The reader never writes.

use std::collections::HashSet;

use async_trait::async_trait;
use cairn_core::expression::PathExpression;
use cairn_core::models::{Node, NodePath, PropertyMap, Subgraph};
use cairn_core::problems::{Problem, Problems};
use log::debug;

use super::lexicon;
use super::records::{DetectorRule, ProcessorRule, SourceDescriptor};
use crate::error::{CairnError, Result};

/// Read access to a tree of nodes, the only thing the reader needs from a source.
#[async_trait]
pub trait SubgraphReader: Send + Sync {
    async fn read_subgraph(&self, root: &NodePath, depth: usize) -> Result<Option<Subgraph>>;
}

/// Everything one scan produced.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub sources: Vec<SourceDescriptor>,
    pub processors: Vec<ProcessorRule>,
    pub detectors: Vec<DetectorRule>,
    pub problems: Problems,
}

pub struct ConfigurationReader<R> {
    reader: R,
    root: NodePath,
}

impl<R: SubgraphReader> ConfigurationReader<R> {
    pub fn new(reader: R, root: NodePath) -> Self {
        Self { reader, root }
    }

    pub fn root(&self) -> &NodePath {
        &self.root
    }

    /// Reads sources, processor rules and detector rules.
    pub async fn scan(&self) -> ScanResult {
        let mut problems = Problems::new();
        let sources = self.scan_sources(&mut problems).await;
        let processors = self.scan_processors(&mut problems).await;
        let detectors = self.scan_detectors(&mut problems).await;
        debug!(
            "Scanned configuration at '{}': {} source(s), {} processor rule(s), {} detector rule(s), {} problem(s)",
            self.root,
            sources.len(),
            processors.len(),
            detectors.len(),
            problems.len()
        );
        ScanResult {
            sources,
            processors,
            detectors,
            problems,
        }
    }

    pub async fn scan_sources(&self, problems: &mut Problems) -> Vec<SourceDescriptor> {
        match self.read_container(lexicon::SOURCES, problems).await {
            Some(subgraph) => parse_sources(&subgraph, problems),
            None => Vec::new(),
        }
    }

    pub async fn scan_processors(&self, problems: &mut Problems) -> Vec<ProcessorRule> {
        match self.read_container(lexicon::PROCESSORS, problems).await {
            Some(subgraph) => parse_processor_rules(&subgraph, problems),
            None => Vec::new(),
        }
    }

    pub async fn scan_detectors(&self, problems: &mut Problems) -> Vec<DetectorRule> {
        match self
            .read_container(lexicon::MIME_TYPE_DETECTORS, problems)
            .await
        {
            Some(subgraph) => parse_detector_rules(&subgraph, problems),
            None => Vec::new(),
        }
    }

    /// Like [`ConfigurationReader::scan_sources`], but a failure to read the
    /// container is returned instead of recorded, so callers can tell an empty
    /// configuration from an unreadable one.
    pub async fn try_scan_sources(&self, problems: &mut Problems) -> Result<Vec<SourceDescriptor>> {
        let path = self.container_path(lexicon::SOURCES)?;
        Ok(match self.reader.read_subgraph(&path, 1).await? {
            Some(subgraph) => parse_sources(&subgraph, problems),
            None => Vec::new(),
        })
    }

    fn container_path(&self, container: &str) -> Result<NodePath> {
        self.root.child(container).map_err(|e| {
            CairnError::invalid_config(format!("Invalid configuration container '{container}': {e}"))
        })
    }

    async fn read_container(&self, container: &str, problems: &mut Problems) -> Option<Subgraph> {
        let read = match self.container_path(container) {
            Ok(path) => self.reader.read_subgraph(&path, 1).await,
            Err(e) => Err(e),
        };
        match read {
            Ok(subgraph) => subgraph,
            Err(e) => {
                problems.push(
                    Problem::error("Unable to read configuration container '{}' below '{}'")
                        .with_parameter(container)
                        .with_parameter(&self.root)
                        .with_resource(container)
                        .with_cause(e),
                );
                None
            }
        }
    }
}

/// Well-known and bag properties shared by every configuration node.
struct Common {
    name: String,
    description: Option<String>,
    classname: Option<String>,
    classpath: Vec<String>,
    properties: PropertyMap,
}

fn read_common(node: &Node) -> Common {
    let name = node
        .string_value(lexicon::READABLE_NAME)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| node.name().to_string());
    Common {
        name,
        description: node.string_value(lexicon::DESCRIPTION),
        classname: node
            .string_value(lexicon::CLASSNAME)
            .filter(|c| !c.trim().is_empty()),
        classpath: node.string_values(lexicon::CLASSPATH),
        properties: property_bag(node),
    }
}

/// Every non-reserved property, keyed by its local name.
fn property_bag(node: &Node) -> PropertyMap {
    node.properties
        .iter()
        .filter(|(name, _)| !lexicon::is_reserved(name))
        .map(|(name, value)| (lexicon::split_name(name).1.to_string(), value.clone()))
        .collect()
}

fn warn_on_duplicate(seen: &mut HashSet<String>, kind: &str, name: &str, problems: &mut Problems) {
    if !seen.insert(name.to_string()) {
        problems.push(
            Problem::warning("Duplicate {} name '{}'; both definitions are kept")
                .with_parameter(kind)
                .with_parameter(name)
                .with_resource(name),
        );
    }
}

pub fn parse_sources(container: &Subgraph, problems: &mut Problems) -> Vec<SourceDescriptor> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for node in container.children(container.root_path()) {
        let common = read_common(node);
        warn_on_duplicate(&mut seen, "source", &common.name, problems);
        let Some(connector_type) = node
            .string_value(lexicon::CONNECTOR_TYPE)
            .filter(|t| !t.trim().is_empty())
        else {
            problems.push(
                Problem::error("Source '{}' does not name a connector type ({})")
                    .with_parameter(&common.name)
                    .with_parameter(lexicon::CONNECTOR_TYPE)
                    .with_resource(&common.name),
            );
            continue;
        };
        sources.push(SourceDescriptor {
            name: common.name,
            connector_type,
            classpath: common.classpath,
            properties: common.properties,
        });
    }
    sources
}

pub fn parse_processor_rules(container: &Subgraph, problems: &mut Problems) -> Vec<ProcessorRule> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for node in container.children(container.root_path()) {
        let common = read_common(node);
        warn_on_duplicate(&mut seen, "processor rule", &common.name, problems);

        let classname = common.classname.unwrap_or_default();
        if classname.is_empty() {
            problems.push(
                Problem::error("Processor rule '{}' does not name an implementation ({})")
                    .with_parameter(&common.name)
                    .with_parameter(lexicon::CLASSNAME)
                    .with_resource(&common.name),
            );
        }

        let written = node.string_values(lexicon::PATH_EXPRESSION);
        if written.is_empty() {
            problems.push(
                Problem::warning("Processor rule '{}' has no path expressions and will never match")
                    .with_parameter(&common.name)
                    .with_resource(&common.name),
            );
        }
        let mut expressions = Vec::with_capacity(written.len());
        for text in &written {
            match PathExpression::compile(text) {
                Ok(expression) => expressions.push(expression),
                Err(e) => problems.push(
                    Problem::error("Processor rule '{}' has an invalid path expression '{}'")
                        .with_parameter(&common.name)
                        .with_parameter(text)
                        .with_resource(&common.name)
                        .with_cause(e),
                ),
            }
        }

        rules.push(ProcessorRule {
            name: common.name,
            description: common.description,
            expressions,
            output_template: node
                .string_value(lexicon::OUTPUT_PATH)
                .filter(|o| !o.trim().is_empty()),
            classname,
            classpath: common.classpath,
            properties: common.properties,
        });
    }
    rules
}

pub fn parse_detector_rules(container: &Subgraph, problems: &mut Problems) -> Vec<DetectorRule> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for node in container.children(container.root_path()) {
        let common = read_common(node);
        warn_on_duplicate(&mut seen, "detector", &common.name, problems);
        let Some(classname) = common.classname else {
            problems.push(
                Problem::error("Detector '{}' does not name an implementation ({})")
                    .with_parameter(&common.name)
                    .with_parameter(lexicon::CLASSNAME)
                    .with_resource(&common.name),
            );
            continue;
        };
        rules.push(DetectorRule {
            name: common.name,
            description: common.description,
            classname,
            classpath: common.classpath,
            properties: common.properties,
        });
    }
    rules
}
