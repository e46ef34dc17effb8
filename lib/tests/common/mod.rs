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

//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cairn_core::models::{Location, PropertyMap};
use cairn_core::problems::Problems;
use cairn_lib::{Connector, InMemoryConnector, Processor, ProcessingContext};
use serde_json::{json, Value};

pub const CONFIG_ROOT: &str = "/config";

/// Connector type whose factory hands out the fixture's shared stores.
pub const SHARED_CONNECTOR_TYPE: &str = "shared-memory";

/// One processor invocation as seen by [`RecordingProcessor`].
#[derive(Debug, Clone)]
pub struct Invocation {
    pub input: Location,
    pub output: Location,
    pub properties: PropertyMap,
}

#[derive(Default)]
pub struct RecordingProcessor {
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingProcessor {
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl Processor for RecordingProcessor {
    async fn process(
        &self,
        input: &Location,
        output: &Location,
        properties: &PropertyMap,
        _context: &ProcessingContext,
    ) -> Result<Problems> {
        self.invocations.lock().unwrap().push(Invocation {
            input: input.clone(),
            output: output.clone(),
            properties: properties.clone(),
        });
        Ok(Problems::new())
    }
}

/// Holds a connection to its input's source while it sleeps, then reads through it.
pub struct SlowReader {
    delay: Duration,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl SlowReader {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Processor for SlowReader {
    async fn process(
        &self,
        input: &Location,
        _output: &Location,
        _properties: &PropertyMap,
        context: &ProcessingContext,
    ) -> Result<Problems> {
        let mut connection = context
            .federation()
            .get_connection(&input.source_name)
            .await?;
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        connection.ping().await?;
        connection.read_subgraph(None, &input.path, 0).await?;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(Problems::new())
    }
}

/// Configuration store plus the content stores its sources resolve to.
pub struct Fixture {
    pub configuration: InMemoryConnector,
    stores: Arc<Mutex<Vec<(String, InMemoryConnector)>>>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            configuration: InMemoryConnector::new(),
            stores: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The store backing the source named `name`, created on first use.
    pub fn store(&self, name: &str) -> InMemoryConnector {
        store_for(&self.stores, name)
    }

    /// A factory for [`SHARED_CONNECTOR_TYPE`] that resolves sources by name.
    pub fn connector_factory(
        &self,
    ) -> impl Fn(&cairn_lib::SourceDescriptor) -> Result<Arc<dyn Connector>> + Send + Sync + 'static
    {
        let stores = self.stores.clone();
        move |descriptor| Ok(Arc::new(store_for(&stores, &descriptor.name)) as Arc<dyn Connector>)
    }

    pub async fn add_source(&self, name: &str) {
        self.configuration
            .put_node(
                &format!("{CONFIG_ROOT}/cairn:sources/{name}"),
                [("cairn:connectorType", json!(SHARED_CONNECTOR_TYPE))],
            )
            .await
            .unwrap();
    }

    pub async fn remove_source(&self, name: &str) {
        self.configuration
            .remove_node(&format!("{CONFIG_ROOT}/cairn:sources/{name}"))
            .await
            .unwrap();
    }

    pub async fn add_rule(
        &self,
        name: &str,
        classname: &str,
        expressions: &[&str],
        output: Option<&str>,
        extra: Vec<(&str, Value)>,
    ) {
        let mut properties = vec![
            ("cairn:classname", json!(classname)),
            ("cairn:pathExpression", json!(expressions)),
        ];
        if let Some(output) = output {
            properties.push(("cairn:outputPath", json!(output)));
        }
        properties.extend(extra);
        self.configuration
            .put_node(&format!("{CONFIG_ROOT}/cairn:processors/{name}"), properties)
            .await
            .unwrap();
    }
}

fn store_for(stores: &Mutex<Vec<(String, InMemoryConnector)>>, name: &str) -> InMemoryConnector {
    let mut stores = stores.lock().unwrap();
    if let Some((_, store)) = stores.iter().find(|(n, _)| n == name) {
        return store.clone();
    }
    let store = InMemoryConnector::new();
    stores.push((name.to_string(), store.clone()));
    store
}

/// Polls `condition` every 10ms until it holds or `max_duration` passes.
pub async fn wait_for_condition<F>(mut condition: F, max_duration: Duration) -> Result<(), String>
where
    F: FnMut() -> bool,
{
    let start = tokio::time::Instant::now();
    while !condition() {
        if start.elapsed() > max_duration {
            return Err("Condition not met within timeout".to_string());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
