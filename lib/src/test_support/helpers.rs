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

//! Observers, processors and configuration fixtures shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use cairn_core::models::{ChangeEvent, Location, PropertyMap};
use cairn_core::problems::{Problem, Problems};
use serde_json::{json, Value};

use crate::channels::ChangeObserver;
use crate::config::lexicon;
use crate::connectors::InMemoryConnector;
use crate::context::ProcessingContext;
use crate::plugin_core::Processor;

pub type Journal = Arc<Mutex<Vec<(String, u64)>>>;

/// Records every event it sees, optionally into a journal shared with other observers.
pub struct RecordingObserver {
    name: String,
    journal: Journal,
    events: Mutex<Vec<ChangeEvent>>,
}

impl RecordingObserver {
    pub fn new(name: &str) -> Self {
        Self::with_journal(name, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_journal(name: &str, journal: Journal) -> Self {
        Self {
            name: name.to_string(),
            journal,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.events().iter().map(|e| e.sequence()).collect()
    }
}

#[async_trait]
impl ChangeObserver for RecordingObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push((self.name.clone(), event.sequence()));
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FailingObserver {
    name: String,
}

impl FailingObserver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ChangeObserver for FailingObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, event: &ChangeEvent) -> Result<()> {
        bail!("refusing {event}")
    }
}

pub struct PanickingObserver {
    name: String,
}

impl PanickingObserver {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ChangeObserver for PanickingObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, _event: &ChangeEvent) -> Result<()> {
        panic!("observer '{}' blew up", self.name)
    }
}

/// One recorded processor invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub input: Location,
    pub output: Location,
    pub properties: PropertyMap,
    pub rule_name: String,
}

/// Succeeds and remembers what it was asked to do.
#[derive(Default)]
pub struct RecordingProcessor {
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

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
        context: &ProcessingContext,
    ) -> Result<Problems> {
        self.invocations.lock().unwrap().push(Invocation {
            input: input.clone(),
            output: output.clone(),
            properties: properties.clone(),
            rule_name: context.rule_name.clone(),
        });
        Ok(Problems::new())
    }
}

pub struct FailingProcessor;

#[async_trait]
impl Processor for FailingProcessor {
    async fn process(
        &self,
        input: &Location,
        _output: &Location,
        _properties: &PropertyMap,
        _context: &ProcessingContext,
    ) -> Result<Problems> {
        bail!("cannot process {input}")
    }
}

pub struct PanickingProcessor;

#[async_trait]
impl Processor for PanickingProcessor {
    async fn process(
        &self,
        input: &Location,
        _output: &Location,
        _properties: &PropertyMap,
        _context: &ProcessingContext,
    ) -> Result<Problems> {
        panic!("processor blew up on {input}")
    }
}

/// Finishes normally but reports an error problem about the content.
pub struct ComplainingProcessor;

#[async_trait]
impl Processor for ComplainingProcessor {
    async fn process(
        &self,
        input: &Location,
        _output: &Location,
        _properties: &PropertyMap,
        _context: &ProcessingContext,
    ) -> Result<Problems> {
        let mut problems = Problems::new();
        problems.push(Problem::warning("{} is large").with_parameter(input));
        problems.push(Problem::error("{} is not a valid document").with_parameter(input));
        Ok(problems)
    }
}

/// Holds a connection to its input's source for `delay` and tracks concurrency.
pub struct SlowProcessor {
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    finished: AtomicUsize,
}

impl SlowProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Processor for SlowProcessor {
    async fn process(
        &self,
        input: &Location,
        _output: &Location,
        _properties: &PropertyMap,
        context: &ProcessingContext,
    ) -> Result<Problems> {
        let mut connection = context
            .federation
            .get_connection(&input.source_name)
            .await?;
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let read = connection.read_subgraph(None, &input.path, 0).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        read?;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(Problems::new())
    }
}

/// Writes configuration nodes below `root` in a connector's default workspace.
pub struct ConfigTree<'a> {
    connector: &'a InMemoryConnector,
    root: String,
}

impl<'a> ConfigTree<'a> {
    pub fn new(connector: &'a InMemoryConnector, root: &str) -> Self {
        Self {
            connector,
            root: root.trim_end_matches('/').to_string(),
        }
    }

    fn path(&self, container: &str, name: &str) -> String {
        format!("{}/{container}/{name}", self.root)
    }

    pub async fn source(&self, name: &str, connector_type: &str) {
        self.source_with(name, connector_type, Vec::new()).await;
    }

    pub async fn source_with(&self, name: &str, connector_type: &str, extra: Vec<(&str, Value)>) {
        let mut properties = vec![(lexicon::CONNECTOR_TYPE, json!(connector_type))];
        properties.extend(extra);
        self.connector
            .put_node(&self.path(lexicon::SOURCES, name), properties)
            .await
            .unwrap();
    }

    pub async fn processor(
        &self,
        name: &str,
        classname: &str,
        expressions: &[&str],
        output: Option<&str>,
    ) {
        self.processor_with(name, classname, expressions, output, Vec::new())
            .await;
    }

    pub async fn processor_with(
        &self,
        name: &str,
        classname: &str,
        expressions: &[&str],
        output: Option<&str>,
        extra: Vec<(&str, Value)>,
    ) {
        let mut properties = vec![
            (lexicon::CLASSNAME, json!(classname)),
            (lexicon::PATH_EXPRESSION, json!(expressions)),
        ];
        if let Some(output) = output {
            properties.push((lexicon::OUTPUT_PATH, json!(output)));
        }
        properties.extend(extra);
        self.connector
            .put_node(&self.path(lexicon::PROCESSORS, name), properties)
            .await
            .unwrap();
    }

    pub async fn detector(&self, name: &str, classname: &str) {
        self.connector
            .put_node(
                &self.path(lexicon::MIME_TYPE_DETECTORS, name),
                [(lexicon::CLASSNAME, json!(classname))],
            )
            .await
            .unwrap();
    }

    pub async fn remove_source(&self, name: &str) {
        self.connector
            .remove_node(&self.path(lexicon::SOURCES, name))
            .await
            .unwrap();
    }
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
