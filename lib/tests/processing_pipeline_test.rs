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

//! Processing pipeline integration tests
//!
//! Content changes published by a source travel over the change bus to the rule
//! matcher and end up as jobs on the dispatcher.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use cairn_core::models::{ChangeEvent, NodePath};
use cairn_lib::{ChangeObserver, Engine, Processor};
use common::{wait_for_condition, Fixture, RecordingProcessor, CONFIG_ROOT};
use serde_json::json;

async fn running_engine(fixture: &Fixture, recorder: Arc<RecordingProcessor>) -> Engine {
    let processor: Arc<dyn Processor> = recorder;
    let engine = Engine::builder()
        .with_id("pipeline-test")
        .with_configuration_source(fixture.configuration.clone())
        .with_configuration_path(CONFIG_ROOT)
        .with_pool_size(2)
        .with_connector_factory(common::SHARED_CONNECTOR_TYPE, fixture.connector_factory())
        .with_processor_factory("recorder", move |_rule| Ok(processor.clone()))
        .build()
        .await
        .unwrap();
    assert!(!engine.problems().has_errors(), "{:?}", engine.problems());
    engine.start().await.unwrap();
    engine
}

struct BrokenObserver;

#[async_trait]
impl ChangeObserver for BrokenObserver {
    fn name(&self) -> &str {
        "broken"
    }

    async fn notify(&self, _event: &ChangeEvent) -> anyhow::Result<()> {
        bail!("observer is broken")
    }
}

#[tokio::test]
async fn test_pdf_change_produces_one_job() {
    let fixture = Fixture::new();
    fixture.add_source("assets").await;
    fixture
        .add_rule(
            "pdf-to-text",
            "recorder",
            &["/files/*.pdf"],
            Some("/derived/{1}"),
            vec![("quality", json!("high"))],
        )
        .await;
    let recorder = Arc::new(RecordingProcessor::default());
    let engine = running_engine(&fixture, recorder.clone()).await;

    let assets = fixture.store("assets");
    assets
        .put_node("/files/report.pdf", [("size", 42)])
        .await
        .unwrap();
    assets.put_node("/files/notes.txt", [("size", 3)]).await.unwrap();

    wait_for_condition(|| engine.dispatcher_stats().completed == 1, Duration::from_secs(5))
        .await
        .unwrap();
    let invocations = recorder.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].input.source_name, "assets");
    assert_eq!(invocations[0].input.path.to_string(), "/files/report.pdf");
    assert_eq!(invocations[0].output.source_name, "assets");
    assert_eq!(invocations[0].output.path.to_string(), "/derived/report");
    assert_eq!(invocations[0].properties.get("quality"), Some(&json!("high")));
    assert_eq!(engine.dispatcher_stats().submitted, 1);

    engine.shutdown().await;
    assert!(engine.await_termination(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_rules_sharing_a_name_both_fire() {
    let fixture = Fixture::new();
    fixture.add_source("assets").await;
    for (node, output) in [("text", "/text/{1}"), ("thumbs", "/thumbs/{1}")] {
        fixture
            .add_rule(
                node,
                "recorder",
                &["/files/*.pdf"],
                Some(output),
                vec![("cairn:readableName", json!("extract"))],
            )
            .await;
    }
    let recorder = Arc::new(RecordingProcessor::default());
    let engine = running_engine(&fixture, recorder.clone()).await;
    assert!(engine.problems().has_warnings());

    fixture
        .store("assets")
        .put_node("/files/report.pdf", [("size", 42)])
        .await
        .unwrap();

    wait_for_condition(|| engine.dispatcher_stats().completed == 2, Duration::from_secs(5))
        .await
        .unwrap();
    let mut outputs: Vec<String> = recorder
        .invocations()
        .iter()
        .map(|invocation| invocation.output.path.to_string())
        .collect();
    outputs.sort();
    assert_eq!(outputs, vec!["/text/report", "/thumbs/report"]);

    engine.shutdown().await;
    assert!(engine.await_termination(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_moves_produce_jobs_and_removals_do_not() {
    let fixture = Fixture::new();
    fixture.add_source("assets").await;
    fixture
        .add_rule("all-files", "recorder", &["/inbox/(*)"], Some("/archive/{1}"), Vec::new())
        .await;
    let recorder = Arc::new(RecordingProcessor::default());
    let engine = running_engine(&fixture, recorder.clone()).await;

    let assets = fixture.store("assets");
    assets.put_node("/staging/a", [("size", 1)]).await.unwrap();
    assets.move_node("/staging/a", "/inbox/a").await.unwrap();
    assets.remove_node("/inbox/a").await.unwrap();

    wait_for_condition(|| recorder.count() == 1, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(recorder.invocations()[0].output.path.to_string(), "/archive/a");
    assert_eq!(engine.dispatcher_stats().submitted, 1);

    engine.shutdown().await;
    assert!(engine.await_termination(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_failing_observer_does_not_stop_processing() {
    let fixture = Fixture::new();
    fixture.add_source("assets").await;
    fixture
        .add_rule("pdf", "recorder", &["/files/*.pdf"], None, Vec::new())
        .await;
    let recorder = Arc::new(RecordingProcessor::default());
    let engine = running_engine(&fixture, recorder.clone()).await;

    let bus = engine.change_bus();
    bus.register(Arc::new(BrokenObserver)).await;

    fixture
        .store("assets")
        .put_node("/files/a.pdf", [("size", 1)])
        .await
        .unwrap();

    wait_for_condition(|| recorder.count() == 1, Duration::from_secs(5))
        .await
        .unwrap();
    let problems = bus.problems();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems.iter().next().unwrap().resource.as_deref(), Some("broken"));

    engine.shutdown().await;
    assert!(engine.await_termination(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_unknown_source_is_reported() {
    let fixture = Fixture::new();
    let engine = running_engine(&fixture, Arc::new(RecordingProcessor::default())).await;

    match engine.get_connection("nowhere").await {
        Err(cairn_lib::CairnError::UnknownSource { name }) => assert_eq!(name, "nowhere"),
        other => panic!("expected UnknownSource, got {other:?}"),
    }
    assert!(engine.graph("nowhere").await.is_err());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_sources_follow_the_configuration_tree() {
    let fixture = Fixture::new();
    let engine = running_engine(&fixture, Arc::new(RecordingProcessor::default())).await;
    assert!(engine.get_connection("late").await.is_err());

    fixture.add_source("late").await;
    fixture
        .store("late")
        .put_node("/docs/readme", [("title", "hello")])
        .await
        .unwrap();

    let graph = engine.graph("late").await.unwrap();
    let node = graph
        .node(&NodePath::parse("/docs/readme").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(node.string_value("title").as_deref(), Some("hello"));

    fixture.remove_source("late").await;
    assert!(matches!(
        engine.get_connection("late").await,
        Err(cairn_lib::CairnError::UnknownSource { .. })
    ));

    engine.shutdown().await;
    assert!(engine.await_termination(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_configuration_workspace_is_pinned() {
    let fixture = Fixture::new();
    fixture.configuration.create_workspace("staging").await;
    fixture
        .configuration
        .put_node_in(
            "staging",
            &format!("{CONFIG_ROOT}/cairn:sources/staged"),
            [("cairn:connectorType", json!(common::SHARED_CONNECTOR_TYPE))],
        )
        .await
        .unwrap();
    fixture.add_source("unstaged").await;

    let engine = Engine::builder()
        .with_configuration_source(fixture.configuration.clone())
        .with_configuration_path(CONFIG_ROOT)
        .with_workspace("staging")
        .with_connector_factory(common::SHARED_CONNECTOR_TYPE, fixture.connector_factory())
        .build()
        .await
        .unwrap();
    engine.start().await.unwrap();

    let graph = engine.configuration_graph().await.unwrap();
    assert_eq!(graph.workspace(), Some("staging"));
    assert!(engine.get_connection("staged").await.is_ok());
    assert!(engine.get_connection("unstaged").await.is_err());

    // Edits to the default workspace do not reach the pinned engine.
    fixture.add_source("also-unstaged").await;
    assert!(engine.get_connection("also-unstaged").await.is_err());

    engine.shutdown().await;
    assert!(engine.await_termination(Duration::from_secs(5)).await);
}
