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

//! Example: turning uploaded PDFs into derived documents
//!
//! This example shows how to:
//! - Seed a configuration tree with a source and a processor rule
//! - Register a processor implementation with the builder
//! - Watch a content change become a job
//! - Shut down with the job drained
//!
//! Run with `RUST_LOG=debug cargo run --example pdf_pipeline` to see the engine's logs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cairn_core::models::{Location, PropertyMap};
use cairn_core::problems::Problems;
use cairn_lib::{Connector, Engine, InMemoryConnector, ProcessingContext, Processor};
use serde_json::json;

/// Reads the input node and reports what it would extract.
struct TextExtractor;

#[async_trait]
impl Processor for TextExtractor {
    async fn process(
        &self,
        input: &Location,
        output: &Location,
        properties: &PropertyMap,
        context: &ProcessingContext,
    ) -> Result<Problems> {
        let mut connection = context.federation().get_connection(&input.source_name).await?;
        let subgraph = connection.read_subgraph(None, &input.path, 0).await?;
        let size = subgraph
            .as_ref()
            .and_then(|s| s.root())
            .and_then(|node| node.property("size"))
            .cloned()
            .unwrap_or(json!(0));
        println!(
            "  [{}] {} ({} bytes) -> {} with {:?}",
            context.rule_name, input, size, output, properties
        );
        Ok(Problems::new())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== PDF Pipeline Example ===\n");

    let configuration = InMemoryConnector::new();
    configuration
        .put_node(
            "/config/cairn:sources/assets",
            [("cairn:connectorType", json!("uploads"))],
        )
        .await?;
    configuration
        .put_node(
            "/config/cairn:processors/pdf-to-text",
            [
                ("cairn:classname", json!("text-extractor")),
                ("cairn:pathExpression", json!(["/files/*.pdf"])),
                ("cairn:outputPath", json!("/derived/{1}")),
                ("language", json!("en")),
            ],
        )
        .await?;

    let uploads = InMemoryConnector::new();
    let engine = Engine::builder()
        .with_id("pdf-pipeline")
        .with_configuration_source(configuration)
        .with_configuration_path("/config")
        .with_pool_size(2)
        .with_connector_factory("uploads", {
            let uploads = uploads.clone();
            move |_descriptor| Ok(Arc::new(uploads.clone()) as Arc<dyn Connector>)
        })
        .with_processor_factory("text-extractor", |_rule| {
            Ok(Arc::new(TextExtractor) as Arc<dyn Processor>)
        })
        .build()
        .await?;

    for problem in engine.problems().iter() {
        println!("Configuration problem: {problem}");
    }
    engine.start().await?;
    println!("Engine '{}' is {}", engine.id(), engine.state());

    println!("\nUploading files:");
    uploads.put_node("/files/report.pdf", [("size", 48_213)]).await?;
    uploads.put_node("/files/notes.txt", [("size", 120)]).await?;
    uploads.put_node("/files/summary.pdf", [("size", 9_870)]).await?;

    let detector = engine.mime_type_detector()?;
    println!(
        "\nDetected type of report.pdf: {:?}",
        detector.mime_type_of(Some("report.pdf"), b"%PDF-1.7")
    );

    engine.shutdown().await;
    let drained = engine.await_termination(Duration::from_secs(10)).await;
    println!("\nShutdown complete (drained: {drained})");
    println!("Dispatcher stats: {:?}", engine.dispatcher_stats());

    Ok(())
}
