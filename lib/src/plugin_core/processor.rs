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

//! Plugin core module for processor abstractions

use anyhow::Result;
use async_trait::async_trait;
use cairn_core::models::{Location, PropertyMap};
use cairn_core::problems::Problems;

use crate::context::ProcessingContext;

/// Content processor invoked by the job dispatcher.
///
/// `process` runs on a dispatcher worker, never on the task that published the
/// change event. Diagnostics about the content go into the returned `Problems`;
/// an `Err` (or a panic) marks the whole job as failed. Either way the failure
/// stays scoped to the job.
///
/// # Example Implementation
///
/// ```ignore
/// #[async_trait]
/// impl Processor for TextExtractor {
///     async fn process(
///         &self,
///         input: &Location,
///         output: &Location,
///         properties: &PropertyMap,
///         context: &ProcessingContext,
///     ) -> anyhow::Result<Problems> {
///         let mut connection = context.federation.get_connection(&input.source_name).await?;
///         let subgraph = connection.read_subgraph(None, &input.path, 0).await?;
///         // ... extract and store under `output` ...
///         Ok(Problems::new())
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(
        &self,
        input: &Location,
        output: &Location,
        properties: &PropertyMap,
        context: &ProcessingContext,
    ) -> Result<Problems>;
}
