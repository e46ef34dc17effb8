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

//! Processing pipeline.
//!
//! ```text
//! ChangeBus ──▶ ProcessingObserver ──▶ RuleMatcher ──▶ Job* ──▶ JobDispatcher ──▶ Processor
//! ```

pub mod dispatcher;
pub mod job;
pub mod matcher;
pub mod observer;
pub mod service;


pub use dispatcher::{DispatcherStats, JobDispatcher};
pub use job::Job;
pub use matcher::{BoundRule, RuleMatcher};
pub use observer::{ProcessingObserver, PROCESSING_OBSERVER};
pub use service::ProcessingService;
