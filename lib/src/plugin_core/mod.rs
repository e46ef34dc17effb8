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

//! Plugin Core Module
//!
//! This module provides the capability traits that plugins implement and the
//! registries that create them from configuration.
//!
//! # Architecture
//!
//! - **Connectors**: Implement [`Connector`] (and [`Connection`]) to expose a backing store as a source
//! - **Processors**: Implement [`Processor`] to act on content matched by a processor rule
//! - **Detectors**: Implement [`Detector`] to classify content by MIME type
//!
//! Configuration names a plugin by a string key (`cairn:connectorType` for
//! sources, `cairn:classname` for rules); the matching registry maps that key to
//! a factory closure.

pub mod connector;
pub mod detector;
pub mod processor;
pub mod registry;

pub use connector::{Connection, Connector};
pub use detector::Detector;
pub use processor::Processor;
pub use registry::{
    ConnectorFactory, ConnectorRegistry, DetectorFactory, DetectorRegistry, ProcessorFactory,
    ProcessorRegistry,
};
