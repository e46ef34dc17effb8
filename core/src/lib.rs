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

//! Content model shared by the Cairn engine.
//!
//! This crate holds the value types that flow between the engine's
//! subsystems: hierarchical [`models::NodePath`]s, [`models::Subgraph`]s read
//! from sources, [`models::ChangeEvent`]s, compiled
//! [`expression::PathExpression`]s and [`problems::Problems`].

pub mod expression;
pub mod models;
pub mod problems;
