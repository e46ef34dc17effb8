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

//! Plugin core module for MIME type detector abstractions

use anyhow::Result;

/// Classifies content by name and/or leading bytes.
///
/// Detectors are queried synchronously by callers that need a MIME type, so
/// they must not block for long.
pub trait Detector: Send + Sync {
    /// Returns the MIME type, or `None` when this detector cannot tell.
    fn detect(&self, name: Option<&str>, content: &[u8]) -> Result<Option<String>>;
}
