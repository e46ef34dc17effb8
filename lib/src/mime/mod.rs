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

//! MIME type detection.
//!
//! Detectors configured under `cairn:mimeTypeDetectors` are consulted in
//! configuration order; the built-in [`ExtensionDetector`] is always consulted
//! last. The first detector that answers wins.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use log::warn;

use crate::plugin_core::Detector;

/// Name under which the built-in extension detector appears in the chain.
pub const EXTENSION_DETECTOR: &str = "extension";

/// Classifies content by the extension of its name.
pub struct ExtensionDetector {
    types: HashMap<&'static str, &'static str>,
}

impl Default for ExtensionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionDetector {
    pub fn new() -> Self {
        let types = [
            ("pdf", "application/pdf"),
            ("txt", "text/plain"),
            ("text", "text/plain"),
            ("md", "text/markdown"),
            ("csv", "text/csv"),
            ("htm", "text/html"),
            ("html", "text/html"),
            ("css", "text/css"),
            ("js", "application/javascript"),
            ("xml", "application/xml"),
            ("json", "application/json"),
            ("yaml", "application/yaml"),
            ("yml", "application/yaml"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("gif", "image/gif"),
            ("svg", "image/svg+xml"),
            ("tif", "image/tiff"),
            ("tiff", "image/tiff"),
            ("zip", "application/zip"),
            ("jar", "application/java-archive"),
            ("gz", "application/gzip"),
            ("doc", "application/msword"),
            (
                "docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ),
            ("xls", "application/vnd.ms-excel"),
            (
                "xlsx",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            ("ppt", "application/vnd.ms-powerpoint"),
            ("mp3", "audio/mpeg"),
            ("mp4", "video/mp4"),
        ]
        .into_iter()
        .collect();
        Self { types }
    }
}

impl Detector for ExtensionDetector {
    fn detect(&self, name: Option<&str>, _content: &[u8]) -> Result<Option<String>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let file_name = name.rsplit('/').next().unwrap_or(name);
        let Some((stem, extension)) = file_name.rsplit_once('.') else {
            return Ok(None);
        };
        if stem.is_empty() {
            return Ok(None);
        }
        let extension = extension.to_ascii_lowercase();
        Ok(self
            .types
            .get(extension.as_str())
            .map(|mime| mime.to_string()))
    }
}

/// Ordered chain of detectors.
#[derive(Clone)]
pub struct MimeTypeDetectors {
    detectors: Vec<(String, Arc<dyn Detector>)>,
}

impl MimeTypeDetectors {
    /// Builds the chain from configured detectors; the extension detector is appended.
    pub fn new(configured: Vec<(String, Arc<dyn Detector>)>) -> Self {
        let mut detectors = configured;
        detectors.push((
            EXTENSION_DETECTOR.to_string(),
            Arc::new(ExtensionDetector::new()),
        ));
        Self { detectors }
    }

    /// Names of the detectors in the order they are consulted.
    pub fn names(&self) -> Vec<&str> {
        self.detectors.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// The first answer in the chain. Detector errors are logged and skipped.
    pub fn mime_type_of(&self, name: Option<&str>, content: &[u8]) -> Option<String> {
        for (detector_name, detector) in &self.detectors {
            match detector.detect(name, content) {
                Ok(Some(mime)) => return Some(mime),
                Ok(None) => {}
                Err(e) => warn!("MIME type detector '{detector_name}' failed: {e}"),
            }
        }
        None
    }
}

impl Detector for MimeTypeDetectors {
    fn detect(&self, name: Option<&str>, content: &[u8]) -> Result<Option<String>> {
        Ok(self.mime_type_of(name, content))
    }
}

impl Default for MimeTypeDetectors {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
