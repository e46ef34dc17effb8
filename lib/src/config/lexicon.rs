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

//! Names used by the configuration tree.

/// Container of source descriptors, directly below the configuration root.
pub const SOURCES: &str = "cairn:sources";

/// Container of processor rules, directly below the configuration root.
pub const PROCESSORS: &str = "cairn:processors";

/// Container of MIME type detector rules, directly below the configuration root.
pub const MIME_TYPE_DETECTORS: &str = "cairn:mimeTypeDetectors";

pub const READABLE_NAME: &str = "cairn:readableName";
pub const DESCRIPTION: &str = "cairn:description";
pub const CLASSNAME: &str = "cairn:classname";
pub const CLASSPATH: &str = "cairn:classpath";
pub const PATH_EXPRESSION: &str = "cairn:pathExpression";
pub const OUTPUT_PATH: &str = "cairn:outputPath";
pub const CONNECTOR_TYPE: &str = "cairn:connectorType";

/// Structural namespaces whose properties never reach a property bag.
pub const RESERVED_NAMESPACES: &[&str] = &["jcr", "nt", "mix"];

const WELL_KNOWN: &[&str] = &[
    READABLE_NAME,
    DESCRIPTION,
    CLASSNAME,
    CLASSPATH,
    PATH_EXPRESSION,
    OUTPUT_PATH,
    CONNECTOR_TYPE,
];

/// Splits `prefix:local` into its namespace prefix and local name.
pub fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// True for properties that describe structure or are read explicitly.
pub fn is_reserved(name: &str) -> bool {
    if WELL_KNOWN.contains(&name) {
        return true;
    }
    matches!(split_name(name).0, Some(prefix) if RESERVED_NAMESPACES.contains(&prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved("jcr:primaryType"));
        assert!(is_reserved("mix:referenceable"));
        assert!(is_reserved(CLASSNAME));
        assert!(!is_reserved("cairn:quality"));
        assert!(!is_reserved("quality"));
        assert!(!is_reserved("jcrish:value"));
    }

    #[test]
    fn test_split_name() {
        assert_eq!(split_name("cairn:quality"), (Some("cairn"), "quality"));
        assert_eq!(split_name("quality"), (None, "quality"));
    }
}
