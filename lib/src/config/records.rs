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

//! Typed records materialized from the configuration tree.
//!
//! Records are immutable once built; the engine shares them through `Arc`.

use cairn_core::expression::{Matcher, PathExpression};
use cairn_core::models::{NodePath, PropertyMap};
use serde_json::Value;

/// A named source: which connector serves it and with which properties.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub name: String,
    pub connector_type: String,
    /// Plugin locator carried through from configuration
    pub classpath: Vec<String>,
    pub properties: PropertyMap,
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, connector_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connector_type: connector_type.into(),
            classpath: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_classpath(mut self, classpath: Vec<String>) -> Self {
        self.classpath = classpath;
        self
    }
}

/// Routes changed paths to a processor.
///
/// A rule whose expressions all failed to compile is kept (so it can be
/// reported) but never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorRule {
    pub name: String,
    pub description: Option<String>,
    pub expressions: Vec<PathExpression>,
    /// Output path template used when an expression carries no `=> output` of its own
    pub output_template: Option<String>,
    pub classname: String,
    pub classpath: Vec<String>,
    pub properties: PropertyMap,
}

/// Output template used when neither the expression nor the rule provides one.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "{0}";

impl ProcessorRule {
    pub fn new(name: impl Into<String>, classname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            expressions: Vec::new(),
            output_template: None,
            classname: classname.into(),
            classpath: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_expression(mut self, expression: PathExpression) -> Self {
        self.expressions.push(expression);
        self
    }

    pub fn with_output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn is_matchable(&self) -> bool {
        !self.expressions.is_empty()
    }

    /// The first expression that matches `path`, with its capture groups.
    pub fn first_match(&self, path: &NodePath) -> Option<(&PathExpression, Matcher)> {
        self.expressions
            .iter()
            .find_map(|expression| expression.matches(path).map(|m| (expression, m)))
    }

    /// The output template that applies to a match of `expression`.
    pub fn output_template_for<'a>(&'a self, expression: &'a PathExpression) -> &'a str {
        expression
            .output()
            .or(self.output_template.as_deref())
            .unwrap_or(DEFAULT_OUTPUT_TEMPLATE)
    }
}

/// Names a MIME type detector implementation.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorRule {
    pub name: String,
    pub description: Option<String>,
    pub classname: String,
    pub classpath: Vec<String>,
    pub properties: PropertyMap,
}

impl DetectorRule {
    pub fn new(name: impl Into<String>, classname: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            classname: classname.into(),
            classpath: Vec::new(),
            properties: PropertyMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> NodePath {
        NodePath::parse(text).unwrap()
    }

    #[test]
    fn test_first_matching_expression_wins() {
        let rule = ProcessorRule::new("docs", "extractor")
            .with_expression(PathExpression::compile("/docs/*.txt => /text/{1}").unwrap())
            .with_expression(PathExpression::compile("/docs/**").unwrap())
            .with_output_template("/all{0}");

        let (expression, matcher) = rule.first_match(&path("/docs/a.txt")).unwrap();
        assert_eq!(rule.output_template_for(expression), "/text/{1}");
        assert_eq!(matcher.substitute("/text/{1}").unwrap(), path("/text/a"));

        let (expression, _) = rule.first_match(&path("/docs/img/b.png")).unwrap();
        assert_eq!(rule.output_template_for(expression), "/all{0}");

        assert!(rule.first_match(&path("/other/a.txt")).is_none());
    }

    #[test]
    fn test_default_output_template() {
        let rule = ProcessorRule::new("copy", "copier")
            .with_expression(PathExpression::compile("/in/*").unwrap());
        let (expression, _) = rule.first_match(&path("/in/x")).unwrap();
        assert_eq!(rule.output_template_for(expression), DEFAULT_OUTPUT_TEMPLATE);
    }

    #[test]
    fn test_rule_without_expressions_never_matches() {
        let rule = ProcessorRule::new("empty", "extractor");
        assert!(!rule.is_matchable());
        assert!(rule.first_match(&path("/anything")).is_none());
    }
}
