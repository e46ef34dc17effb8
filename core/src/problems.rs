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

//! Problems are diagnostics recorded as data rather than raised as errors.
//!
//! Configuration scans and job executions append to a [`Problems`] collection;
//! callers inspect it (for example with [`Problems::has_errors`]) before deciding
//! whether to proceed.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        write!(f, "{label}")
    }
}

/// One diagnostic: a message template, its positional parameters, and optional context.
///
/// Templates use `{}` placeholders that are filled from `parameters` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub severity: Severity,
    pub template: String,
    #[serde(default)]
    pub parameters: Vec<String>,
    /// What the problem is about, e.g. a rule name or a job label.
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub cause: Option<String>,
}

impl Problem {
    pub fn new(severity: Severity, template: impl Into<String>) -> Self {
        Problem {
            severity,
            template: template.into(),
            parameters: Vec::new(),
            resource: None,
            cause: None,
        }
    }

    pub fn error(template: impl Into<String>) -> Self {
        Problem::new(Severity::Error, template)
    }

    pub fn warning(template: impl Into<String>) -> Self {
        Problem::new(Severity::Warning, template)
    }

    pub fn info(template: impl Into<String>) -> Self {
        Problem::new(Severity::Info, template)
    }

    pub fn with_parameter(mut self, parameter: impl ToString) -> Self {
        self.parameters.push(parameter.to_string());
        self
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.parameters
            .extend(parameters.into_iter().map(|p| p.to_string()));
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// The template with its parameters substituted.
    ///
    /// Surplus placeholders are left as `{}`; surplus parameters are ignored.
    pub fn message(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut parameters = self.parameters.iter();
        let mut rest = self.template.as_str();
        while let Some(at) = rest.find("{}") {
            out.push_str(&rest[..at]);
            match parameters.next() {
                Some(p) => out.push_str(p),
                None => out.push_str("{}"),
            }
            rest = &rest[at + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message())?;
        if let Some(resource) = &self.resource {
            write!(f, " [{resource}]")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " (caused by: {cause})")?;
        }
        Ok(())
    }
}

/// Ordered, append-only collection of [`Problem`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problems {
    problems: Vec<Problem>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn add_error<I, S>(&mut self, template: &str, parameters: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.push(Problem::error(template).with_parameters(parameters));
    }

    pub fn add_warning<I, S>(&mut self, template: &str, parameters: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.push(Problem::warning(template).with_parameters(parameters));
    }

    pub fn add_info<I, S>(&mut self, template: &str, parameters: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.push(Problem::info(template).with_parameters(parameters));
    }

    /// Appends `problem` and drops the oldest entries beyond `capacity`.
    pub fn push_bounded(&mut self, problem: Problem, capacity: usize) {
        self.problems.push(problem);
        if self.problems.len() > capacity {
            let excess = self.problems.len() - capacity;
            self.problems.drain(..excess);
        }
    }

    pub fn extend(&mut self, other: Problems) {
        self.problems.extend(other.problems);
    }

    pub fn has_errors(&self) -> bool {
        self.problems.iter().any(Problem::is_error)
    }

    pub fn has_warnings(&self) -> bool {
        self.problems
            .iter()
            .any(|p| p.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| p.is_error())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Problem> {
        self.problems.iter()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

impl IntoIterator for Problems {
    type Item = Problem;
    type IntoIter = std::vec::IntoIter<Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.into_iter()
    }
}

impl<'a> IntoIterator for &'a Problems {
    type Item = &'a Problem;
    type IntoIter = std::slice::Iter<'a, Problem>;

    fn into_iter(self) -> Self::IntoIter {
        self.problems.iter()
    }
}

impl FromIterator<Problem> for Problems {
    fn from_iter<T: IntoIterator<Item = Problem>>(iter: T) -> Self {
        Problems {
            problems: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_substitutes_parameters_in_order() {
        let problem = Problem::error("expression '{}' on rule '{}' is invalid")
            .with_parameters(["[[x", "pdf"])
            .with_resource("pdf")
            .with_cause("unclosed bracket");
        assert_eq!(problem.message(), "expression '[[x' on rule 'pdf' is invalid");
        assert_eq!(
            problem.to_string(),
            "ERROR: expression '[[x' on rule 'pdf' is invalid [pdf] (caused by: unclosed bracket)"
        );
    }

    #[test]
    fn test_message_tolerates_parameter_mismatch() {
        let problem = Problem::info("{} and {}").with_parameter("one");
        assert_eq!(problem.message(), "one and {}");
        let problem = Problem::info("nothing").with_parameter("extra");
        assert_eq!(problem.message(), "nothing");
    }

    #[test]
    fn test_collection_preserves_order_and_reports_severity() {
        let mut problems = Problems::new();
        assert!(!problems.has_errors());

        problems.add_warning("first", Vec::<String>::new());
        problems.add_info("second", ["x"]);
        assert!(!problems.has_errors());
        assert!(problems.has_warnings());

        problems.add_error("third {}", [3]);
        assert!(problems.has_errors());
        assert_eq!(problems.error_count(), 1);

        let templates: Vec<&str> = problems.iter().map(|p| p.template.as_str()).collect();
        assert_eq!(templates, vec!["first", "second", "third {}"]);
    }

    #[test]
    fn test_push_bounded_evicts_oldest() {
        let mut problems = Problems::new();
        for template in ["one", "two", "three", "four"] {
            problems.push_bounded(Problem::error(template), 3);
        }
        let templates: Vec<&str> = problems.iter().map(|p| p.template.as_str()).collect();
        assert_eq!(templates, vec!["two", "three", "four"]);
    }
}
