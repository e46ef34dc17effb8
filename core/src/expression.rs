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

//! Path expressions select node paths and name the parts they capture.
//!
//! An expression has a selection and an optional output, separated by `=>`:
//!
//! ```text
//! /files/*.pdf                    selection only
//! /files/(**)/*.pdf => /out/{1}   selection with its own output template
//! ```
//!
//! Selection syntax:
//!
//! | Token     | Matches                                             | Captured |
//! |-----------|-----------------------------------------------------|----------|
//! | `*`       | any run of characters within one segment            | yes      |
//! | `**`      | any run of characters, `/` included                 | yes      |
//! | `?`       | exactly one character other than `/`                | yes      |
//! | `[abc]`   | one character of the class (`[^abc]` negates)       | no       |
//! | `( .. )`  | explicit group                                      | yes      |
//! | `\x`      | the literal character `x`                           | no       |
//!
//! Groups are numbered from 1 in order of their opening position; `{0}` in an
//! output template is the whole matched path.

use std::fmt::{Display, Formatter};

use regex::Regex;
use thiserror::Error;

use crate::models::{NodePath, PathError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathExpressionError {
    #[error("path expression is empty")]
    Empty,

    #[error("path expression '{expression}' must select an absolute path")]
    NotAbsolute { expression: String },

    #[error("path expression '{expression}' has no output after '=>'")]
    MissingOutput { expression: String },

    #[error("path expression '{expression}' has an unclosed '[' at position {position}")]
    UnclosedBracket { expression: String, position: usize },

    #[error("path expression '{expression}' nests '[' inside a character class at position {position}")]
    NestedBracket { expression: String, position: usize },

    #[error("path expression '{expression}' has unbalanced parentheses")]
    UnbalancedParentheses { expression: String },

    #[error("path expression '{expression}' ends with a dangling escape")]
    DanglingEscape { expression: String },

    #[error("path expression '{expression}' is invalid: {message}")]
    Invalid { expression: String, message: String },
}

/// A compiled path expression.
#[derive(Debug, Clone)]
pub struct PathExpression {
    expression: String,
    selection: String,
    output: Option<String>,
    regex: Regex,
}

impl PathExpression {
    pub fn compile(expression: &str) -> Result<Self, PathExpressionError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(PathExpressionError::Empty);
        }

        let (selection, output) = match trimmed.split_once("=>") {
            Some((selection, output)) => {
                let output = output.trim();
                if output.is_empty() {
                    return Err(PathExpressionError::MissingOutput {
                        expression: trimmed.to_string(),
                    });
                }
                (selection.trim(), Some(output.to_string()))
            }
            None => (trimmed, None),
        };

        if !selection.starts_with('/') {
            return Err(PathExpressionError::NotAbsolute {
                expression: trimmed.to_string(),
            });
        }

        let pattern = translate(trimmed, selection)?;
        let regex = Regex::new(&pattern).map_err(|e| PathExpressionError::Invalid {
            expression: trimmed.to_string(),
            message: e.to_string(),
        })?;

        Ok(PathExpression {
            expression: trimmed.to_string(),
            selection: selection.to_string(),
            output,
            regex,
        })
    }

    /// The expression as it was written (trimmed).
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn selection(&self) -> &str {
        &self.selection
    }

    /// Output template carried by the expression itself, if any.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn group_count(&self) -> usize {
        self.regex.captures_len() - 1
    }

    pub fn is_match(&self, path: &NodePath) -> bool {
        self.regex.is_match(&path.to_string())
    }

    pub fn matches(&self, path: &NodePath) -> Option<Matcher> {
        let text = path.to_string();
        let captures = self.regex.captures(&text)?;
        let groups = (0..captures.len())
            .map(|i| {
                captures
                    .get(i)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            })
            .collect();
        Some(Matcher { groups })
    }
}

impl PartialEq for PathExpression {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl Eq for PathExpression {}

impl Display for PathExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.expression)
    }
}

/// The groups captured by one successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    groups: Vec<String>,
}

impl Matcher {
    pub fn matched_path(&self) -> &str {
        self.groups.first().map(String::as_str).unwrap_or("")
    }

    pub fn group(&self, index: usize) -> Option<&str> {
        self.groups.get(index).map(String::as_str)
    }

    /// Replaces every `{N}` in `template` with group `N` and parses the result.
    ///
    /// Groups that did not participate in the match, or do not exist, become
    /// empty strings; braces that do not enclose a group number are kept.
    pub fn substitute(&self, template: &str) -> Result<NodePath, PathError> {
        let mut out = String::with_capacity(template.len() + self.matched_path().len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if close > 0 && after[..close].bytes().all(|b| b.is_ascii_digit()) => {
                    let index: usize = after[..close].parse().unwrap_or(usize::MAX);
                    out.push_str(self.group(index).unwrap_or(""));
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        NodePath::parse(&out)
    }
}

fn translate(expression: &str, selection: &str) -> Result<String, PathExpressionError> {
    let mut pattern = String::with_capacity(selection.len() * 2 + 2);
    pattern.push('^');

    let mut open_groups = 0usize;
    let mut chars = selection.char_indices().peekable();
    while let Some((position, c)) = chars.next() {
        match c {
            '*' => {
                if matches!(chars.peek(), Some((_, '*'))) {
                    chars.next();
                    pattern.push_str("(.*)");
                } else {
                    pattern.push_str("([^/]*)");
                }
            }
            '?' => pattern.push_str("([^/])"),
            '(' => {
                open_groups += 1;
                pattern.push('(');
            }
            ')' => {
                if open_groups == 0 {
                    return Err(PathExpressionError::UnbalancedParentheses {
                        expression: expression.to_string(),
                    });
                }
                open_groups -= 1;
                pattern.push(')');
            }
            '[' => {
                let mut class = String::from("[");
                let mut closed = false;
                while let Some((inner_position, n)) = chars.next() {
                    match n {
                        ']' => {
                            closed = true;
                            class.push(']');
                            break;
                        }
                        '[' => {
                            return Err(PathExpressionError::NestedBracket {
                                expression: expression.to_string(),
                                position: inner_position,
                            });
                        }
                        '\\' => match chars.next() {
                            Some((_, escaped)) => {
                                class.push('\\');
                                class.push(escaped);
                            }
                            None => {
                                return Err(PathExpressionError::DanglingEscape {
                                    expression: expression.to_string(),
                                })
                            }
                        },
                        other => class.push(other),
                    }
                }
                if !closed {
                    return Err(PathExpressionError::UnclosedBracket {
                        expression: expression.to_string(),
                        position,
                    });
                }
                pattern.push_str(&class);
            }
            '\\' => match chars.next() {
                Some((_, escaped)) => pattern.push_str(&regex::escape(&escaped.to_string())),
                None => {
                    return Err(PathExpressionError::DanglingEscape {
                        expression: expression.to_string(),
                    })
                }
            },
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }

    if open_groups != 0 {
        return Err(PathExpressionError::UnbalancedParentheses {
            expression: expression.to_string(),
        });
    }

    pattern.push('$');
    Ok(pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> NodePath {
        NodePath::parse(p).unwrap()
    }

    #[test]
    fn test_single_star_captures_within_segment() {
        let expr = PathExpression::compile("/files/*.pdf").unwrap();
        let m = expr.matches(&path("/files/report.pdf")).unwrap();
        assert_eq!(m.group(1), Some("report"));
        assert_eq!(m.substitute("/derived/{1}").unwrap(), path("/derived/report"));

        assert!(!expr.is_match(&path("/files/nested/report.pdf")));
        assert!(!expr.is_match(&path("/files/report.txt")));
        assert!(!expr.is_match(&path("/files/reportxpdf")));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let expr = PathExpression::compile("/files/**/*.pdf").unwrap();
        let m = expr.matches(&path("/files/a/b/report.pdf")).unwrap();
        assert_eq!(m.group(1), Some("a/b"));
        assert_eq!(m.group(2), Some("report"));
        assert_eq!(
            m.substitute("/derived/{1}/{2}").unwrap(),
            path("/derived/a/b/report")
        );
    }

    #[test]
    fn test_explicit_groups_are_numbered_by_opening_position() {
        let expr = PathExpression::compile("/(docs/(*))/index.html").unwrap();
        let m = expr.matches(&path("/docs/guide/index.html")).unwrap();
        assert_eq!(m.group(1), Some("docs/guide"));
        assert_eq!(m.group(2), Some("guide"));
        assert_eq!(m.group(3), Some("guide"));
    }

    #[test]
    fn test_inline_output_is_split_off() {
        let expr = PathExpression::compile(" /in/*.xml => /out/{1} ").unwrap();
        assert_eq!(expr.selection(), "/in/*.xml");
        assert_eq!(expr.output(), Some("/out/{1}"));
        assert_eq!(expr.expression(), "/in/*.xml => /out/{1}");
    }

    #[test]
    fn test_character_classes_pass_through() {
        let expr = PathExpression::compile("/logs/day[0-9].txt").unwrap();
        assert!(expr.is_match(&path("/logs/day7.txt")));
        assert!(!expr.is_match(&path("/logs/dayx.txt")));
    }

    #[test]
    fn test_unparsable_expressions_are_rejected() {
        assert!(matches!(
            PathExpression::compile("[[invalid"),
            Err(PathExpressionError::NotAbsolute { .. })
        ));
        assert!(matches!(
            PathExpression::compile("/files/[[invalid"),
            Err(PathExpressionError::NestedBracket { .. })
        ));
        assert!(matches!(
            PathExpression::compile("/files/[abc"),
            Err(PathExpressionError::UnclosedBracket { position: 7, .. })
        ));
        assert!(matches!(
            PathExpression::compile("/files/(*"),
            Err(PathExpressionError::UnbalancedParentheses { .. })
        ));
        assert!(matches!(
            PathExpression::compile("/files/*.pdf =>"),
            Err(PathExpressionError::MissingOutput { .. })
        ));
        assert_eq!(PathExpression::compile("  "), Err(PathExpressionError::Empty));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let expr = PathExpression::compile("/a+b/c.d").unwrap();
        assert!(expr.is_match(&path("/a+b/c.d")));
        assert!(!expr.is_match(&path("/aab/cxd")));
    }

    #[test]
    fn test_substitute_handles_missing_groups_and_stray_braces() {
        let expr = PathExpression::compile("/files/*").unwrap();
        let m = expr.matches(&path("/files/x")).unwrap();
        assert_eq!(m.substitute("/out/{9}/{1}").unwrap(), path("/out/x"));
        assert_eq!(m.substitute("/out/{name}/{1}").unwrap(), path("/out/{name}/x"));
        assert_eq!(m.substitute("/copy{0}").unwrap(), path("/copy/files/x"));
        assert!(m.substitute("relative/{1}").is_err());
    }
}
