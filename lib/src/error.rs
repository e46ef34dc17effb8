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

//! Error types for cairn-lib operations.
//!
//! The public API returns `crate::error::Result<T>` with structured [`CairnError`]
//! variants. Plugin capabilities (connectors, processors, detectors) report failures as
//! `anyhow::Error`; the engine wraps those into the structured variants at the boundary.
//!
//! Configuration issues are not errors: they are collected as
//! [`cairn_core::problems::Problems`] and inspected by the caller.
//!
//! # Example
//!
//! ```ignore
//! use cairn_lib::error::{CairnError, Result};
//!
//! async fn read(engine: &Engine) -> Result<()> {
//!     match engine.get_connection("assets").await {
//!         Err(CairnError::UnknownSource { name }) => {
//!             println!("no source named '{}'", name);
//!         }
//!         Err(CairnError::NotRunning { message }) => {
//!             println!("engine not started: {}", message);
//!         }
//!         Err(e) => return Err(e),
//!         Ok(connection) => { /* ... */ }
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for cairn-lib operations.
#[derive(Error, Debug)]
pub enum CairnError {
    /// No source is registered under the requested name.
    #[error("Unknown source '{name}'")]
    UnknownSource {
        /// The source name that was requested
        name: String,
    },

    /// The connector for a source could not establish or use a connection.
    #[error("Connection to source '{source_name}' failed: {cause}")]
    Connection {
        /// The source whose connector failed
        source_name: String,
        /// The connector's own error
        #[source]
        cause: anyhow::Error,
    },

    /// The engine (or one of its components) is not running.
    #[error("Engine not running: {message}")]
    NotRunning {
        /// Description of the state error
        message: String,
    },

    /// A job was submitted after the dispatcher stopped accepting work.
    #[error("Job for rule '{rule}' on '{path}' rejected: dispatcher is not accepting submissions")]
    JobRejected {
        /// Name of the rule that produced the job
        rule: String,
        /// The input path of the job
        path: String,
    },

    /// Invalid engine configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error
        message: String,
    },

    /// Internal error - wraps underlying errors while preserving the error chain.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// ============================================================================
// Constructor helpers for common error patterns
// ============================================================================

impl CairnError {
    /// Create an unknown source error.
    ///
    /// # Example
    /// ```ignore
    /// CairnError::unknown_source("assets")
    /// ```
    pub fn unknown_source(name: impl Into<String>) -> Self {
        CairnError::UnknownSource { name: name.into() }
    }

    /// Create a connection error wrapping the connector's cause.
    pub fn connection(source_name: impl Into<String>, cause: anyhow::Error) -> Self {
        CairnError::Connection {
            source_name: source_name.into(),
            cause,
        }
    }

    /// Create a not-running error.
    ///
    /// # Example
    /// ```ignore
    /// CairnError::not_running("Engine must be started before this operation")
    /// ```
    pub fn not_running(message: impl Into<String>) -> Self {
        CairnError::NotRunning {
            message: message.into(),
        }
    }

    pub fn job_rejected(rule: impl Into<String>, path: impl ToString) -> Self {
        CairnError::JobRejected {
            rule: rule.into(),
            path: path.to_string(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        CairnError::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn is_unknown_source(&self) -> bool {
        matches!(self, CairnError::UnknownSource { .. })
    }

    pub fn is_not_running(&self) -> bool {
        matches!(self, CairnError::NotRunning { .. })
    }
}

/// Result type alias for cairn-lib operations.
pub type Result<T> = std::result::Result<T, CairnError>;
