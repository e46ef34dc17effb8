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

//! Log lines shared by the engine's components.
//!
//! Every line is tagged with the engine id so several engines can share one logger.

use cairn_core::problems::{Problems, Severity};
use log::{error, info, warn};

pub fn log_component_start(component: &str, engine_id: &str) {
    info!("[{engine_id}] Starting {component}");
}

pub fn log_component_stop(component: &str, engine_id: &str) {
    info!("[{engine_id}] Stopping {component}");
}

pub fn log_component_error(component: &str, engine_id: &str, error: &str) {
    error!("[{engine_id}] Error in {component}: {error}");
}

pub fn log_component_warning(component: &str, engine_id: &str, warning: &str) {
    warn!("[{engine_id}] Warning in {component}: {warning}");
}

/// Logs each problem at the level matching its severity.
pub fn log_problems(engine_id: &str, problems: &Problems) {
    for problem in problems {
        match problem.severity {
            Severity::Error => error!("[{engine_id}] {problem}"),
            Severity::Warning => warn!("[{engine_id}] {problem}"),
            Severity::Info => info!("[{engine_id}] {problem}"),
        }
    }
}
