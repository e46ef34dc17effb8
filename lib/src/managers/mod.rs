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

//! Shared helpers used by the engine's managed components.

pub mod logging;
pub mod panics;
pub mod state_validation;

pub use logging::{
    log_component_error, log_component_start, log_component_stop, log_component_warning,
    log_problems,
};
pub use panics::panic_message;
pub use state_validation::{transition_for, Operation, Transition};
