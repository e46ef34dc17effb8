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

use crate::lifecycle::LifecycleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Shutdown,
}

/// Outcome of applying an [`Operation`] to a component in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given state.
    Enter(LifecycleState),
    /// The target state is already reached or in progress; nothing to do.
    Skip,
    /// The operation is not allowed from this state.
    Reject(&'static str),
}

/// Lifecycle transition table.
///
/// States only move forward: NotStarted → Starting → Running → Stopping → Terminated.
/// Shutting down a component that never started goes straight to Terminated.
pub fn transition_for(state: LifecycleState, operation: Operation) -> Transition {
    match (state, operation) {
        (LifecycleState::NotStarted, Operation::Start) => {
            Transition::Enter(LifecycleState::Starting)
        }
        (LifecycleState::Starting, Operation::Start) => Transition::Skip,
        (LifecycleState::Running, Operation::Start) => Transition::Skip,
        (LifecycleState::Stopping, Operation::Start) => {
            Transition::Reject("Cannot start a component while it is stopping")
        }
        (LifecycleState::Terminated, Operation::Start) => {
            Transition::Reject("Cannot restart a component that has terminated")
        }

        (LifecycleState::NotStarted, Operation::Shutdown) => {
            Transition::Enter(LifecycleState::Terminated)
        }
        (LifecycleState::Starting, Operation::Shutdown) => {
            Transition::Enter(LifecycleState::Stopping)
        }
        (LifecycleState::Running, Operation::Shutdown) => {
            Transition::Enter(LifecycleState::Stopping)
        }
        (LifecycleState::Stopping, Operation::Shutdown) => Transition::Skip,
        (LifecycleState::Terminated, Operation::Shutdown) => Transition::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_is_idempotent_once_started() {
        assert_eq!(
            transition_for(LifecycleState::NotStarted, Operation::Start),
            Transition::Enter(LifecycleState::Starting)
        );
        assert_eq!(
            transition_for(LifecycleState::Starting, Operation::Start),
            Transition::Skip
        );
        assert_eq!(
            transition_for(LifecycleState::Running, Operation::Start),
            Transition::Skip
        );
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(matches!(
            transition_for(LifecycleState::Stopping, Operation::Start),
            Transition::Reject(_)
        ));
        assert!(matches!(
            transition_for(LifecycleState::Terminated, Operation::Start),
            Transition::Reject(_)
        ));
    }

    #[test]
    fn test_shutdown_transitions() {
        assert_eq!(
            transition_for(LifecycleState::NotStarted, Operation::Shutdown),
            Transition::Enter(LifecycleState::Terminated)
        );
        assert_eq!(
            transition_for(LifecycleState::Running, Operation::Shutdown),
            Transition::Enter(LifecycleState::Stopping)
        );
        assert_eq!(
            transition_for(LifecycleState::Stopping, Operation::Shutdown),
            Transition::Skip
        );
        assert_eq!(
            transition_for(LifecycleState::Terminated, Operation::Shutdown),
            Transition::Skip
        );
    }
}
