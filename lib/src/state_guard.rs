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

//! State guard for "must be started before use" checks
//!
//! The engine's accessors that hand out connections or services call
//! [`StateGuard::require_running`] first. The guard looks at the lifecycles of the
//! components those accessors depend on rather than at a separate flag, so it can
//! never disagree with them.

use crate::error::{CairnError, Result};
use crate::lifecycle::Lifecycle;

/// Guards engine operations that need a running federation and dispatcher.
///
/// # Thread Safety
///
/// `StateGuard` is cheap to clone; all clones observe the same lifecycles.
#[derive(Clone, Debug)]
pub struct StateGuard {
    federation: Lifecycle,
    dispatcher: Lifecycle,
}

impl StateGuard {
    pub fn new(federation: Lifecycle, dispatcher: Lifecycle) -> Self {
        Self {
            federation,
            dispatcher,
        }
    }

    /// Returns `true` when both guarded components report `Running`.
    pub fn is_running(&self) -> bool {
        self.federation.is_running() && self.dispatcher.is_running()
    }

    /// Require that the guarded components are running
    ///
    /// # Errors
    ///
    /// Returns `CairnError::NotRunning` naming the component states otherwise.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// pub async fn get_connection(&self, name: &str) -> crate::error::Result<PooledConnection> {
    ///     self.state_guard.require_running()?;
    ///     self.federation.get_connection(name).await
    /// }
    /// ```
    pub fn require_running(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        Err(CairnError::not_running(format!(
            "Engine must be started before this operation (federation is {}, dispatcher is {})",
            self.federation.state(),
            self.dispatcher.state()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(component: &'static str) -> Lifecycle {
        let lifecycle = Lifecycle::new(component, "test");
        lifecycle.begin_start().unwrap();
        lifecycle.mark_running();
        lifecycle
    }

    #[test]
    fn test_not_running_before_start() {
        let guard = StateGuard::new(
            Lifecycle::new("federation", "test"),
            Lifecycle::new("dispatcher", "test"),
        );
        assert!(!guard.is_running());
        match guard.require_running() {
            Err(CairnError::NotRunning { message }) => {
                assert!(message.contains("federation is NOT_STARTED"));
            }
            other => panic!("expected NotRunning, got {other:?}"),
        }
    }

    #[test]
    fn test_requires_both_components() {
        let federation = running("federation");
        let dispatcher = Lifecycle::new("dispatcher", "test");
        let guard = StateGuard::new(federation, dispatcher.clone());
        assert!(guard.require_running().is_err());

        dispatcher.begin_start().unwrap();
        dispatcher.mark_running();
        assert!(guard.require_running().is_ok());
    }

    #[test]
    fn test_fails_once_shutdown_begins() {
        let dispatcher = running("dispatcher");
        let guard = StateGuard::new(running("federation"), dispatcher.clone());
        dispatcher.begin_shutdown();
        assert!(guard.require_running().is_err());
    }
}
