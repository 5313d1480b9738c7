//! Worker lifecycle: install, activate, fetch.
//!
//! The worker takes over as soon as it can. Installation skips the waiting
//! phase and activation claims every existing client. Fetches are never
//! intercepted.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Not installed yet.
    #[default]
    Parsed,
    /// Installed, skip-waiting requested, activation pending.
    Activating,
    /// Active and controlling its clients.
    Activated,
}

/// What the worker did in response to a lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleAction {
    /// Activate immediately instead of waiting for old clients to go away.
    SkipWaiting,
    /// Take control of clients that loaded before activation.
    ClaimClients,
    /// Let the request through untouched.
    Passthrough,
}

/// Tracks the worker's lifecycle phase.
#[derive(Debug, Default)]
pub struct Lifecycle {
    phase: LifecyclePhase,
    clients_claimed: bool,
}

impl Lifecycle {
    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Whether existing clients have been claimed.
    #[must_use]
    pub const fn clients_claimed(&self) -> bool {
        self.clients_claimed
    }

    /// Handles `install`: request skip-waiting.
    pub fn on_install(&mut self) -> LifecycleAction {
        if self.phase == LifecyclePhase::Parsed {
            self.phase = LifecyclePhase::Activating;
        }
        tracing::info!(phase = ?self.phase, "worker installed, skipping wait");
        LifecycleAction::SkipWaiting
    }

    /// Handles `activate`: claim existing clients.
    pub fn on_activate(&mut self) -> LifecycleAction {
        self.phase = LifecyclePhase::Activated;
        self.clients_claimed = true;
        tracing::info!("worker activated, clients claimed");
        LifecycleAction::ClaimClients
    }

    /// Handles `fetch`: not intercepted.
    pub fn on_fetch(&self, url: Option<&str>) -> LifecycleAction {
        tracing::trace!(url = ?url, "fetch not intercepted");
        LifecycleAction::Passthrough
    }
}
