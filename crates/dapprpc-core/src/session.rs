//! Chain id and authorized accounts last reported by the node layer.

use std::sync::Mutex;

use crate::events::{EventBus, ProviderEvent};

#[derive(Debug, Default)]
struct SessionState {
    chain_id: Option<String>,
    accounts: Vec<String>,
}

/// Tracks node-reported state and emits `chainChanged` / `accountsChanged`
/// only when a report differs from the previous one.
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain_id(&self) -> Option<String> {
        self.state.lock().unwrap().chain_id.clone()
    }

    pub fn accounts(&self) -> Vec<String> {
        self.state.lock().unwrap().accounts.clone()
    }

    /// Record a chain id report. Returns `true` if `chainChanged` was emitted.
    pub fn set_chain_id(&self, bus: &EventBus, chain_id: String) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.chain_id.as_deref() == Some(chain_id.as_str()) {
                return false;
            }
            state.chain_id = Some(chain_id.clone());
        }
        tracing::info!(chain_id = %chain_id, "chain changed");
        bus.emit(&ProviderEvent::ChainChanged(chain_id));
        true
    }

    /// Record an accounts report. Returns `true` if `accountsChanged` was emitted.
    pub fn set_accounts(&self, bus: &EventBus, accounts: Vec<String>) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if state.accounts == accounts {
                return false;
            }
            state.accounts = accounts.clone();
        }
        tracing::info!(count = accounts.len(), "accounts changed");
        bus.emit(&ProviderEvent::AccountsChanged(accounts));
        true
    }
}
