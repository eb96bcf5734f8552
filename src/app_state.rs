// Shared application state
//
// One mutex around the whole world. Requests serialize through it, which is
// what makes the service-level effect ordering (wallet first, bet second)
// atomic from the outside.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};
use crate::config::{EconomicConfig, ServerConfig};
use crate::store::{MemoryStore, StoreError};

pub type SharedState = Arc<Mutex<AppState>>;

pub struct AppState {
    pub store: MemoryStore,
    pub economics: EconomicConfig,
    pub server: ServerConfig,
    /// Users allowed to resolve markets they did not create.
    pub admins: HashSet<String>,
    pub clock: Box<dyn Clock>,
}

impl AppState {
    /// Fresh state with an empty store. Tests start here and swap in a
    /// fixed clock.
    pub fn new(economics: EconomicConfig, server: ServerConfig) -> Self {
        Self {
            store: MemoryStore::new(),
            economics,
            server,
            admins: HashSet::new(),
            clock: Box::new(SystemClock),
        }
    }

    /// Production startup: reload the snapshot if one exists and read the
    /// admin list from ADMIN_USERNAMES (comma separated).
    pub fn from_disk(economics: EconomicConfig, server: ServerConfig) -> Self {
        let store = match MemoryStore::load_from_disk(&server.state_file) {
            Ok(store) => {
                tracing::info!(path = %server.state_file, "loaded persisted state");
                store
            }
            Err(err) => {
                tracing::info!(path = %server.state_file, %err, "starting with a fresh store");
                MemoryStore::new()
            }
        };
        let admins = std::env::var("ADMIN_USERNAMES")
            .unwrap_or_default()
            .split(',')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            store,
            economics,
            server,
            admins,
            clock: Box::new(SystemClock),
        }
    }

    pub fn is_admin(&self, username: &str) -> bool {
        self.admins.contains(username)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        self.store.save_to_disk(&self.server.state_file)
    }
}

pub fn shared(state: AppState) -> SharedState {
    Arc::new(Mutex::new(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Repository;

    #[test]
    fn fresh_state_has_no_admins() {
        let state = AppState::new(EconomicConfig::default(), ServerConfig::default());
        assert!(!state.is_admin("root"));
        assert!(state.store.list_users().is_empty());
    }

    #[test]
    fn admin_membership_is_exact() {
        let mut state = AppState::new(EconomicConfig::default(), ServerConfig::default());
        state.admins.insert("root".to_string());
        assert!(state.is_admin("root"));
        assert!(!state.is_admin("roo"));
    }
}
