//! Per-invocation session state
//!
//! One `Session` lives for exactly one command run. It owns the loaded config
//! and the cached SSH passphrase; neither is ever shared across processes and
//! the passphrase is never written to disk.

use std::fmt;

use secrecy::SecretString;

use crate::core::config::{Config, ConfigStore};
use crate::core::ssh::SshKeyPaths;
use crate::error::Result;

pub struct Session {
    store: ConfigStore,
    keys: SshKeyPaths,
    config: Option<Config>,
    passphrase: Option<SecretString>,
    key_ready: bool,
}

impl Session {
    /// Session whose config and keys live under the store's directory
    pub fn new(store: ConfigStore) -> Self {
        let keys = SshKeyPaths::in_dir(store.dir());
        Self {
            store,
            keys,
            config: None,
            passphrase: None,
            key_ready: false,
        }
    }

    /// Session rooted at the default tool directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(ConfigStore::open_default()?))
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn ssh_keys(&self) -> &SshKeyPaths {
        &self.keys
    }

    /// Loaded config, None until `set_config` runs
    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = Some(config);
    }

    pub fn cached_passphrase(&self) -> Option<&SecretString> {
        self.passphrase.as_ref()
    }

    pub fn cache_passphrase(&mut self, passphrase: SecretString) {
        self.passphrase = Some(passphrase);
    }

    /// Forget the passphrase so the next resolution prompts again
    pub fn clear_passphrase(&mut self) {
        self.passphrase = None;
    }

    /// Whether the SSH keypair was already found during this run
    pub fn key_ready(&self) -> bool {
        self.key_ready
    }

    pub fn mark_key_ready(&mut self) {
        self.key_ready = true;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("config_loaded", &self.config.is_some())
            .field("passphrase_cached", &self.passphrase.is_some())
            .field("key_ready", &self.key_ready)
            .finish()
    }
}
