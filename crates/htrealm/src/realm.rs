//! Realm adapter between the host login framework and the htpasswd files.

use crate::authenticator::HtpasswdAuthenticator;
use crate::config::ConfigStore;
use crate::error::{Error, UnknownAccountSnafu};
use crate::source::SourceRegistry;
use crate::user::UserProfile;
use snafu::OptionExt;
use std::sync::Arc;
use tracing::debug;

/// Realm name reported in [`AuthenticationInfo`].
pub const REALM_TYPE: &str = "htpasswd";

/// Host hook receiving every successfully authenticated user.
pub trait UserSync: Send + Sync {
    /// Create or update the host's copy of `user`.
    fn store(&self, user: &UserProfile);
}

/// Outcome of a successful realm login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationInfo {
    /// Always [`REALM_TYPE`].
    pub realm: &'static str,
    /// The authenticated user.
    pub user: UserProfile,
}

/// Login entry point for the host's authentication framework.
#[derive(Clone)]
pub struct HtpasswdRealm {
    store: Arc<dyn ConfigStore>,
    sync: Arc<dyn UserSync>,
    sources: Arc<SourceRegistry>,
}

impl HtpasswdRealm {
    /// Realm reading its configuration from `store` on every login.
    pub fn new(
        store: Arc<dyn ConfigStore>,
        sync: Arc<dyn UserSync>,
        sources: Arc<SourceRegistry>,
    ) -> Self {
        Self {
            store,
            sync,
            sources,
        }
    }

    /// Authenticate a username/password token.
    ///
    /// `Ok(None)` means the realm is disabled and the host should ask the
    /// next realm. Users missing from the htpasswd file are reported as
    /// [`Error::UnknownAccount`].
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<AuthenticationInfo>, Error> {
        let config = self.store.get();
        if !config.enabled {
            debug!("htpasswd not enabled - skipping authentication");
            return Ok(None);
        }

        let user = HtpasswdAuthenticator::new(config, Arc::clone(&self.sources))
            .authenticate(username, password)?
            .context(UnknownAccountSnafu { username })?;

        self.sync.store(&user);
        Ok(Some(AuthenticationInfo {
            realm: REALM_TYPE,
            user,
        }))
    }
}

impl std::fmt::Debug for HtpasswdRealm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtpasswdRealm")
            .field("config", &self.store.get())
            .finish_non_exhaustive()
    }
}
