//! Dry-run of a configuration for administrative "test configuration" forms.
//!
//! The result tells an unknown user apart from a wrong password, so this must
//! only be offered to privileged callers.

use crate::authenticator::HtpasswdAuthenticator;
use crate::config::HtpasswdConfig;
use crate::error::Error;
use crate::groups::HtpasswdGroupResolver;
use crate::source::SourceRegistry;
use crate::user::UserProfile;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Where a test login stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationFailure {
    /// The configuration names all three files.
    pub configured: bool,
    /// The htpasswd file has an entry for the user.
    pub user_found: bool,
    /// The password matched.
    pub user_authenticated: bool,
    /// Error report, absent for a plain unknown user.
    pub exception: Option<String>,
}

impl AuthenticationFailure {
    /// Unknown user.
    pub fn user_not_found() -> Self {
        Self {
            configured: true,
            user_found: false,
            user_authenticated: false,
            exception: None,
        }
    }

    /// Classifies a pipeline error.
    pub fn from_error(err: &Error) -> Self {
        let (configured, user_found, user_authenticated) = match err {
            Error::InvalidConfiguration { .. } => (false, false, false),
            Error::AuthenticationFailed { .. } => (true, true, false),
            Error::InvalidUser { .. } => (true, true, true),
            _ => (true, false, false),
        };
        Self {
            configured,
            user_found,
            user_authenticated,
            exception: Some(snafu::Report::from_error(err).to_string()),
        }
    }
}

/// Everything a test login produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    /// Set unless the login succeeded.
    pub failure: Option<AuthenticationFailure>,
    /// The assembled user; also present for a rejected, invalid user.
    pub user: Option<UserProfile>,
    /// Resolved groups of a successful login.
    pub groups: BTreeSet<String>,
}

impl AuthenticationResult {
    fn failed(failure: AuthenticationFailure, user: Option<UserProfile>) -> Self {
        Self {
            failure: Some(failure),
            user,
            groups: BTreeSet::new(),
        }
    }

    /// The login succeeded.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs a complete login plus group resolution against an unsaved config.
///
/// The login itself ignores the enabled flag; groups are only resolved for an
/// enabled configuration.
#[derive(Debug, Clone)]
pub struct AuthTester {
    config: HtpasswdConfig,
    sources: Arc<SourceRegistry>,
}

impl AuthTester {
    /// Tester for `config`.
    pub fn new(config: HtpasswdConfig, sources: Arc<SourceRegistry>) -> Self {
        Self { config, sources }
    }

    /// Try `username`/`password` and classify the outcome.
    pub fn test(&self, username: &str, password: &str) -> AuthenticationResult {
        let authenticator =
            HtpasswdAuthenticator::new(self.config.clone(), Arc::clone(&self.sources));
        match authenticator.authenticate(username, password) {
            Ok(Some(user)) => {
                let groups = HtpasswdGroupResolver::from_config(
                    self.config.clone(),
                    Arc::clone(&self.sources),
                )
                .resolve(username);
                AuthenticationResult {
                    failure: None,
                    user: Some(user),
                    groups,
                }
            }
            Ok(None) => AuthenticationResult::failed(AuthenticationFailure::user_not_found(), None),
            Err(err) => {
                let failure = AuthenticationFailure::from_error(&err);
                let user = match err {
                    Error::InvalidUser { user } => Some(user),
                    _ => None,
                };
                AuthenticationResult::failed(failure, user)
            }
        }
    }
}
