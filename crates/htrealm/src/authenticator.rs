//! Password verification and user assembly against htpasswd/htmeta files.

use crate::apr1_md5;
use crate::config::HtpasswdConfig;
use crate::error::{
    AuthenticationFailedSnafu, Error, InvalidConfigurationSnafu, InvalidUserSnafu,
};
use crate::source::{KeyValueSource, SourceRegistry};
use crate::user::UserProfile;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use validator::ValidateEmail;

/// Checks `password` for `username` against an htpasswd source.
///
/// * `Ok(false)` when the file has no entry for the user.
/// * `Ok(true)` when the entry is an APR1 hash matching the password.
/// * [`Error::AuthenticationFailed`] when the entry exists but either uses
///   another scheme or does not match.
pub fn verify_credentials(
    htpasswd: &KeyValueSource,
    username: &str,
    password: &str,
) -> Result<bool, Error> {
    let Some(record) = htpasswd.lookup(username) else {
        return Ok(false);
    };
    if record.key != username {
        return Ok(false);
    }

    // Only APR1 entries are accepted; anything else fails like a bad password.
    if apr1_md5::is_apr1(&record.data) && apr1_md5::verify(password, &record.data) {
        debug!(username, "user successfully authenticated");
        return Ok(true);
    }
    AuthenticationFailedSnafu { username }.fail()
}

/// Builds the profile of `username` from an htmeta source.
///
/// Entries read `email:display name`. A blank or missing display name falls
/// back to the username, and an invalid e-mail address is dropped.
pub fn assemble_user(htmeta: &KeyValueSource, username: &str) -> Result<UserProfile, Error> {
    let (mail, display_name) = match htmeta.lookup(username) {
        Some(record) if record.key == username => {
            let mut fields = record.data.split(':');
            let mail = fields.next().unwrap_or_default().to_owned();
            let display_name = fields.next().unwrap_or_default().to_owned();
            (mail, display_name)
        }
        _ => (String::new(), String::new()),
    };

    let display_name = if display_name.trim().is_empty() {
        username.to_owned()
    } else {
        display_name
    };

    let mail = if !mail.is_empty() && mail.validate_email() {
        Some(mail)
    } else {
        warn!(username, "no valid e-mail address found for user");
        None
    };

    let user = UserProfile {
        name: username.to_owned(),
        display_name,
        mail,
    };
    snafu::ensure!(user.is_valid(), InvalidUserSnafu { user });
    Ok(user)
}

/// Runs the authentication pipeline for one configuration.
#[derive(Debug, Clone)]
pub struct HtpasswdAuthenticator {
    config: HtpasswdConfig,
    sources: Arc<SourceRegistry>,
}

impl HtpasswdAuthenticator {
    /// Authenticator reading files through the shared `sources`.
    pub fn new(config: HtpasswdConfig, sources: Arc<SourceRegistry>) -> Self {
        Self { config, sources }
    }

    /// Configuration in use.
    pub fn config(&self) -> &HtpasswdConfig {
        &self.config
    }

    /// Authenticate `username` with `password`.
    ///
    /// Returns `Ok(None)` for users missing from the htpasswd file. Invalid
    /// configuration, a failed password check and an invalid assembled user
    /// are errors.
    pub fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserProfile>, Error> {
        if let Some(missing) = self.config.missing_file() {
            return InvalidConfigurationSnafu {
                reason: format!("{missing} is not set"),
            }
            .fail();
        }

        let htpasswd = self.sources.key_value(&self.config.htpasswd_file);
        if !verify_credentials(&htpasswd, username, password)? {
            return Ok(None);
        }

        let htmeta = self.sources.key_value(&self.config.htmeta_file);
        let user = assemble_user(&htmeta, username)?;
        trace!(%user, "successfully created user from htpasswd");
        Ok(Some(user))
    }
}
