//! Error type shared by every part of the crate.

use crate::user::UserProfile;
use snafu::Snafu;
use std::path::PathBuf;

/// Errors raised while authenticating against htpasswd files.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// One of the file paths is unset.
    #[snafu(display("Invalid htpasswd configuration: {reason}"))]
    InvalidConfiguration {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The user exists but the credential check failed.
    #[snafu(display("Failed to authenticate user '{username}'"))]
    AuthenticationFailed {
        /// The rejected user.
        username: String,
    },

    /// The assembled user does not pass validation.
    #[snafu(display("Invalid user object: {user}"))]
    InvalidUser {
        /// The rejected profile.
        user: UserProfile,
    },

    /// No password entry exists for the user.
    #[snafu(display("Could not find account with name '{username}'"))]
    UnknownAccount {
        /// The name that was looked up.
        username: String,
    },

    /// Failed to read a credential file.
    #[snafu(display("Failed to read '{}'", path.display()))]
    ReadSource {
        /// Underlying I/O error.
        source: std::io::Error,
        /// The credential file.
        path: PathBuf,
    },

    /// Failed to read a configuration file.
    #[snafu(display("Failed to read configuration file '{}'", path.display()))]
    ReadConfig {
        /// Underlying I/O error.
        source: std::io::Error,
        /// The configuration file.
        path: PathBuf,
    },

    /// Configuration file is not valid TOML for [`HtpasswdConfig`](crate::HtpasswdConfig).
    #[snafu(display("Failed to parse configuration file '{}'", path.display()))]
    ParseConfig {
        /// Underlying TOML error.
        source: toml::de::Error,
        /// The configuration file.
        path: PathBuf,
    },
}
