#![warn(missing_docs)]

//! Authenticate users and resolve their groups from Apache style flat files.
//!
//! Three files make up a realm:
//!
//! * `htpasswd` — `username:$apr1$salt$digest`, only APR1-MD5 is accepted;
//! * `htgroup` — `group: user1 user2 ...`;
//! * `htmeta` — `username:email:display name`.
//!
//! Files are parsed lazily and re-parsed only when their modification time
//! changes. All parsed files live in a [`SourceRegistry`] that should be shared
//! by every component of the process.
//!
//! # Example
//!
//! ```no_run
//! use htrealm::{HtpasswdAuthenticator, HtpasswdConfig, HtpasswdGroupResolver, SourceRegistry};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sources = Arc::new(SourceRegistry::new());
//! let config = HtpasswdConfig::new("/etc/scm/.htpasswd", "/etc/scm/.htgroup", "/etc/scm/.htmeta");
//!
//! let authenticator = HtpasswdAuthenticator::new(config.clone(), Arc::clone(&sources));
//! if let Some(user) = authenticator.authenticate("trillian", "trilli123")? {
//!     println!("Welcome {}", user.display_name);
//! }
//!
//! let groups = HtpasswdGroupResolver::from_config(config, sources).resolve("trillian");
//! println!("Groups: {groups:?}");
//! # Ok(())
//! # }
//! ```

pub mod apr1_md5;
mod authenticator;
mod config;
mod error;
mod groups;
mod realm;
pub mod record;
mod source;
mod tester;
mod user;

pub use authenticator::{HtpasswdAuthenticator, assemble_user, verify_credentials};
pub use config::{ConfigStore, HtpasswdConfig, InMemoryConfigStore};
pub use error::Error;
pub use groups::HtpasswdGroupResolver;
pub use realm::{AuthenticationInfo, HtpasswdRealm, REALM_TYPE, UserSync};
pub use source::{GroupSource, KeyValueSource, Record, SourceRegistry};
pub use tester::{AuthTester, AuthenticationFailure, AuthenticationResult};
pub use user::UserProfile;
