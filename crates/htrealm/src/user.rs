//! User profiles assembled from the credential files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A user assembled from the htpasswd and htmeta files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Login name.
    pub name: String,
    /// Human readable name, the login name when none is recorded.
    pub display_name: String,
    /// E-mail address, only set when syntactically valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
}

impl UserProfile {
    /// Minimal validity: a non-empty name and display name.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.display_name.trim().is_empty()
    }
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User {{ name: {:?}, display_name: {:?}", self.name, self.display_name)?;
        match &self.mail {
            Some(mail) => write!(f, ", mail: {mail:?} }}"),
            None => write!(f, " }}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, display_name: &str) -> UserProfile {
        UserProfile {
            name: name.to_string(),
            display_name: display_name.to_string(),
            mail: None,
        }
    }

    #[test]
    fn test_validity() {
        assert!(user("trillian", "Tricia McMillan").is_valid());
        assert!(!user("", "Nobody").is_valid());
        assert!(!user("trillian", " ").is_valid());
    }

    #[test]
    fn test_display() {
        let mut profile = user("arthur", "Arthur Dent");
        assert_eq!(
            profile.to_string(),
            r#"User { name: "arthur", display_name: "Arthur Dent" }"#
        );
        profile.mail = Some("arthur@example.com".to_string());
        assert!(profile.to_string().ends_with(r#"mail: "arthur@example.com" }"#));
    }
}
