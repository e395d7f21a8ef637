//! Internal usernames derived from email addresses.

use core::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Email;

/// A username that is never shown or used for login.
///
/// Users log in with their email; the username column only has to be
/// unique, so it is the SHA-256 hex digest of the normalized email,
/// truncated to [`Username::LENGTH`] characters. Two spellings of the same
/// address (differing only in case) map to the same username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    /// Length of a derived username.
    pub const LENGTH: usize = 30;

    /// Derive the username for an email.
    #[must_use]
    pub fn from_email(email: &Email) -> Self {
        let digest = Sha256::digest(email.normalized().as_bytes());
        let mut hex = format!("{digest:x}");
        hex.truncate(Self::LENGTH);
        Self(hex)
    }

    /// The username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_stable_and_case_insensitive() {
        let a = Username::from_email(&Email::parse("Buyer@Example.com").unwrap());
        let b = Username::from_email(&Email::parse("buyer@example.com").unwrap());
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), Username::LENGTH);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_different_emails_differ() {
        let a = Username::from_email(&Email::parse("a@example.com").unwrap());
        let b = Username::from_email(&Email::parse("b@example.com").unwrap());
        assert_ne!(a, b);
    }
}
