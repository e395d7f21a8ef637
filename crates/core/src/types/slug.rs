//! URL slugs for products.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Slug`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string is empty.
    #[error("slug cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("slug must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9-]`.
    #[error("slug contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// A lowercase URL slug (`[a-z0-9-]`, 1-255 chars).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    /// Maximum slug length (column width).
    pub const MAX_LENGTH: usize = 255;

    /// Parse an existing slug.
    ///
    /// # Errors
    ///
    /// Returns [`SlugError`] if the input is empty, too long, or contains
    /// anything but lowercase ASCII letters, digits and hyphens.
    pub fn parse(s: &str) -> Result<Self, SlugError> {
        if s.is_empty() {
            return Err(SlugError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(SlugError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(SlugError::InvalidCharacter(bad));
        }
        Ok(Self(s.to_owned()))
    }

    /// Derive a slug from free text: lowercase, runs of anything else
    /// collapsed into a single hyphen, no leading/trailing hyphens.
    ///
    /// ```
    /// use raredoor_core::Slug;
    ///
    /// let slug = Slug::slugify("Mid-Century Walnut Credenza (72\")").unwrap();
    /// assert_eq!(slug.as_str(), "mid-century-walnut-credenza-72");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`SlugError::Empty`] if nothing slug-worthy remains.
    pub fn slugify(text: &str) -> Result<Self, SlugError> {
        let mut out = String::with_capacity(text.len());
        let mut pending_dash = false;
        for c in text.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !out.is_empty() {
                    out.push('-');
                }
                pending_dash = false;
                out.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
        out.truncate(Self::MAX_LENGTH);
        while out.ends_with('-') {
            out.pop();
        }
        Self::parse(&out)
    }

    /// The slug as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(Slug::parse("eames-lounge-chair").is_ok());
        assert_eq!(Slug::parse(""), Err(SlugError::Empty));
        assert_eq!(Slug::parse("Eames"), Err(SlugError::InvalidCharacter('E')));
        assert_eq!(Slug::parse("a b"), Err(SlugError::InvalidCharacter(' ')));
        assert!(matches!(
            Slug::parse(&"a".repeat(256)),
            Err(SlugError::TooLong { .. })
        ));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(Slug::slugify("  Leather  Sofa!! ").unwrap().as_str(), "leather-sofa");
        assert_eq!(Slug::slugify("--Oak--").unwrap().as_str(), "oak");
        assert_eq!(Slug::slugify("!!!"), Err(SlugError::Empty));
    }
}
