//! Product shelf life.
//!
//! Every published product starts with a number of hours left on the
//! shelf. The countdown is decayed periodically; once it reaches zero the
//! product drops out of the catalog. Products with no countdown (`None`)
//! never expire.

use serde::{Deserialize, Serialize};

/// Shelf-life policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShelfLife {
    hours: u32,
}

impl ShelfLife {
    /// Default shelf life: one week.
    pub const DEFAULT_HOURS: u32 = 168;

    /// A policy giving new products `hours` on the shelf.
    #[must_use]
    pub const fn new(hours: u32) -> Self {
        Self { hours }
    }

    /// Hours a newly listed product starts with.
    #[must_use]
    pub const fn hours(&self) -> u32 {
        self.hours
    }

    /// Starting value for the `hours_left` column.
    #[must_use]
    pub fn initial_hours_left(&self) -> i32 {
        i32::try_from(self.hours).unwrap_or(i32::MAX)
    }

    /// Decay a countdown by `elapsed` hours, stopping at zero.
    #[must_use]
    pub fn decay(hours_left: Option<i32>, elapsed: u32) -> Option<i32> {
        let elapsed = i32::try_from(elapsed).unwrap_or(i32::MAX);
        hours_left.map(|left| left.saturating_sub(elapsed).max(0))
    }

    /// A product stays "recent" while at least half its shelf life remains.
    #[must_use]
    pub fn is_recent(&self, hours_left: Option<i32>) -> bool {
        hours_left.is_none_or(|left| i64::from(left) * 2 >= i64::from(self.hours))
    }
}

impl Default for ShelfLife {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HOURS)
    }
}

/// The availability flags of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Availability {
    /// Listed in the catalog.
    pub is_published: bool,
    /// Already bought.
    pub is_sold: bool,
    /// Held for a buyer (e.g. an accepted offer).
    pub is_reserved: bool,
    /// Hours left on the shelf; `None` never expires.
    pub hours_left: Option<i32>,
}

impl Availability {
    /// Whether shoppers can see the product.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.is_published && !self.is_sold && self.hours_left.is_none_or(|left| left > 0)
    }

    /// Whether the product can be bought or offered on right now.
    #[must_use]
    pub fn is_purchasable(&self) -> bool {
        self.is_visible() && !self.is_reserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decay_saturates() {
        assert_eq!(ShelfLife::decay(Some(10), 3), Some(7));
        assert_eq!(ShelfLife::decay(Some(2), 5), Some(0));
        assert_eq!(ShelfLife::decay(Some(0), 1), Some(0));
        assert_eq!(ShelfLife::decay(None, 100), None);
        assert_eq!(ShelfLife::decay(Some(5), u32::MAX), Some(0));
    }

    #[test]
    fn test_is_recent() {
        let policy = ShelfLife::new(100);
        assert!(policy.is_recent(Some(100)));
        assert!(policy.is_recent(Some(50)));
        assert!(!policy.is_recent(Some(49)));
        assert!(policy.is_recent(None));
    }

    #[test]
    fn test_visibility() {
        let listed = Availability {
            is_published: true,
            hours_left: Some(5),
            ..Availability::default()
        };
        assert!(listed.is_visible());
        assert!(listed.is_purchasable());

        let expired = Availability {
            hours_left: Some(0),
            ..listed
        };
        assert!(!expired.is_visible());

        let sold = Availability {
            is_sold: true,
            ..listed
        };
        assert!(!sold.is_visible());

        let reserved = Availability {
            is_reserved: true,
            ..listed
        };
        assert!(reserved.is_visible());
        assert!(!reserved.is_purchasable());

        let unpublished = Availability::default();
        assert!(!unpublished.is_visible());

        let evergreen = Availability {
            is_published: true,
            hours_left: None,
            ..Availability::default()
        };
        assert!(evergreen.is_visible());
    }
}
