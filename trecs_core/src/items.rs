//! Item catalog.

use crate::component::{Component, Matrix};

/// Name under which item attributes are exposed.
pub const ITEM_ATTRIBUTES: &str = "item_attributes";

/// The passive side of the loop: an `num_attributes × num_items` matrix.
///
/// Entries are either binary attribute membership or real values read as
/// membership probabilities.
#[derive(Debug, Clone)]
pub struct Items {
    attributes: Component,
}

impl Items {
    pub fn new(attributes: Matrix) -> Self {
        Self {
            attributes: Component::new(ITEM_ATTRIBUTES, attributes),
        }
    }

    pub fn num_items(&self) -> usize {
        self.attributes.value().ncols()
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.value().nrows()
    }

    pub fn attributes(&self) -> &Component {
        &self.attributes
    }

    /// Returns true when every entry is 0 or 1.
    pub fn is_binary(&self) -> bool {
        self.attributes.value().iter().all(|&v| v == 0.0 || v == 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_dimensions() {
        let items = Items::new(Matrix::zeros(4, 7));
        assert_eq!(items.num_attributes(), 4);
        assert_eq!(items.num_items(), 7);
        assert!(items.is_binary());
        assert_eq!(items.attributes().name(), ITEM_ATTRIBUTES);
    }

    #[test]
    fn test_items_real_valued() {
        let items = Items::new(Matrix::from_row_slice(1, 2, &[0.25, 1.0]));
        assert!(!items.is_binary());
    }
}
