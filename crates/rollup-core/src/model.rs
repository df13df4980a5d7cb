//! Plain records loaded from the input tables.
//!
//! Categories are identified by their key string only; their place in the
//! hierarchy is purely structural and lives in
//! [`CategoryGraph`](crate::hierarchy::CategoryGraph).

use serde::Serialize;

/// A `(child, parent)` pair: `child` is a direct sub-category of `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CategoryEdge {
    pub child: String,
    pub parent: String,
}

impl CategoryEdge {
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }
}

impl<C: Into<String>, P: Into<String>> From<(C, P)> for CategoryEdge {
    fn from((child, parent): (C, P)) -> Self {
        Self::new(child, parent)
    }
}

/// A catalog entry attached to its most specific category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: String,
    pub category: String,
    pub price: f64,
}

impl Product {
    pub fn new(id: impl Into<String>, category: impl Into<String>, price: f64) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            price,
        }
    }
}

/// A product together with its resolved top-level ancestor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedProduct {
    pub product: Product,
    pub top_ancestor: String,
}

/// One row of the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub product_id: String,
    pub quantity: f64,
}

impl Transaction {
    pub fn new(product_id: impl Into<String>, quantity: f64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }

    /// Transaction value: `quantity × price`.
    #[must_use]
    pub fn value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}
