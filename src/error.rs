//! Error types shared by the trees and the planner.

use thiserror::Error;

/// Errors that can occur when mutating or querying a tree.
///
/// A failed operation leaves the structure it was called on unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Lookup or delete of a key that is not in the tree.
    #[error("key not found")]
    KeyNotFound,

    /// Insert of a key that is already in an order statistics tree.
    #[error("duplicate key")]
    DuplicateKey,

    /// Removal of an item that is not in a percentile store.
    #[error("item not found")]
    ItemNotFound,

    /// Insert of an item that is already in a percentile store.
    #[error("duplicate item")]
    DuplicateItem,

    /// A structural invariant does not hold.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, Error>;
