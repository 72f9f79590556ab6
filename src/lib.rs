//! # Sparse path trees
//!
//! A [`SparseTree`] maps hierarchical tokens such as `$/Project/src/main.rs`
//! to values. Only the tokens that were actually added get a node: a node's
//! children are its nearest stored descendants, however many path elements
//! below it they sit.
//!
//! ## Core Operations
//!
//! 1. **Closest-node lookup**: binary search per level, restarted from the
//!    previous lookup's node when the new token falls below it
//! 2. **Reparenting**: an insert adopts the stored descendants of the new
//!    token; a remove hands its children back to its parent
//! 3. **Streaming enumeration**: parent chains and depth-bounded subtrees,
//!    optionally synthesizing the unstored (sparse) positions in between
//!
//! ## Usage Example
//!
//! ```
//! use sparsetree::{EnumSubTreeOptions, SparseTree};
//!
//! let mut tree = SparseTree::with_separator('/')?;
//! tree.add("$/A", 1)?;
//! tree.add("$/A/B/C", 2)?;
//!
//! assert_eq!(tree.get_closest("$/A/B"), Some(&1));
//!
//! let tokens: Vec<String> = tree
//!     .enum_sub_tree(Some("$/A"), EnumSubTreeOptions::ENUMERATE_SPARSE_NODES, usize::MAX)?
//!     .map(|node| node.token.into_owned())
//!     .collect();
//! assert_eq!(tokens, ["$/A/B", "$/A/B/C"]);
//! # Ok::<(), sparsetree::SparseTreeError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod enumerate; // Parent and subtree enumerators
pub mod token; // Token splitting and comparison
pub mod tree; // The tree itself

pub use enumerate::{EnumParents, EnumParentsOptions, EnumSubTree, EnumSubTreeOptions, EnumeratedNode};
pub use token::{Element, TokenComparison, TokenPolicy, Tokenizer};
pub use tree::SparseTree;

use thiserror::Error;

/// Errors returned by tree operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparseTreeError {
    /// Neither (or both) of a separator and a positive fixed element length
    #[error("exactly one of a token separator or a positive fixed element length is required")]
    InvalidSplitPolicy,

    /// Token already stored and overwriting was not requested
    #[error("token already present: {token}")]
    DuplicateKey {
        /// Canonical token
        token: String,
    },

    /// Token not stored
    #[error("token not found: {token}")]
    KeyNotFound {
        /// Canonical token
        token: String,
    },

    /// Token too short to hold one fixed-length element
    #[error("token holds no complete element")]
    EmptyToken,
}

/// Construction parameters for a [`SparseTree`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeConfig {
    /// Element separator
    pub separator: Option<char>,

    /// Characters per element, for separator-less tokens
    pub fixed_element_length: Option<usize>,

    /// Compare elements ordinally instead of ignoring case
    pub case_sensitive: bool,
}

impl TreeConfig {
    /// `separator`-delimited tokens, case-insensitive
    pub fn separated(separator: char) -> Self {
        Self {
            separator: Some(separator),
            fixed_element_length: None,
            case_sensitive: false,
        }
    }

    /// Tokens of `length`-character elements, case-insensitive
    pub fn fixed_length(length: usize) -> Self {
        Self {
            separator: None,
            fixed_element_length: Some(length),
            case_sensitive: false,
        }
    }

    /// Element comparison implied by `case_sensitive`
    pub fn comparison(&self) -> TokenComparison {
        if self.case_sensitive {
            TokenComparison::Ordinal
        } else {
            TokenComparison::OrdinalIgnoreCase
        }
    }

    /// Create an empty tree with this configuration
    pub fn build<T>(&self) -> Result<SparseTree<T>, SparseTreeError> {
        SparseTree::new(self.separator, self.fixed_element_length, self.comparison())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::separated('/')
    }
}
