//! Streaming enumeration over a [`SparseTree`](crate::SparseTree)
//!
//! Two walks are provided:
//! - [`EnumParents`]: from a token up towards the root
//! - [`EnumSubTree`]: depth-first below a token
//!
//! Both yield [`EnumeratedNode`]s and can synthesize the sparse positions
//! between stored nodes. Enumerators hold a shared borrow of the tree, so the
//! tree cannot change underneath them.

mod parents;
mod subtree;

use std::borrow::Cow;

use bitflags::bitflags;

use crate::tree::Node;

pub use parents::EnumParents;
pub use subtree::EnumSubTree;

bitflags! {
    /// Options for [`SparseTree::enum_parents`](crate::SparseTree::enum_parents)
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EnumParentsOptions: u32 {
        /// Also yield the unstored positions between stored ancestors
        const ENUMERATE_SPARSE_NODES  = 1 << 0;
        /// Fill in `has_children` and `no_children_below`
        const INCLUDE_ADDITIONAL_DATA = 1 << 1;
    }
}

bitflags! {
    /// Options for [`SparseTree::enum_sub_tree`](crate::SparseTree::enum_sub_tree)
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EnumSubTreeOptions: u32 {
        /// Also yield the unstored positions on the way to stored descendants
        const ENUMERATE_SPARSE_NODES  = 1 << 0;
        /// Yield the starting token itself first
        const ENUMERATE_SUB_TREE_ROOT = 1 << 1;
        /// Fill in `has_children` and `no_children_below`
        const INCLUDE_ADDITIONAL_DATA = 1 << 2;
    }
}

impl Default for EnumParentsOptions {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for EnumSubTreeOptions {
    fn default() -> Self {
        Self::empty()
    }
}

/// One enumerated position
///
/// Stored nodes carry their value; sparse positions have none. The two
/// trailing fields are only filled in when additional data was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EnumeratedNode<'a, T> {
    /// Token at this position
    pub token: Cow<'a, str>,

    /// Stored value, `None` for a sparse position
    pub value: Option<&'a T>,

    /// Whether anything is stored below this position. During a parent walk
    /// this stays `true` once any yielded position had stored descendants.
    pub has_children: bool,

    /// Shortest token on the path to this position with nothing stored below
    /// it, or `None` when stored descendants exist. Without descendants this
    /// is the position's own token, except in a parent walk from an unstored
    /// token, where it can be a shorter prefix of that token.
    pub no_children_below: Option<Cow<'a, str>>,
}

impl<'a, T> EnumeratedNode<'a, T> {
    /// Whether this position is synthesized rather than stored
    pub fn is_sparse(&self) -> bool {
        self.value.is_none()
    }

    pub(crate) fn sparse(token: Cow<'a, str>) -> Self {
        Self {
            token,
            value: None,
            has_children: false,
            no_children_below: None,
        }
    }

    /// A stored node, with its own child state when `additional` is set
    pub(crate) fn stored(node: &'a Node<T>, additional: bool) -> Self {
        let mut item = Self {
            token: Cow::Borrowed(&node.token),
            value: node.value.as_ref(),
            has_children: false,
            no_children_below: None,
        };

        if additional {
            item.has_children = node.has_children();
            if !item.has_children {
                item.no_children_below = Some(Cow::Borrowed(&node.token));
            }
        }

        item
    }
}
