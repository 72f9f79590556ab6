//! Root-ward walk

use std::borrow::Cow;

use super::{EnumParentsOptions, EnumeratedNode};
use crate::token::Element;
use crate::tree::{NodeId, SparseTree};
use crate::SparseTreeError;

/// Iterator over a token and its ancestors, closest first
///
/// The token does not need to be stored. Without
/// [`EnumParentsOptions::ENUMERATE_SPARSE_NODES`] only stored nodes are
/// yielded; with it every prefix of the token is, down to one element.
#[derive(Debug)]
pub struct EnumParents<'a, T> {
    tree: &'a SparseTree<T>,

    /// Canonical query token
    token: String,
    elements: Vec<Element>,
    options: EnumParentsOptions,

    /// Next stored node to yield; `None` once the root is reached
    current: Option<NodeId>,

    /// Whether the query token itself is stored
    is_specified_node: bool,

    /// Sticky: set once any yielded position had stored descendants
    has_children: bool,

    /// Element count of the next sparse position
    enum_token_length: usize,
}

impl<'a, T> EnumParents<'a, T> {
    pub(crate) fn new(
        tree: &'a SparseTree<T>,
        token: &str,
        options: EnumParentsOptions,
    ) -> Result<Self, SparseTreeError> {
        let (token, elements) = tree.tokenizer().tokenize(token)?;
        let (closest, is_specified_node) = tree.find_closest_node(token, &elements);

        Ok(Self {
            tree,
            token: token.to_string(),
            enum_token_length: elements.len(),
            elements,
            options,
            current: Some(closest),
            is_specified_node,
            has_children: false,
        })
    }

    /// Values of the stored nodes, closest first
    pub fn values(self) -> impl Iterator<Item = &'a T> {
        self.filter_map(|node| node.value)
    }

    fn sparse_node(&mut self, id: NodeId) -> EnumeratedNode<'a, T> {
        let tree = self.tree;
        let token = tree
            .tokenizer()
            .partial_token(&self.token, self.enum_token_length)
            .to_string();
        let mut item = EnumeratedNode::sparse(Cow::Owned(token));

        if self.options.contains(EnumParentsOptions::INCLUDE_ADDITIONAL_DATA) {
            // Until something below was found, check whether the current
            // stored node has children under this sparse position.
            if !self.has_children && tree.node(id).has_children() {
                self.has_children = tree
                    .find_range(&self.elements, self.enum_token_length, 0, id)
                    .is_some();
            }

            item.has_children = self.has_children;
            if !self.has_children {
                item.no_children_below = Some(item.token.clone());
            }
        }

        self.enum_token_length -= 1;
        item
    }

    fn stored_node(&mut self, id: NodeId) -> EnumeratedNode<'a, T> {
        let tree = self.tree;
        let node = tree.node(id);
        let mut item = EnumeratedNode::stored(node, false);

        if self.options.contains(EnumParentsOptions::INCLUDE_ADDITIONAL_DATA) {
            if !self.has_children {
                self.has_children = node.has_children();

                // First stored node with children, reached from a query token
                // that isn't stored: find how far down the query path the
                // children reach.
                if self.has_children && !self.is_specified_node {
                    item.no_children_below = self.narrow_no_children_below(id).map(Cow::Owned);
                }
            }

            item.has_children = self.has_children;
            if item.no_children_below.is_none() && !self.has_children {
                item.no_children_below = Some(Cow::Borrowed(&node.token));
            }
        }

        self.enum_token_length = self.enum_token_length.saturating_sub(1);
        item
    }

    /// Shortest prefix of the query token with no stored node below it, or
    /// `None` when some child of `id` lies below the query token itself.
    fn narrow_no_children_below(&self, id: NodeId) -> Option<String> {
        let mut count = self.tree.node(id).depth();
        let mut floor = 0;

        loop {
            if count >= self.elements.len() {
                return None;
            }

            count += 1;
            match self.tree.find_range(&self.elements, count, floor, id) {
                Some(range) => floor = range.start,
                None => break,
            }
        }

        Some(self.tree.tokenizer().partial_token(&self.token, count).to_string())
    }
}

impl<'a, T> Iterator for EnumParents<'a, T> {
    type Item = EnumeratedNode<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let tree = self.tree;
        let node = tree.node(id);

        if self.options.contains(EnumParentsOptions::ENUMERATE_SPARSE_NODES)
            && node.depth() < self.enum_token_length
        {
            return Some(self.sparse_node(id));
        }

        // The root is never yielded
        let Some(parent) = node.parent else {
            self.current = None;
            return None;
        };

        let item = self.stored_node(id);
        self.current = Some(parent);
        Some(item)
    }
}

impl<T> std::iter::FusedIterator for EnumParents<'_, T> {}
