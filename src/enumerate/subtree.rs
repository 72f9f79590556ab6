//! Depth-first walk below a token

use std::borrow::Cow;
use std::ops::Range;

use super::{EnumSubTreeOptions, EnumeratedNode};
use crate::token::Element;
use crate::tree::{NodeId, SparseTree};
use crate::SparseTreeError;

#[derive(Debug, Clone, Copy)]
enum State {
    /// Popping the node stack
    Normal,

    /// Yielding the sparse positions above this node before the node itself
    SparseNodes(NodeId),
}

/// Depth-first iterator over the stored descendants of a token
///
/// Siblings come out in sorted order, each followed by its own subtree. The
/// token does not need to be stored; its stored descendants are still found.
#[derive(Debug)]
pub struct EnumSubTree<'a, T> {
    tree: &'a SparseTree<T>,

    /// Elements of the starting token; empty for a whole-tree walk
    elements: Vec<Element>,
    options: EnumSubTreeOptions,

    /// Maximum element distance below the starting token
    depth: usize,

    /// Starting position, yielded before anything else
    initial: Option<EnumeratedNode<'a, T>>,

    /// Nodes still to visit; the next one is on top
    stack: Vec<NodeId>,
    state: State,

    /// Node to yield once any sparse positions above it are out
    current_node: Option<NodeId>,

    /// Elements already emitted of the sparse positions above the node in
    /// [`State::SparseNodes`]
    next_sparse_token_count: usize,

    /// Last node taken off the stack. Every prefix it shares with the next
    /// one has already been emitted.
    prev_child_node: Option<NodeId>,
}

impl<'a, T> EnumSubTree<'a, T> {
    pub(crate) fn new(
        tree: &'a SparseTree<T>,
        token: Option<&str>,
        options: EnumSubTreeOptions,
        depth: usize,
    ) -> Result<Self, SparseTreeError> {
        let additional = options.contains(EnumSubTreeOptions::INCLUDE_ADDITIONAL_DATA);

        let mut walk = Self {
            tree,
            elements: Vec::new(),
            options,
            depth,
            initial: None,
            stack: Vec::new(),
            state: State::Normal,
            current_node: None,
            next_sparse_token_count: 0,
            prev_child_node: None,
        };

        let Some(token) = token else {
            let root = tree.root_id();
            if depth > 0 {
                walk.push_children(root, 0..tree.node(root).children.len());
            }
            return Ok(walk);
        };

        let (token, elements) = tree.tokenizer().tokenize(token)?;
        let (start, is_specified_node) = tree.find_closest_node(token, &elements);
        let node = tree.node(start);

        if is_specified_node {
            if options.contains(EnumSubTreeOptions::ENUMERATE_SUB_TREE_ROOT) {
                walk.initial = Some(EnumeratedNode::stored(node, additional));
            }

            if depth > 0 {
                walk.push_children(start, 0..node.children.len());
            }
        } else if node.has_children() {
            // Stored descendants of an unstored token sit among the children
            // of its closest stored ancestor.
            if let Some(range) = tree.find_range(&elements, elements.len(), 0, start) {
                let sparse_root =
                    EnumSubTreeOptions::ENUMERATE_SUB_TREE_ROOT | EnumSubTreeOptions::ENUMERATE_SPARSE_NODES;

                if options.contains(sparse_root) {
                    let mut item = EnumeratedNode::sparse(Cow::Owned(token.to_string()));
                    item.has_children = additional;
                    walk.initial = Some(item);
                }

                if depth > 0 {
                    walk.push_children(start, range);
                }
            }
        }

        walk.elements = elements;
        Ok(walk)
    }

    /// Values of the stored nodes, in walk order
    pub fn values(self) -> impl Iterator<Item = &'a T> {
        self.filter_map(|node| node.value)
    }

    fn push_children(&mut self, id: NodeId, range: Range<usize>) {
        let children = &self.tree.node(id).children[range];
        self.stack.extend(children.iter().rev().copied());
    }

    /// Elements of `id` below the starting token
    fn relative_depth(&self, id: NodeId) -> usize {
        self.tree.node(id).depth().saturating_sub(self.elements.len())
    }

    /// Pop until a node within depth turns up, or switch to sparse output for
    /// a popped node with unemitted positions above it. Returns whether the
    /// state changed.
    fn pop_next(&mut self) -> bool {
        let tree = self.tree;
        let sparse = self.options.contains(EnumSubTreeOptions::ENUMERATE_SPARSE_NODES);

        while self.current_node.is_none() {
            let Some(popped) = self.stack.pop() else {
                break;
            };
            let node = tree.node(popped);

            if sparse {
                // An unstored starting token can be deeper than the parent.
                let parent_depth = node.parent.map_or(0, |parent| tree.node(parent).depth());
                let shared = self.prev_child_node.map_or(0, |prev| {
                    tree.tokenizer()
                        .common_element_count(&tree.node(prev).elements, &node.elements, 0)
                });
                let common = parent_depth.max(self.elements.len()).max(shared);

                if common + 1 < node.depth() {
                    self.next_sparse_token_count = common;
                    self.state = State::SparseNodes(popped);
                    return true;
                }
            }

            self.prev_child_node = Some(popped);
            if self.relative_depth(popped) <= self.depth {
                self.current_node = Some(popped);
            }
        }

        false
    }
}

impl<'a, T> Iterator for EnumSubTree<'a, T> {
    type Item = EnumeratedNode<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        let tree = self.tree;
        let additional = self.options.contains(EnumSubTreeOptions::INCLUDE_ADDITIONAL_DATA);

        loop {
            match self.state {
                State::SparseNodes(id) => {
                    let node = tree.node(id);
                    let next_count = self.next_sparse_token_count + 1;

                    if next_count < node.depth()
                        && next_count.saturating_sub(self.elements.len()) <= self.depth
                    {
                        self.next_sparse_token_count = next_count;
                        let token = tree.tokenizer().partial_token(&node.token, next_count);

                        let mut item = EnumeratedNode::sparse(Cow::Borrowed(token));
                        // Always on the way to a stored node
                        item.has_children = additional;
                        return Some(item);
                    }

                    self.prev_child_node = Some(id);
                    if self.relative_depth(id) <= self.depth {
                        self.current_node = Some(id);
                    }
                    self.state = State::Normal;
                }
                State::Normal => {
                    if self.pop_next() {
                        continue;
                    }

                    let id = self.current_node.take()?;
                    let node = tree.node(id);

                    if self.relative_depth(id) < self.depth && node.has_children() {
                        self.push_children(id, 0..node.children.len());
                    }

                    return Some(EnumeratedNode::stored(node, additional));
                }
            }
        }
    }
}

impl<T> std::iter::FusedIterator for EnumSubTree<'_, T> {}
