//! Binary searches over sorted child lists
//!
//! Children of a node are kept sorted element-wise, starting at the first
//! element past the parent's own elements. All lookups below rely on that.

use std::cmp::Ordering;
use std::ops::Range;

use tracing::trace;

use super::node::NodeId;
use super::SparseTree;
use crate::token::Element;

impl<T> SparseTree<T> {
    /// Locate the deepest stored node whose token is `token` or a prefix of it.
    ///
    /// Returns the node and whether it matches `token` exactly. Without any
    /// stored prefix the root is returned. The result is remembered and used
    /// as the starting point of the next lookup when that lookup falls below it.
    pub(crate) fn find_closest_node(&self, token: &str, elements: &[Element]) -> (NodeId, bool) {
        let mut start = self.root;
        let mut element_index = 0;

        if let Some(cached) = self.closest_node_cache.get() {
            if let Some(node) = self.nodes.get(cached) {
                if node.parent.is_some()
                    && self.tokenizer.is_sub_item(token, &node.token)
                    && self.is_rooted(cached)
                {
                    trace!(cached = %node.token, token, "closest node cache hit");
                    if node.depth() == elements.len() {
                        return (cached, true);
                    }
                    start = cached;
                    element_index = node.depth();
                }
            }
        }

        let result = self.find_closest_node_from(elements, element_index, start);
        self.closest_node_cache.set(Some(result.0));
        result
    }

    fn find_closest_node_from(
        &self,
        elements: &[Element],
        mut element_index: usize,
        mut current: NodeId,
    ) -> (NodeId, bool) {
        'descend: loop {
            let children = &self.nodes[current].children;
            let (mut low, mut high) = (0, children.len());

            while low < high {
                let mid = low + (high - low) / 2;
                let child_id = children[mid];
                let child = &self.nodes[child_id];

                let mut index = element_index;
                let mut ordering;

                loop {
                    ordering = self
                        .tokenizer
                        .compare(&elements[index], &child.elements[index]);
                    if ordering != Ordering::Equal {
                        break;
                    }

                    if index == elements.len() - 1 && child.depth() == elements.len() {
                        return (child_id, true);
                    }

                    // The child is a proper prefix of the search token.
                    if child.depth() < elements.len() && index == child.depth() - 1 {
                        current = child_id;
                        element_index = index + 1;
                        continue 'descend;
                    }

                    index += 1;
                    if index == elements.len() {
                        break;
                    }
                }

                // The search token is a proper prefix of this child.
                if ordering == Ordering::Equal {
                    return (current, false);
                }

                if ordering == Ordering::Less {
                    high = mid;
                } else {
                    low = mid + 1;
                }
            }

            return (current, false);
        }
    }

    /// Follow parent links and report whether they end at this tree's root.
    fn is_rooted(&self, mut id: NodeId) -> bool {
        while let Some(parent) = self.nodes.get(id).and_then(|node| node.parent) {
            id = parent;
        }
        id == self.root
    }

    /// Position of the child of `parent` whose elements are `elements`.
    ///
    /// Same contract as `slice::binary_search`: `Err` carries the insertion
    /// point that keeps the children sorted.
    pub(crate) fn find_location(&self, elements: &[Element], parent: NodeId) -> Result<usize, usize> {
        let parent = &self.nodes[parent];
        let start = parent.depth();

        parent.children.binary_search_by(|&child_id| {
            let child = &self.nodes[child_id].elements;
            self.tokenizer
                .compare_by_elements(elements, child, start, child.len())
                .reverse()
        })
    }

    /// Range of children of `node`, at or after `floor`, whose first `length`
    /// elements equal those of `elements`.
    pub(crate) fn find_range(
        &self,
        elements: &[Element],
        length: usize,
        floor: usize,
        node: NodeId,
    ) -> Option<Range<usize>> {
        let node = &self.nodes[node];
        let children = node.children.get(floor..)?;
        let start_element = node.depth();

        let compare = |child_id: &NodeId| {
            self.tokenizer.compare_by_elements(
                elements,
                &self.nodes[*child_id].elements,
                start_element,
                length,
            )
        };

        let start = children.partition_point(|child| compare(child) == Ordering::Greater);
        if start == children.len() || compare(&children[start]) != Ordering::Equal {
            return None;
        }

        let end = start + children[start..].partition_point(|child| compare(child) == Ordering::Equal);
        Some(floor + start..floor + end)
    }

    /// Number of stored nodes in the subtree rooted at `id`, including `id`.
    pub(crate) fn count_subtree(&self, id: NodeId) -> usize {
        let mut count = 0;
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            count += 1;
            stack.extend_from_slice(&self.nodes[current].children);
        }

        count
    }
}
