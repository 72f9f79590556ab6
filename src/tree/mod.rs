//! Path-indexed sparse tree
//!
//! Stores values under hierarchical tokens without materializing every
//! intermediate path. A node's children are the nearest stored descendants,
//! so a child may sit several elements below its parent. Those gaps are the
//! sparse region; enumerations can synthesize nodes for them on request.
//!
//! Every lookup walks down from the root (or from the last lookup's result,
//! when the new token falls below it) with a binary search per level.

mod node;
mod search;

use std::cell::Cell;

use tracing::debug;

use crate::enumerate::{EnumParents, EnumParentsOptions, EnumSubTree, EnumSubTreeOptions, EnumeratedNode};
use crate::token::{Element, TokenComparison, TokenPolicy, Tokenizer};
use crate::SparseTreeError;

pub(crate) use node::{Node, NodeId};
use node::NodeArena;

/// Sparse tree mapping path tokens to values
///
/// Enumerations borrow the tree, so it cannot be modified while one is alive.
/// The closest-node cache uses a [`Cell`]: the tree may move between threads
/// but is not `Sync`.
#[derive(Debug)]
pub struct SparseTree<T> {
    /// Node storage
    nodes: NodeArena<T>,

    /// Synthetic root: empty token, no elements, no value
    root: NodeId,

    /// Splitting policy and element ordering
    tokenizer: Tokenizer,

    /// Number of stored (token, value) pairs
    count: usize,

    /// Result of the last closest-node lookup
    closest_node_cache: Cell<Option<NodeId>>,
}

impl<T> SparseTree<T> {
    /// Tree over `separator`-delimited tokens, compared case-insensitively
    pub fn with_separator(separator: char) -> Result<Self, SparseTreeError> {
        Self::new(Some(separator), None, TokenComparison::default())
    }

    /// Tree over tokens made of `length`-character elements, compared
    /// case-insensitively
    pub fn with_fixed_length(length: usize) -> Result<Self, SparseTreeError> {
        Self::new(None, Some(length), TokenComparison::default())
    }

    /// Create a tree. Exactly one of `separator` and `fixed_element_length`
    /// must be given, and a fixed length must be positive.
    pub fn new(
        separator: Option<char>,
        fixed_element_length: Option<usize>,
        comparison: TokenComparison,
    ) -> Result<Self, SparseTreeError> {
        let policy = TokenPolicy::from_parts(separator, fixed_element_length)?;
        Ok(Self::with_tokenizer(Tokenizer::new(policy, comparison)))
    }

    /// Create a tree from an existing tokenizer
    pub fn with_tokenizer(tokenizer: Tokenizer) -> Self {
        let mut nodes = NodeArena::new();
        let root = nodes.insert(Node::new("", Vec::new(), None));

        Self {
            nodes,
            root,
            tokenizer,
            count: 0,
            closest_node_cache: Cell::new(None),
        }
    }

    /// Store `value` under `token`; fails if the token is already present
    pub fn add(&mut self, token: &str, value: T) -> Result<(), SparseTreeError> {
        self.add_with(token, value, false)
    }

    /// Store `value` under `token`, replacing any existing value
    pub fn set(&mut self, token: &str, value: T) -> Result<(), SparseTreeError> {
        self.add_with(token, value, true)
    }

    /// Store `value` under `token`.
    ///
    /// An existing value is replaced when `overwrite` is set and otherwise
    /// left untouched with [`SparseTreeError::DuplicateKey`] returned.
    pub fn add_with(&mut self, token: &str, value: T, overwrite: bool) -> Result<(), SparseTreeError> {
        let (token, elements) = self.tokenizer.tokenize(token)?;
        let (closest, exact) = self.find_closest_node(token, &elements);

        if !exact {
            self.insert_node(closest, Node::new(token, elements, Some(value)));
            return Ok(());
        }

        if !overwrite {
            return Err(SparseTreeError::DuplicateKey {
                token: token.to_string(),
            });
        }

        self.nodes[closest].value = Some(value);
        Ok(())
    }

    /// Read-modify-write with a single lookup.
    ///
    /// `update` receives the canonical token and the current value (taken out
    /// of the tree), and returns the value to store. Missing tokens are
    /// inserted.
    pub fn modify_in_place<F>(&mut self, token: &str, update: F) -> Result<(), SparseTreeError>
    where
        F: FnOnce(&str, Option<T>) -> T,
    {
        let (token, elements) = self.tokenizer.tokenize(token)?;
        let (closest, exact) = self.find_closest_node(token, &elements);

        if exact {
            let node = &mut self.nodes[closest];
            let current = node.value.take();
            node.value = Some(update(token, current));
        } else {
            let value = update(token, None);
            self.insert_node(closest, Node::new(token, elements, Some(value)));
        }

        Ok(())
    }

    /// Remove `token`.
    ///
    /// With `remove_children` the whole subtree goes too, and this also
    /// applies when `token` itself was never stored: every stored token below
    /// it is removed. Without it, the children of a removed node move up to
    /// its parent. Returns whether anything was removed.
    pub fn remove(&mut self, token: &str, remove_children: bool) -> Result<bool, SparseTreeError> {
        let (token, elements) = self.tokenizer.tokenize(token)?;
        let (closest, exact) = self.find_closest_node(token, &elements);

        if exact {
            return Ok(self.remove_node(closest, remove_children));
        }

        if !remove_children {
            return Ok(false);
        }

        let Some(range) = self.find_range(&elements, elements.len(), 0, closest) else {
            return Ok(false);
        };

        let detached: Vec<NodeId> = self.nodes[closest].children.drain(range).collect();
        let removed: usize = detached.iter().map(|&id| self.free_subtree(id)).sum();
        self.count -= removed;
        debug_assert_eq!(self.nodes.len(), self.count + 1);

        debug!(token, removed, "removed sparse subtree");
        Ok(true)
    }

    /// Value stored under `token`
    pub fn get(&self, token: &str) -> Option<&T> {
        self.get_with(token, true)
    }

    /// Value stored under `token`, or under its closest stored ancestor
    pub fn get_closest(&self, token: &str) -> Option<&T> {
        self.get_with(token, false)
    }

    /// Value lookup. Without `exact_match` the closest stored ancestor's value
    /// is returned when `token` is absent.
    ///
    /// Tokens the tree cannot split are never present.
    pub fn get_with(&self, token: &str, exact_match: bool) -> Option<&T> {
        let (token, elements) = self.tokenizer.tokenize(token).ok()?;
        let (closest, exact) = self.find_closest_node(token, &elements);

        if !exact && (exact_match || closest == self.root) {
            return None;
        }

        self.nodes[closest].value.as_ref()
    }

    /// Whether a value is stored under exactly `token`
    pub fn contains_key(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    /// Drop every stored token
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = self.nodes.insert(Node::new("", Vec::new(), None));
        self.count = 0;
        self.closest_node_cache.set(None);
        debug!("cleared sparse tree");
    }

    /// Direct stored children of `token`, or of the root for `None`.
    ///
    /// An empty token names the root too, unless `""` is itself stored.
    ///
    /// These are the nearest stored descendants, not necessarily one element
    /// below. For one-level listings including sparse positions use
    /// [`SparseTree::enum_sub_tree`] with a depth of 1.
    pub fn enum_children(&self, token: Option<&str>) -> Result<Vec<(&str, &T)>, SparseTreeError> {
        let node = match token {
            None => self.root,
            Some(token) => match self.tokenizer.tokenize(token) {
                Err(SparseTreeError::EmptyToken) if token.is_empty() => self.root,
                Err(err) => return Err(err),
                Ok((token, elements)) => {
                    let (closest, exact) = self.find_closest_node(token, &elements);
                    if exact {
                        closest
                    } else if token.is_empty() {
                        self.root
                    } else {
                        return Err(SparseTreeError::KeyNotFound {
                            token: token.to_string(),
                        });
                    }
                }
            },
        };

        Ok(self.nodes[node]
            .children
            .iter()
            .filter_map(|&id| {
                let child = &self.nodes[id];
                child.value.as_ref().map(|value| (&*child.token, value))
            })
            .collect())
    }

    /// Stored tokens with no stored ancestor, in sorted order
    pub fn enum_roots(&self) -> Vec<EnumeratedNode<'_, T>> {
        self.nodes[self.root]
            .children
            .iter()
            .map(|&id| {
                let node = &self.nodes[id];
                EnumeratedNode {
                    token: (&*node.token).into(),
                    value: node.value.as_ref(),
                    has_children: node.has_children(),
                    no_children_below: None,
                }
            })
            .collect()
    }

    /// Values of [`SparseTree::enum_roots`]
    pub fn root_values(&self) -> impl Iterator<Item = &T> + '_ {
        self.nodes[self.root]
            .children
            .iter()
            .filter_map(|&id| self.nodes[id].value.as_ref())
    }

    /// Walk from `token` (stored or not) towards the root, closest first.
    ///
    /// The root itself is never yielded.
    pub fn enum_parents(
        &self,
        token: &str,
        options: EnumParentsOptions,
    ) -> Result<EnumParents<'_, T>, SparseTreeError> {
        EnumParents::new(self, token, options)
    }

    /// Depth-first walk below `token`, or over the whole tree for `None`.
    ///
    /// `depth` bounds the walk in elements below `token`; `usize::MAX` means
    /// unbounded.
    pub fn enum_sub_tree(
        &self,
        token: Option<&str>,
        options: EnumSubTreeOptions,
        depth: usize,
    ) -> Result<EnumSubTree<'_, T>, SparseTreeError> {
        EnumSubTree::new(self, token, options, depth)
    }

    /// Number of stored (token, value) pairs
    pub fn count(&self) -> usize {
        self.count
    }

    /// Alias of [`SparseTree::count`]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Separator, when tokens are separated
    pub fn token_separator(&self) -> Option<char> {
        match self.tokenizer.policy() {
            TokenPolicy::Separator(separator) => Some(separator),
            TokenPolicy::FixedLength(_) => None,
        }
    }

    /// Element length, when tokens have fixed-length elements
    pub fn fixed_element_length(&self) -> Option<usize> {
        match self.tokenizer.policy() {
            TokenPolicy::Separator(_) => None,
            TokenPolicy::FixedLength(length) => Some(length),
        }
    }

    /// Whether `item` equals or lies below `parent`, textually
    pub fn is_sub_item(&self, item: &str, parent: &str) -> bool {
        self.tokenizer.is_sub_item(item, parent)
    }

    pub(crate) fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub(crate) fn root_id(&self) -> NodeId {
        self.root
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node<T> {
        &self.nodes[id]
    }

    /// Link a new node under `parent`, adopting the parent's children that
    /// fall below it.
    fn insert_node(&mut self, parent: NodeId, node: Node<T>) {
        let child = self.nodes.insert(node);
        self.attach(parent, child);

        let start = self.nodes[parent].depth();
        let child_count = self.nodes[parent].children.len();
        let child_elements = self.nodes[child].elements.clone();

        let insert_index = match self.nodes[parent].children.last() {
            None => 0,
            Some(&last) => {
                let last = &self.nodes[last].elements;
                // Appending in sorted order is the common case.
                if self
                    .tokenizer
                    .compare_by_elements(&child_elements, last, start, last.len())
                    .is_gt()
                {
                    child_count
                } else {
                    self.find_location(&child_elements, parent)
                        .unwrap_or_else(|index| index)
                }
            }
        };

        let mut adopted = 0;
        if insert_index < child_count {
            let next = self.nodes[parent].children[insert_index];
            let extends_child = self
                .tokenizer
                .compare_by_elements(
                    &child_elements,
                    &self.nodes[next].elements,
                    start,
                    child_elements.len(),
                )
                .is_eq();

            if extends_child {
                if let Some(range) =
                    self.find_range(&child_elements, child_elements.len(), insert_index, parent)
                {
                    let moved: Vec<NodeId> = self.nodes[parent].children.drain(range).collect();
                    for &id in &moved {
                        self.attach(child, id);
                    }
                    adopted = moved.len();
                    self.nodes[child].children = moved;
                }
            }
        }

        self.nodes[parent].children.insert(insert_index, child);
        self.count += 1;
        debug_assert_eq!(self.nodes.len(), self.count + 1);

        debug!(token = %self.nodes[child].token, adopted, "inserted node");
    }

    /// Unlink `id` from its parent. Its children either move up to the parent
    /// or are freed along with it.
    fn remove_node(&mut self, id: NodeId, remove_children: bool) -> bool {
        let Some(parent) = self.nodes[id].parent else {
            return false;
        };

        let elements = self.nodes[id].elements.clone();
        let Ok(index) = self.find_location(&elements, parent) else {
            return false;
        };
        self.nodes[parent].children.remove(index);

        if remove_children {
            let removed = self.free_subtree(id);
            self.count -= removed;
            debug!(removed, "removed node with children");
            return true;
        }

        let Some(mut node) = self.nodes.remove(id) else {
            return false;
        };
        node.parent = None;

        let orphans = std::mem::take(&mut node.children);
        if let Some(&first) = orphans.first() {
            let first_elements = self.nodes[first].elements.clone();
            let insert_index = self
                .find_location(&first_elements, parent)
                .unwrap_or_else(|index| index);

            for &orphan in &orphans {
                self.attach(parent, orphan);
            }
            self.nodes[parent]
                .children
                .splice(insert_index..insert_index, orphans);
        }

        self.count -= 1;
        debug_assert_eq!(self.nodes.len(), self.count + 1);
        debug!(token = %node.token, "removed node");
        true
    }

    /// Free a detached subtree and return how many nodes it held.
    fn free_subtree(&mut self, id: NodeId) -> usize {
        let removed = self.count_subtree(id);
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if let Some(mut node) = self.nodes.remove(current) {
                node.parent = None;
                stack.append(&mut node.children);
            }
        }

        removed
    }

    /// Point `child` at `parent` and share the parent's leading elements.
    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let shared: Vec<Element> = self.nodes[parent].elements.clone();
        let node = &mut self.nodes[child];
        node.parent = Some(parent);
        for (slot, element) in node.elements.iter_mut().zip(shared) {
            *slot = element;
        }
    }
}

impl<T> Default for SparseTree<T> {
    /// `/`-separated tokens compared case-insensitively
    fn default() -> Self {
        Self::with_tokenizer(Tokenizer::new(
            TokenPolicy::Separator('/'),
            TokenComparison::default(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> SparseTree<&'static str> {
        SparseTree::with_separator('/').unwrap()
    }

    fn root_tokens(tree: &SparseTree<&'static str>) -> Vec<String> {
        tree.enum_roots()
            .into_iter()
            .map(|node| node.token.into_owned())
            .collect()
    }

    #[test]
    fn test_construction_requires_split_policy() {
        assert!(matches!(
            SparseTree::<u32>::new(None, None, TokenComparison::Ordinal),
            Err(SparseTreeError::InvalidSplitPolicy)
        ));
        assert!(SparseTree::<u32>::with_fixed_length(0).is_err());
        assert_eq!(SparseTree::<u32>::with_fixed_length(4).unwrap().fixed_element_length(), Some(4));
        assert_eq!(SparseTree::<u32>::default().token_separator(), Some('/'));
    }

    #[test]
    fn test_insert_reparents_existing_descendants() {
        let mut tree = tree();
        tree.add("$/A/B/C", "c").unwrap();
        tree.add("$/A/B/D", "d").unwrap();
        tree.add("$/X", "x").unwrap();
        assert_eq!(root_tokens(&tree), vec!["$/A/B/C", "$/A/B/D", "$/X"]);

        tree.add("$/A", "a").unwrap();
        assert_eq!(root_tokens(&tree), vec!["$/A", "$/X"]);

        let children: Vec<&str> = tree
            .enum_children(Some("$/A"))
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect();
        assert_eq!(children, vec!["$/A/B/C", "$/A/B/D"]);
        assert_eq!(tree.count(), 4);
    }

    #[test]
    fn test_children_share_parent_elements() {
        let mut tree = tree();
        tree.add("$/A/B", "b").unwrap();
        tree.add("$/a", "a").unwrap();

        let root = tree.root_id();
        let parent = tree.node(root).children[0];
        let child = tree.node(parent).children[0];
        assert!(std::sync::Arc::ptr_eq(
            &tree.node(parent).elements[1],
            &tree.node(child).elements[1]
        ));
        // The child's own token text is untouched
        assert_eq!(&*tree.node(child).token, "$/A/B");
    }

    #[test]
    fn test_remove_without_children_moves_them_up() {
        let mut tree = tree();
        tree.add("$/A", "a").unwrap();
        tree.add("$/A/B", "b").unwrap();
        tree.add("$/A/B/C", "c").unwrap();
        tree.add("$/A/B/D", "d").unwrap();
        tree.add("$/A/Z", "z").unwrap();

        assert!(tree.remove("$/A/B", false).unwrap());
        assert_eq!(tree.count(), 4);

        let children: Vec<&str> = tree
            .enum_children(Some("$/A"))
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect();
        assert_eq!(children, vec!["$/A/B/C", "$/A/B/D", "$/A/Z"]);
    }

    #[test]
    fn test_stale_cache_after_remove() {
        let mut tree = tree();
        tree.add("$/A", "a").unwrap();
        tree.add("$/A/B", "b").unwrap();

        // Prime the cache with $/A/B, then unlink it
        assert_eq!(tree.get("$/A/B"), Some(&"b"));
        assert!(tree.remove("$/A/B", true).unwrap());

        assert_eq!(tree.get("$/A/B/C"), None);
        assert_eq!(tree.get_closest("$/A/B/C"), Some(&"a"));

        tree.add("$/A/B/C", "c").unwrap();
        assert_eq!(tree.get("$/A/B/C"), Some(&"c"));
        assert_eq!(tree.count(), 2);
    }

    #[test]
    fn test_cache_descends_from_previous_lookup() {
        let mut tree = tree();
        tree.add("$/A", "a").unwrap();
        tree.add("$/A/B", "b").unwrap();
        tree.add("$/A/B/C", "c").unwrap();
        tree.add("$/A/B/D", "d").unwrap();

        assert_eq!(tree.get("$/A/B"), Some(&"b"));
        assert_eq!(tree.get("$/A/B/D"), Some(&"d"));
        assert_eq!(tree.get("$/A/B/C"), Some(&"c"));
        assert_eq!(tree.get("$/A/Q"), None);
        assert_eq!(tree.get_closest("$/A/B/E"), Some(&"b"));
    }

    #[test]
    fn test_modify_in_place() {
        let mut tree: SparseTree<u32> = SparseTree::with_separator('/').unwrap();
        tree.modify_in_place("$/A", |token, current| {
            assert_eq!(token, "$/A");
            assert_eq!(current, None);
            1
        })
        .unwrap();
        tree.modify_in_place("$/A/", |_, current| current.unwrap_or(0) + 10)
            .unwrap();

        assert_eq!(tree.get("$/A"), Some(&11));
        assert_eq!(tree.count(), 1);
    }

    #[test]
    fn test_clear_resets_count_and_roots() {
        let mut tree = tree();
        tree.add("$/A", "a").unwrap();
        tree.add("$/B", "b").unwrap();
        assert_eq!(tree.get("$/A"), Some(&"a"));

        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.enum_roots().is_empty());
        assert_eq!(tree.get("$/A"), None);

        tree.add("$/A", "again").unwrap();
        assert_eq!(tree.get("$/A"), Some(&"again"));
    }

    #[test]
    fn test_enum_children_of_missing_token() {
        let mut tree = tree();
        tree.add("$/A/B", "b").unwrap();
        assert!(matches!(
            tree.enum_children(Some("$/A")),
            Err(SparseTreeError::KeyNotFound { .. })
        ));
        assert_eq!(tree.enum_children(None).unwrap(), vec![("$/A/B", &"b")]);
    }

    #[test]
    fn test_enum_children_of_empty_token() {
        let mut tree = tree();
        tree.add("$/A", "a").unwrap();
        tree.add("$/X", "x").unwrap();

        let roots = vec![("$/A", &"a"), ("$/X", &"x")];
        assert_eq!(tree.enum_children(Some("")).unwrap(), roots);
        assert_eq!(tree.enum_children(Some("/")).unwrap(), roots);

        // A stored empty token lists its own children
        tree.add("", "empty").unwrap();
        tree.add("/$/A", "rooted").unwrap();
        assert_eq!(tree.enum_children(Some("")).unwrap(), vec![("/$/A", &"rooted")]);
        assert_eq!(tree.enum_children(None).unwrap()[0], ("", &"empty"));

        let mut fixed: SparseTree<&str> = SparseTree::with_fixed_length(4).unwrap();
        fixed.add("BASE", "base").unwrap();
        assert_eq!(fixed.enum_children(Some("")).unwrap(), vec![("BASE", &"base")]);
        assert_eq!(fixed.enum_children(Some("BAS")), Err(SparseTreeError::EmptyToken));
    }
}
