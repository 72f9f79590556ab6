//! Tree nodes and the arena that owns them
//!
//! Nodes refer to each other by [`NodeId`]. An id pairs a slot index with the
//! slot's generation, so an id kept after its node was freed (the lookup
//! cache, for instance) no longer resolves even if the slot is reused.

use crate::token::Element;

/// Generation-checked handle to a node in a [`NodeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId {
    index: u32,
    generation: u32,
}

/// One tree position
#[derive(Debug)]
pub(crate) struct Node<T> {
    /// Canonical token for this node
    pub token: Box<str>,

    /// Split elements of `token`; the leading ones are shared with the parent
    pub elements: Vec<Element>,

    /// Stored value, `None` only on the root
    pub value: Option<T>,

    /// Owning node, `None` on the root and on unlinked nodes
    pub parent: Option<NodeId>,

    /// Children sorted element-wise under the tree's comparison
    pub children: Vec<NodeId>,
}

impl<T> Node<T> {
    pub fn new(token: &str, elements: Vec<Element>, value: Option<T>) -> Self {
        Self {
            token: token.into(),
            elements,
            value,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Number of elements in the token
    #[inline]
    pub fn depth(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Slot storage for the nodes of one tree
#[derive(Debug)]
pub(crate) struct NodeArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> NodeArena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Store a node and return its id
    pub fn insert(&mut self, node: Node<T>) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.node.is_none());
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).expect("node arena exceeds u32::MAX slots");
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Free a node, invalidating every copy of `id`
    pub fn remove(&mut self, id: NodeId) -> Option<Node<T>> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }

        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }

    /// Resolve `id` if it still names a live node
    pub fn get(&self, id: NodeId) -> Option<&Node<T>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<T>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Free every node. Generations keep advancing so old ids stay stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<T> std::ops::Index<NodeId> for NodeArena<T> {
    type Output = Node<T>;

    fn index(&self, id: NodeId) -> &Node<T> {
        self.get(id).expect("stale node id")
    }
}

impl<T> std::ops::IndexMut<NodeId> for NodeArena<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<T> {
        self.get_mut(id).expect("stale node id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(token: &str) -> Node<u32> {
        Node::new(token, vec![Element::from(token)], Some(1))
    }

    #[test]
    fn test_freed_ids_do_not_resolve() {
        let mut arena = NodeArena::new();
        let a = arena.insert(leaf("a"));
        assert_eq!(arena.len(), 1);

        assert!(arena.remove(a).is_some());
        assert!(arena.get(a).is_none());
        assert!(arena.remove(a).is_none());

        // The slot is reused under a new generation
        let b = arena.insert(leaf("b"));
        assert_ne!(a, b);
        assert!(arena.get(a).is_none());
        assert_eq!(&*arena[b].token, "b");
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut arena = NodeArena::new();
        let a = arena.insert(leaf("a"));
        arena.insert(leaf("b"));
        arena.clear();
        assert_eq!(arena.len(), 0);
        assert!(arena.get(a).is_none());

        let c = arena.insert(leaf("c"));
        assert!(arena.get(a).is_none());
        assert_eq!(&*arena[c].token, "c");
    }
}
