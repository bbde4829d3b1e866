//! LRU (Least Recently Used) replacement policy.

use std::collections::HashMap;
use std::hash::Hash;

/// Index of the head sentinel (LRU side).
const HEAD: usize = 0;
/// Index of the tail sentinel (MRU side).
const TAIL: usize = 1;

struct Node<K> {
    key: Option<K>,
    prev: usize,
    next: usize,
}

/// Recency-ordered set of eviction candidates.
///
/// A doubly linked list stored in a `Vec`, with `prev`/`next` as indices and
/// two sentinel nodes so that linking never special-cases the ends. A map
/// from key to node index gives O(1) membership, and unlinked nodes are
/// recycled through a free list.
///
/// ```text
///  HEAD ⇄ [lru] ⇄ ... ⇄ [mru] ⇄ TAIL
/// ```
///
/// The buffer manager keeps exactly the materialized, unpinned pages in
/// here. Everything else is its caller's business.
pub struct LruReplacer<K> {
    nodes: Vec<Node<K>>,

    /// Recycled node slots.
    free: Vec<usize>,

    /// Key → node index.
    index: HashMap<K, usize>,
}

impl<K: Copy + Eq + Hash> LruReplacer<K> {
    /// Create an empty replacer.
    pub fn new() -> Self {
        let sentinel = |prev, next| Node {
            key: None,
            prev,
            next,
        };

        Self {
            nodes: vec![sentinel(HEAD, TAIL), sentinel(HEAD, TAIL)],
            free: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert `key` at the MRU end, or move it there if already present.
    pub fn touch(&mut self, key: K) {
        if let Some(&node) = self.index.get(&key) {
            self.unlink(node);
            self.link_mru(node);
            return;
        }

        let node = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot].key = Some(key);
                slot
            }
            None => {
                self.nodes.push(Node {
                    key: Some(key),
                    prev: HEAD,
                    next: TAIL,
                });
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, node);
        self.link_mru(node);
    }

    /// Forget `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.index.remove(key) {
            Some(node) => {
                self.unlink(node);
                self.release(node);
                true
            }
            None => false,
        }
    }

    /// Detach and return the least recently used key.
    ///
    /// Returns `None` when the replacer is empty, i.e. every materialized
    /// page is pinned.
    #[must_use]
    pub fn evict(&mut self) -> Option<K> {
        let node = self.nodes[HEAD].next;
        if node == TAIL {
            return None;
        }

        let key = self.nodes[node].key?;
        self.index.remove(&key);
        self.unlink(node);
        self.release(node);
        Some(key)
    }

    /// The key `evict` would return, without removing it.
    pub fn peek_lru(&self) -> Option<K> {
        self.nodes[self.nodes[HEAD].next].key
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Number of eviction candidates.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Keys from LRU to MRU.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        let mut node = self.nodes[HEAD].next;
        std::iter::from_fn(move || {
            if node == TAIL {
                return None;
            }
            let current = &self.nodes[node];
            node = current.next;
            current.key
        })
    }

    fn unlink(&mut self, node: usize) {
        let (prev, next) = (self.nodes[node].prev, self.nodes[node].next);
        self.nodes[prev].next = next;
        self.nodes[next].prev = prev;
    }

    fn link_mru(&mut self, node: usize) {
        let last = self.nodes[TAIL].prev;
        self.nodes[node].prev = last;
        self.nodes[node].next = TAIL;
        self.nodes[last].next = node;
        self.nodes[TAIL].prev = node;
    }

    fn release(&mut self, node: usize) {
        self.nodes[node].key = None;
        self.free.push(node);
    }
}

impl<K: Copy + Eq + Hash> Default for LruReplacer<K> {
    fn default() -> Self {
        Self::new()
    }
}
