//! Bounded least-recently-used table.
//!
//! Entries live in a slot arena; recency is an intrusive doubly linked list
//! threaded through the slots by index, so lookups, touches, inserts and
//! evictions are all O(1) and no entry is ever moved in memory.

use std::collections::HashMap;
use std::hash::Hash;

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    prev: usize,
    next: usize,
}

/// Fixed-capacity map that evicts the least recently used entry on overflow.
#[derive(Debug)]
pub struct LruTable<K, V> {
    index: HashMap<K, usize>,
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Most recently used slot.
    head: usize,
    /// Least recently used slot.
    tail: usize,
    capacity: usize,
}

impl<K, V> LruTable<K, V>
where
    K: Hash + Eq + Clone,
{
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Look up without changing recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.slot(idx).map(|node| &node.value)
    }

    /// Look up and mark the entry most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.touch(idx);
        self.slot(idx).map(|node| &node.value)
    }

    /// Insert or replace. Returns the entry evicted to make room, if any.
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.slot_mut(idx) {
                node.value = value;
            }
            self.touch(idx);
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.push_front(idx);
        evicted
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        self.free.push(idx);
        self.nodes.get_mut(idx)?.take().map(|node| node.value)
    }

    /// Evict and return the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let idx = self.tail;
        let key = self.slot(idx)?.key.clone();
        let value = self.remove(&key)?;
        Some((key, value))
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let node = self.slot(cursor)?;
            cursor = node.next;
            Some(&node.key)
        })
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    fn slot(&self, idx: usize) -> Option<&Node<K, V>> {
        self.nodes.get(idx).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, idx: usize) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(idx).and_then(Option::as_mut)
    }

    fn touch(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let Some((prev, next)) = self.slot(idx).map(|node| (node.prev, node.next)) else {
            return;
        };
        match self.slot_mut(prev) {
            Some(node) => node.next = next,
            None => self.head = next,
        }
        match self.slot_mut(next) {
            Some(node) => node.prev = prev,
            None => self.tail = prev,
        }
        if let Some(node) = self.slot_mut(idx) {
            node.prev = NIL;
            node.next = NIL;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slot_mut(idx) {
            node.prev = NIL;
            node.next = old_head;
        }
        match self.slot_mut(old_head) {
            Some(node) => node.prev = idx,
            None => self.tail = idx,
        }
        self.head = idx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut table = LruTable::new(2);
        assert!(table.insert("a", 1).is_none());
        assert!(table.insert("b", 2).is_none());
        assert_eq!(table.insert("c", 3), Some(("a", 1)));
        assert!(!table.contains(&"a"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut table = LruTable::new(2);
        table.insert("a", 1);
        table.insert("b", 2);
        assert_eq!(table.get(&"a"), Some(&1));
        assert_eq!(table.insert("c", 3), Some(("b", 2)));
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec!["c", "a"]);
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut table = LruTable::new(2);
        table.insert("a", 1);
        table.insert("b", 2);
        assert_eq!(table.peek(&"a"), Some(&1));
        assert_eq!(table.insert("c", 3), Some(("a", 1)));
    }

    #[test]
    fn test_replace_keeps_size() {
        let mut table = LruTable::new(2);
        table.insert("a", 1);
        table.insert("b", 2);
        assert!(table.insert("a", 10).is_none());
        assert_eq!(table.len(), 2);
        assert_eq!(table.peek(&"a"), Some(&10));
        assert_eq!(table.pop_lru(), Some(("b", 2)));
    }

    #[test]
    fn test_remove_and_slot_reuse() {
        let mut table = LruTable::new(3);
        table.insert(1, "one");
        table.insert(2, "two");
        assert_eq!(table.remove(&1), Some("one"));
        assert_eq!(table.remove(&1), None);
        table.insert(3, "three");
        table.insert(4, "four");
        assert_eq!(table.len(), 3);
        assert_eq!(table.keys().copied().collect::<Vec<_>>(), vec![4, 3, 2]);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut table = LruTable::new(0);
        table.insert(1, ());
        assert_eq!(table.insert(2, ()), Some((1, ())));
        assert_eq!(table.capacity(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(u8, u32),
        Get(u8),
        Remove(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..12, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
            (0u8..12).prop_map(Op::Get),
            (0u8..12).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The table behaves exactly like a recency-ordered list model.
        #[test]
        fn prop_matches_reference_model(
            capacity in 1usize..6,
            ops in prop::collection::vec(op_strategy(), 0..80),
        ) {
            let mut table = LruTable::new(capacity);
            // most recent first
            let mut model: Vec<(u8, u32)> = Vec::new();

            for op in ops {
                match op {
                    Op::Insert(k, v) => {
                        let expected = if let Some(pos) = model.iter().position(|(mk, _)| *mk == k) {
                            model.remove(pos);
                            None
                        } else if model.len() >= capacity {
                            model.pop()
                        } else {
                            None
                        };
                        model.insert(0, (k, v));
                        prop_assert_eq!(table.insert(k, v), expected);
                    }
                    Op::Get(k) => {
                        let expected = model.iter().position(|(mk, _)| *mk == k).map(|pos| {
                            let entry = model.remove(pos);
                            model.insert(0, entry);
                            entry.1
                        });
                        prop_assert_eq!(table.get(&k).copied(), expected);
                    }
                    Op::Remove(k) => {
                        let expected = model
                            .iter()
                            .position(|(mk, _)| *mk == k)
                            .map(|pos| model.remove(pos).1);
                        prop_assert_eq!(table.remove(&k), expected);
                    }
                }
                let keys: Vec<u8> = table.keys().copied().collect();
                let model_keys: Vec<u8> = model.iter().map(|(k, _)| *k).collect();
                prop_assert_eq!(keys, model_keys);
                prop_assert!(table.len() <= capacity);
            }
        }
    }
}
