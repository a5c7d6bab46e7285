//! Insertion-ordered opcode map
//!
//! Packets hold only a handful of opcodes, so a vector of pairs is both
//! smaller and faster than a hashed index here. `insert` scans the entries,
//! so bulk construction goes through `collect`.

use std::collections::HashMap;
use std::hash::Hash;

/// Map from opcode id to value that remembers insertion order.
///
/// Inserting under an existing id replaces the value in place; the id keeps
/// the position of its first insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K: Copy + PartialEq, V> OpcodeMap<K, V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Insert a value, returning the one it replaced
    pub fn insert(&mut self, id: K, value: V) -> Option<V> {
        match self.entries.iter_mut().find(|(k, _)| *k == id) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((id, value));
                None
            }
        }
    }

    pub fn get(&self, id: K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| *k == id).map(|(_, v)| v)
    }

    pub fn remove(&mut self, id: K) -> Option<V> {
        let index = self.entries.iter().position(|(k, _)| *k == id)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, id: K) -> bool {
        self.entries.iter().any(|(k, _)| *k == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }
}

impl<K: Copy + PartialEq, V> Default for OpcodeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collecting is linear in the number of pairs, unlike repeated `insert`.
/// Decoders collect untrusted entries this way.
impl<K: Copy + Eq + Hash, V> FromIterator<(K, V)> for OpcodeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut index: HashMap<K, usize> = HashMap::new();
        let mut entries: Vec<(K, V)> = Vec::new();
        for (k, v) in iter {
            match index.get(&k) {
                Some(&at) => entries[at].1 = v,
                None => {
                    index.insert(k, entries.len());
                    entries.push((k, v));
                }
            }
        }
        Self { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut map = OpcodeMap::new();
        map.insert(0x20u16, "c");
        map.insert(0x01, "a");
        map.insert(0x08, "b");
        assert_eq!(map.ids().collect::<Vec<_>>(), vec![0x20, 0x01, 0x08]);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut map = OpcodeMap::new();
        map.insert(1u32, "first");
        map.insert(2, "second");
        assert_eq!(map.insert(1, "replaced"), Some("first"));
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(1, &"replaced"), (2, &"second")]);
    }

    #[test]
    fn test_collect_last_wins_first_position() {
        let map: OpcodeMap<u32, &str> = [(7, "a"), (3, "b"), (7, "c")].into_iter().collect();
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(7, &"c"), (3, &"b")]);
    }

    #[test]
    fn test_collect_many_distinct_ids() {
        let map: OpcodeMap<u32, u32> = (0..20_000).map(|i| (i, i * 2)).collect();
        assert_eq!(map.len(), 20_000);
        assert_eq!(map.get(19_999), Some(&39_998));
        assert_eq!(map.ids().next(), Some(0));
    }

    #[test]
    fn test_remove() {
        let mut map: OpcodeMap<u16, u8> = [(1, 10), (2, 20)].into_iter().collect();
        assert_eq!(map.remove(1), Some(10));
        assert_eq!(map.remove(1), None);
        assert!(!map.contains(1));
        assert_eq!(map.get(2), Some(&20));
    }
}
