use std::collections::HashMap;

use crate::hash::hash_name;

/// Something stored under a stable string key.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Insertion-ordered collection indexed by key hash.
///
/// Lookups hash the key and then confirm the stored key, so colliding hashes
/// never alias two entries.
#[derive(Debug, Clone)]
pub struct KeyedMap<T> {
    items: Vec<T>,
    index: HashMap<u64, Vec<usize>>,
}

impl<T> Default for KeyedMap<T> {
    fn default() -> Self {
        KeyedMap {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> KeyedMap<T> {
    fn position(&self, key: &str) -> Option<usize> {
        self.index
            .get(&hash_name(key))?
            .iter()
            .copied()
            .find(|&i| self.items[i].key() == key)
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.position(key).map(|i| &self.items[i])
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.position(key).map(|i| &mut self.items[i])
    }

    /// Return the entry for `key`, inserting `make()` first when it is
    /// absent and `allow_creation` is set. The handle returned is the entry
    /// that was found or inserted; no second lookup is made.
    pub fn get_or_create(
        &mut self,
        key: &str,
        allow_creation: bool,
        make: impl FnOnce() -> T,
    ) -> Option<&mut T> {
        let index = match self.position(key) {
            Some(i) => i,
            None if allow_creation => {
                let item = make();
                debug_assert_eq!(item.key(), key);
                self.items.push(item);
                let i = self.items.len() - 1;
                self.index.entry(hash_name(key)).or_default().push(i);
                i
            }
            None => return None,
        };
        Some(&mut self.items[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
