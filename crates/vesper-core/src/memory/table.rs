use crate::{memory::StringHandle, Value};

const MIN_CAPACITY: usize = 8;
const LOAD_FACTOR_THRESHOLD: f64 = 0.75;

#[derive(Debug, Clone, Copy, Default)]
enum Entry {
    #[default]
    Empty,
    Tombstone,
    Occupied {
        key: StringHandle,
        hash: u32,
        value: Value,
    },
}

/// Open-addressing hash table keyed by interned strings, used for
/// globals, class method tables and instance fields. Linear probing with
/// tombstones; capacity is a power of two and grows at 75% load
/// (tombstones count toward load). Callers pass the key's precomputed
/// hash alongside the handle.
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Vec<Entry>,
    len: usize,
    load: usize,
}

impl Table {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
            load: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, hash: u32, key: StringHandle) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }

        match self.entries[self.find_slot(hash, key)] {
            Entry::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Inserts or overwrites. Returns true when the key was not present.
    pub fn insert(&mut self, hash: u32, key: StringHandle, value: Value) -> bool {
        if self.load + 1 > (self.entries.len() as f64 * LOAD_FACTOR_THRESHOLD) as usize {
            self.grow();
        }

        let slot = self.find_slot(hash, key);
        match self.entries[slot] {
            Entry::Occupied { .. } => {
                self.entries[slot] = Entry::Occupied { key, hash, value };
                false
            }
            Entry::Tombstone => {
                self.entries[slot] = Entry::Occupied { key, hash, value };
                self.len += 1;
                true
            }
            Entry::Empty => {
                self.entries[slot] = Entry::Occupied { key, hash, value };
                self.len += 1;
                self.load += 1;
                true
            }
        }
    }

    /// Overwrites an existing entry; absent keys are left untouched.
    /// Returns false when the key was not present.
    pub fn replace(&mut self, hash: u32, key: StringHandle, value: Value) -> bool {
        if self.entries.is_empty() {
            return false;
        }

        let slot = self.find_slot(hash, key);
        match self.entries[slot] {
            Entry::Occupied { .. } => {
                self.entries[slot] = Entry::Occupied { key, hash, value };
                true
            }
            _ => false,
        }
    }

    /// Removes the entry, leaving a tombstone so probe chains stay intact.
    pub fn remove(&mut self, hash: u32, key: StringHandle) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }

        let slot = self.find_slot(hash, key);
        match self.entries[slot] {
            Entry::Occupied { value, .. } => {
                self.entries[slot] = Entry::Tombstone;
                self.len -= 1;
                Some(value)
            }
            _ => None,
        }
    }

    /// Copies every entry of `other` into `self` (copy-down inheritance).
    pub fn add_all(&mut self, other: &Table) {
        for (key, hash, value) in other.iter() {
            self.insert(hash, key, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StringHandle, u32, Value)> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Occupied { key, hash, value } => Some((*key, *hash, *value)),
            _ => None,
        })
    }

    /// Walks the probe chain for `key`, returning the slot of its entry
    /// if present, otherwise the first tombstone seen (for reuse) or the
    /// terminating empty slot.
    fn find_slot(&self, hash: u32, key: StringHandle) -> usize {
        debug_assert!(!self.entries.is_empty());
        let mask = self.entries.len() - 1;
        let mut index = hash as usize & mask;
        let mut first_tombstone = None;

        loop {
            match self.entries[index] {
                Entry::Empty => return first_tombstone.unwrap_or(index),
                Entry::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Entry::Occupied { key: existing, .. } => {
                    if existing == key {
                        return index;
                    }
                }
            }
            index = (index + 1) & mask;
        }
    }

    fn grow(&mut self) {
        let new_capacity = if self.entries.is_empty() {
            MIN_CAPACITY
        } else {
            self.entries.len() * 2
        };

        let old = std::mem::replace(&mut self.entries, vec![Entry::default(); new_capacity]);
        self.len = 0;
        self.load = 0;

        for entry in old {
            if let Entry::Occupied { key, hash, value } = entry {
                self.insert(hash, key, value);
            }
        }
    }

    pub fn get_allocated_bytes(&self) -> usize {
        self.entries.len() * std::mem::size_of::<Entry>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::StringInterner;

    fn keyed(interner: &mut StringInterner, s: &str) -> (u32, StringHandle) {
        let handle = interner.intern(s);
        (interner.hash(handle), handle)
    }

    #[test]
    fn insert_get_and_overwrite() {
        let mut interner = StringInterner::new();
        let mut table = Table::new();
        let (hash, key) = keyed(&mut interner, "a");

        assert!(table.insert(hash, key, Value::Number(1.0)));
        assert_eq!(table.get(hash, key), Some(Value::Number(1.0)));

        assert!(!table.insert(hash, key, Value::Number(2.0)));
        assert_eq!(table.get(hash, key), Some(Value::Number(2.0)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn replace_is_a_no_op_on_missing_keys() {
        let mut interner = StringInterner::new();
        let mut table = Table::new();
        let (hash, key) = keyed(&mut interner, "missing");

        assert!(!table.replace(hash, key, Value::Nil));
        assert_eq!(table.len(), 0);
        assert_eq!(table.get(hash, key), None);
    }

    #[test]
    fn remove_leaves_probe_chains_intact() {
        let mut interner = StringInterner::new();
        let mut table = Table::new();

        let entries: Vec<_> = (0..32)
            .map(|i| {
                let (hash, key) = keyed(&mut interner, &format!("key_{}", i));
                table.insert(hash, key, Value::Number(i as f64));
                (hash, key, i as f64)
            })
            .collect();

        let (hash, key, _) = entries[7];
        assert_eq!(table.remove(hash, key), Some(Value::Number(7.0)));
        assert_eq!(table.remove(hash, key), None);

        for &(hash, key, number) in entries.iter().filter(|(_, _, n)| *n != 7.0) {
            assert_eq!(table.get(hash, key), Some(Value::Number(number)));
        }
    }

    #[test]
    fn tombstones_are_reused_by_insert() {
        let mut interner = StringInterner::new();
        let mut table = Table::new();
        let (hash, key) = keyed(&mut interner, "slot");

        table.insert(hash, key, Value::Boolean(true));
        table.remove(hash, key);
        table.insert(hash, key, Value::Boolean(false));

        assert_eq!(table.get(hash, key), Some(Value::Boolean(false)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn add_all_copies_entries() {
        let mut interner = StringInterner::new();
        let mut base = Table::new();
        let mut derived = Table::new();

        let (h1, k1) = keyed(&mut interner, "inherited");
        let (h2, k2) = keyed(&mut interner, "overridden");
        base.insert(h1, k1, Value::Number(1.0));
        base.insert(h2, k2, Value::Number(2.0));

        derived.add_all(&base);
        derived.insert(h2, k2, Value::Number(3.0));

        assert_eq!(derived.get(h1, k1), Some(Value::Number(1.0)));
        assert_eq!(derived.get(h2, k2), Some(Value::Number(3.0)));
    }
}
