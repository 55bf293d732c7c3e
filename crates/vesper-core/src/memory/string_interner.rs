use generational_arena::{Arena, Index};
use rustc_hash::{FxBuildHasher, FxHashMap};

pub type StringHandle = Index;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

#[derive(Debug, Clone)]
pub struct StringObject {
    pub chars: Box<str>,
    pub hash: u32,
    pub is_marked: bool,
}

/// Content-unique heap strings. The map is keyed by the string's FNV-1a
/// hash (bumped on collision, probed by content), so two live strings
/// with equal bytes always share one handle. Entries are weak: the GC
/// prunes the map and sweeps the arena for unmarked strings.
#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    strings: Arena<StringObject>,
    map: FxHashMap<u32, StringHandle>,
    bytes: usize,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            strings: Arena::with_capacity(capacity),
            map: FxHashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
            bytes: 0,
        }
    }

    pub fn intern(&mut self, s: &str) -> StringHandle {
        let hash = fnv1a(s.as_bytes());
        let mut probe = hash;

        loop {
            match self.map.get(&probe) {
                None => {
                    let handle = self.strings.insert(StringObject {
                        chars: s.into(),
                        hash,
                        is_marked: false,
                    });
                    self.map.insert(probe, handle);
                    self.bytes += s.len();
                    return handle;
                }
                Some(&handle) => {
                    if self.get_string(handle) == s {
                        return handle;
                    }
                    probe = probe.wrapping_add(1);
                }
            }
        }
    }

    pub fn concat(&mut self, left: StringHandle, right: StringHandle) -> StringHandle {
        let mut combined =
            String::with_capacity(self.get_string(left).len() + self.get_string(right).len());
        combined.push_str(self.get_string(left));
        combined.push_str(self.get_string(right));
        self.intern(&combined)
    }

    pub fn get_string(&self, handle: StringHandle) -> &str {
        &self.strings[handle].chars
    }

    pub fn hash(&self, handle: StringHandle) -> u32 {
        self.strings[handle].hash
    }

    pub fn mark(&mut self, handle: StringHandle) {
        if let Some(string) = self.strings.get_mut(handle) {
            string.is_marked = true;
        }
    }

    pub fn is_marked(&self, handle: StringHandle) -> bool {
        self.strings
            .get(handle)
            .map(|string| string.is_marked)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn get_allocated_bytes(&self) -> usize {
        self.bytes + self.strings.len() * std::mem::size_of::<StringObject>()
    }

    /// Drops every unmarked string and clears the marks of survivors.
    /// The map is rebuilt from the survivors rather than pruned in
    /// place: deleting entries would leave holes in probe chains that
    /// collided past a dead string.
    pub fn sweep(&mut self) {
        let mut bytes = 0;
        self.strings.retain(|_, string| {
            if string.is_marked {
                string.is_marked = false;
                bytes += string.chars.len();
                true
            } else {
                false
            }
        });
        self.bytes = bytes;

        self.map.clear();
        for (handle, string) in self.strings.iter() {
            let mut probe = string.hash;
            while self.map.contains_key(&probe) {
                probe = probe.wrapping_add(1);
            }
            self.map.insert(probe, handle);
        }
    }
}
