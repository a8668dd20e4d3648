use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use uuid::Uuid;

/// Append-only interning dictionary for strings.
///
/// Interning takes a short write-lock critical section on a miss; reads
/// share the lock. On seal the value array is snapshotted into the packed
/// storage and the lookup map is discarded with the live side.
pub struct StringDict {
    inner: RwLock<StringDictInner>,
}

#[derive(Default)]
struct StringDictInner {
    values: Vec<Arc<str>>,
    to_id: HashMap<Arc<str>, u32>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StringDictInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of `s`, inserting it on first sight.
    pub fn intern(&self, s: &str) -> u32 {
        if let Some(&id) = self.inner.read().unwrap().to_id.get(s) {
            return id;
        }

        let mut inner = self.inner.write().unwrap();
        // Re-check: another writer may have won the race for the lock.
        if let Some(&id) = inner.to_id.get(s) {
            return id;
        }
        let id = inner.values.len() as u32;
        let value: Arc<str> = Arc::from(s);
        inner.values.push(Arc::clone(&value));
        inner.to_id.insert(value, id);
        id
    }

    pub fn get(&self, id: u32) -> Option<Arc<str>> {
        self.inner.read().unwrap().values.get(id as usize).cloned()
    }

    /// Snapshot of the value array, for the frozen side.
    pub fn freeze(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .values
            .iter()
            .map(|v| v.to_string())
            .collect()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only interning dictionary for UUIDs, stored in their packed
/// 16-byte form.
pub struct UuidDict {
    inner: RwLock<UuidDictInner>,
}

#[derive(Default)]
struct UuidDictInner {
    values: Vec<Uuid>,
    to_id: HashMap<Uuid, u32>,
}

impl UuidDict {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(UuidDictInner::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().values.len()
    }

    pub fn intern(&self, u: Uuid) -> u32 {
        if let Some(&id) = self.inner.read().unwrap().to_id.get(&u) {
            return id;
        }

        let mut inner = self.inner.write().unwrap();
        if let Some(&id) = inner.to_id.get(&u) {
            return id;
        }
        let id = inner.values.len() as u32;
        inner.values.push(u);
        inner.to_id.insert(u, id);
        id
    }

    pub fn get(&self, id: u32) -> Option<Uuid> {
        self.inner.read().unwrap().values.get(id as usize).copied()
    }

    pub fn freeze(&self) -> Vec<Uuid> {
        self.inner.read().unwrap().values.clone()
    }
}

impl Default for UuidDict {
    fn default() -> Self {
        Self::new()
    }
}
