use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

/// Handle to an interned string. Selectors, symbols, class and global names
/// are all interned, so comparing them is an integer compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interned(u32);

impl Interned {
    pub fn index(self) -> u32 {
        self.0
    }
}

struct InternedStringsImpl {
    table: Vec<Arc<str>>,
    mappings: HashMap<Arc<str>, Interned>,
}

impl InternedStringsImpl {
    fn new() -> Self {
        Self {
            table: Vec::new(),
            mappings: HashMap::new(),
        }
    }

    fn get_or_add(&mut self, value: &str) -> Interned {
        if let Some(&id) = self.mappings.get(value) {
            return id;
        }
        let id = Interned(self.table.len() as u32);
        let interned = Arc::<str>::from(value);
        self.table.push(interned.clone());
        self.mappings.insert(interned, id);
        id
    }

    fn lookup(&self, value: &str) -> Option<Interned> {
        self.mappings.get(value).copied()
    }
}

/// The symbol table. Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct InternedStrings(Arc<RwLock<InternedStringsImpl>>);

impl InternedStrings {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(InternedStringsImpl::new())))
    }

    pub fn add(&self, value: &str) -> Interned {
        if let Some(id) = self.0.read().lookup(value) {
            return id;
        }
        self.0.write().get_or_add(value)
    }

    /// Find an already interned string without adding it.
    pub fn lookup(&self, value: &str) -> Option<Interned> {
        self.0.read().lookup(value)
    }

    pub fn get(&self, id: Interned) -> Arc<str> {
        // ids are only ever handed out by `add`, so the index is in range
        self.0.read().table[id.0 as usize].clone()
    }

    pub fn len(&self) -> usize {
        self.0.read().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InternedStrings {
    fn default() -> Self {
        Self::new()
    }
}
