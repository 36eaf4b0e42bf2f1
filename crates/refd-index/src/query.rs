use std::collections::HashMap;
use std::sync::RwLock;

use refd_types::{LibraryId, ObjectKey};

use crate::error::IndexResult;

/// Free-text query contract against the external search index.
///
/// Results are candidates only: the index may lag deletes, so callers
/// hydrate each `(library, key)` from primary storage and drop the ones that
/// no longer resolve.
pub trait SearchIndex: Send + Sync {
    fn query(&self, library: LibraryId, text: &str) -> IndexResult<Vec<(LibraryId, ObjectKey)>>;
}

/// Naive in-memory substring index for tests and embedding.
pub struct MemorySearchIndex {
    documents: RwLock<HashMap<(LibraryId, ObjectKey), String>>,
}

impl MemorySearchIndex {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, library: LibraryId, key: ObjectKey, content: &str) {
        self.documents
            .write()
            .expect("lock poisoned")
            .insert((library, key), content.to_lowercase());
    }

    pub fn remove(&self, library: LibraryId, key: ObjectKey) {
        self.documents
            .write()
            .expect("lock poisoned")
            .remove(&(library, key));
    }
}

impl Default for MemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex for MemorySearchIndex {
    fn query(&self, library: LibraryId, text: &str) -> IndexResult<Vec<(LibraryId, ObjectKey)>> {
        let needle = text.to_lowercase();
        let documents = self.documents.read().expect("lock poisoned");
        let mut hits: Vec<(LibraryId, ObjectKey)> = documents
            .iter()
            .filter(|((lib, _), content)| *lib == library && content.contains(&needle))
            .map(|((lib, key), _)| (*lib, *key))
            .collect();
        hits.sort_by_key(|(_, key)| *key);
        Ok(hits)
    }
}
