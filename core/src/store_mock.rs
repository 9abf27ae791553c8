use std::collections::BTreeMap;

use crate::error::DiveLogError;
use crate::models::{DiveId, DiveRecord};
use crate::store::{BlobStore, DiveQuery, DiveStore};

/// Document store held in memory, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDiveStore {
    dives: Vec<DiveRecord>,
    /// Reject every `delete_dive` call.
    pub fail_delete: bool,
}

impl InMemoryDiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dives(dives: Vec<DiveRecord>) -> Self {
        Self {
            dives,
            fail_delete: false,
        }
    }
}

impl DiveStore for InMemoryDiveStore {
    fn list_dives(&self, query: &DiveQuery) -> Result<Vec<DiveRecord>, DiveLogError> {
        // Newest insert first, then a stable sort keeps it as the tie-breaker.
        let mut dives: Vec<DiveRecord> = self
            .dives
            .iter()
            .rev()
            .filter(|d| query.owner.as_ref().map_or(true, |owner| &d.owner_id == owner))
            .cloned()
            .collect();
        dives.sort_by(|a, b| b.created_at_unix.cmp(&a.created_at_unix));
        Ok(dives)
    }

    fn load_dive(&self, id: &DiveId) -> Result<Option<DiveRecord>, DiveLogError> {
        Ok(self.dives.iter().find(|d| &d.id == id).cloned())
    }

    fn upsert_dive(&mut self, dive: DiveRecord) -> Result<(), DiveLogError> {
        match self.dives.iter_mut().find(|d| d.id == dive.id) {
            Some(existing) => *existing = dive,
            None => self.dives.push(dive),
        }
        Ok(())
    }

    fn delete_dive(&mut self, id: &DiveId) -> Result<(), DiveLogError> {
        if self.fail_delete {
            return Err(DiveLogError::Store(format!("delete of {id} rejected")));
        }
        let before = self.dives.len();
        self.dives.retain(|d| &d.id != id);
        if self.dives.len() == before {
            return Err(DiveLogError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Blob store held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: BTreeMap<String, StoredBlob>,
    /// Fail every upload once this many have succeeded.
    pub fail_after: Option<usize>,
    uploads: usize,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&StoredBlob> {
        self.blobs.get(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<StoredBlob> {
        self.blobs.remove(path)
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put_photo(
        &mut self,
        path: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, DiveLogError> {
        if self.fail_after.is_some_and(|limit| self.uploads >= limit) {
            return Err(DiveLogError::Blob(format!("upload of {path} rejected")));
        }
        self.uploads += 1;
        self.blobs.insert(
            path.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(format!("memory://blobs/{path}"))
    }

    fn delete_photo(&mut self, path: &str) -> Result<(), DiveLogError> {
        self.blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| DiveLogError::Blob(format!("no object at {path}")))
    }
}
