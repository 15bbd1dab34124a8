use crate::error::{Error, Result};
use crate::git::TagRepository;
use git2::Oid;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Mock repository for testing without actual git operations
pub struct MockRepository {
    head: Option<Oid>,
    tags: Mutex<BTreeMap<String, Oid>>,
}

impl MockRepository {
    /// Create a new empty mock repository with an unborn HEAD
    pub fn new() -> Self {
        MockRepository {
            head: None,
            tags: Mutex::new(BTreeMap::new()),
        }
    }

    /// Set the HEAD commit
    pub fn with_head(mut self, oid: Oid) -> Self {
        self.head = Some(oid);
        self
    }

    /// Add a tag pointing to an OID
    pub fn add_tag(&self, name: impl Into<String>, oid: Oid) {
        self.tags
            .lock()
            .expect("tag map poisoned")
            .insert(name.into(), oid);
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRepository for MockRepository {
    fn head_oid(&self) -> Result<Oid> {
        self.head
            .ok_or_else(|| Error::tag("Cannot resolve HEAD: unborn branch"))
    }

    fn find_tag_oid(&self, tag_name: &str) -> Result<Option<Oid>> {
        Ok(self
            .tags
            .lock()
            .expect("tag map poisoned")
            .get(tag_name)
            .copied())
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self
            .tags
            .lock()
            .expect("tag map poisoned")
            .keys()
            .cloned()
            .collect())
    }

    fn create_tag(&self, name: &str, oid: Oid) -> Result<()> {
        let mut tags = self.tags.lock().expect("tag map poisoned");
        if tags.contains_key(name) {
            return Err(Error::tag(format!("Cannot create tag: '{}' already exists", name)));
        }
        tags.insert(name.to_string(), oid);
        Ok(())
    }
}
