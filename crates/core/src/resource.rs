//! Resource model - exclusively claimable subsystems.

use crate::id::ResourceId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A handle to a subsystem that at most one active command may use at a time.
///
/// Handles are cheap to clone. Two handles are equal when they carry the
/// same id, whatever their display names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier
    id: ResourceId,

    /// Human readable name, used in logs and events
    name: String,
}

impl Resource {
    /// Create a new resource with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(),
            name: name.into(),
        }
    }

    /// The resource id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// The resource name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Resource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Resource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Merge resource lists, keeping first-seen order and dropping duplicates.
pub fn union_of<'a>(lists: impl IntoIterator<Item = &'a [Resource]>) -> Vec<Resource> {
    let mut merged: Vec<Resource> = Vec::new();
    for list in lists {
        for resource in list {
            if !merged.contains(resource) {
                merged.push(resource.clone());
            }
        }
    }
    merged
}

/// Find the first resource that appears in both lists.
pub fn first_shared<'a>(a: &'a [Resource], b: &[Resource]) -> Option<&'a Resource> {
    a.iter().find(|r| b.contains(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_by_id() {
        let drive = Resource::new("drive");
        let renamed = Resource {
            id: drive.id(),
            name: "other".to_string(),
        };
        assert_eq!(drive, renamed);
        assert_ne!(drive, Resource::new("drive"));
    }

    #[test]
    fn test_union_of_dedups() {
        let drive = Resource::new("drive");
        let arm = Resource::new("arm");
        let a = vec![drive.clone(), arm.clone()];
        let b = vec![arm.clone()];

        let merged = union_of([a.as_slice(), b.as_slice()]);
        assert_eq!(merged, vec![drive, arm]);
    }

    #[test]
    fn test_first_shared() {
        let drive = Resource::new("drive");
        let arm = Resource::new("arm");
        let intake = Resource::new("intake");

        assert_eq!(first_shared(&[drive.clone(), arm.clone()], &[arm.clone()]), Some(&arm));
        assert_eq!(first_shared(&[drive], &[intake]), None);
    }
}
