//! Tag filters restricting which entries eviction may delete

use crate::errors::{CacheError, Result};

/// Tags an entry may carry; `None` stands for untagged entries
pub type TagList = Vec<Option<String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagFilter {
    /// Every entry may be deleted
    #[default]
    Any,
    /// Only entries whose tag is listed
    Clean(TagList),
    /// Every entry except those whose tag is listed
    Keep(TagList),
}

impl TagFilter {
    /// Build a filter from an allow-list and a deny-list, at most one of which may be set
    pub fn new(tags_to_clean: Option<TagList>, tags_to_keep: Option<TagList>) -> Result<Self> {
        match (tags_to_clean, tags_to_keep) {
            (Some(_), Some(_)) => Err(CacheError::configuration(
                "tags_to_clean and tags_to_keep are mutually exclusive",
            )),
            (Some(clean), None) => Ok(Self::Clean(clean)),
            (None, Some(keep)) => Ok(Self::Keep(keep)),
            (None, None) => Ok(Self::Any),
        }
    }

    pub fn matches(&self, tag: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Clean(tags) => contains(tags, tag),
            Self::Keep(tags) => !contains(tags, tag),
        }
    }
}

fn contains(tags: &[Option<String>], tag: Option<&str>) -> bool {
    tags.iter().any(|listed| listed.as_deref() == tag)
}
