// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache tags linking query results to the mutations that invalidate them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque label attached to cached query results.
///
/// Queries declare which tags their results *provide*; mutations declare which
/// tags they *invalidate*. When a mutation succeeds, every cached query entry
/// providing one of its invalidated tags is refetched.
///
/// Tags are plain strings by convention, often of the form `"Post:7"` for a
/// single resource or `"Post:LIST"` for a collection.
///
/// # Examples
///
/// ```
/// use refetch_core::Tag;
///
/// let tag = Tag::new("Post:LIST");
/// assert_eq!(tag.as_str(), "Post:LIST");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    /// Creates a tag from a label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the tag's label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for Tag {
    fn from(label: String) -> Self {
        Self(label)
    }
}
