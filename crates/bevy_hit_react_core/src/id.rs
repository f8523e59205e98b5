use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// Identifies a bone in a [`BoneHierarchy`](crate::hierarchy::BoneHierarchy) by name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoneId(Arc<str>);

impl BoneId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "🦴{}", self.0)
    }
}

impl fmt::Display for BoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BoneId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BoneId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Gameplay tag used to select a profile set, e.g. `HitReact.Torso.Upper`.
///
/// Tags are hierarchical: each `.` separated segment narrows the parent tag.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HitReactTag(Arc<str>);

impl HitReactTag {
    pub const SEPARATOR: char = '.';

    pub fn new(tag: impl AsRef<str>) -> Self {
        Self(Arc::from(tag.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `HitReact.Torso.Upper` -> `HitReact.Torso`. Top level tags have no parent.
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rsplit_once(Self::SEPARATOR)
            .map(|(parent, _)| Self::new(parent))
    }

    /// True if `self` equals `other` or is nested below it.
    pub fn matches(&self, other: &HitReactTag) -> bool {
        match self.0.strip_prefix(other.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with(Self::SEPARATOR),
            None => false,
        }
    }
}

impl fmt::Debug for HitReactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for HitReactTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HitReactTag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for HitReactTag {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}
