use std::fmt;
use std::path::{Path, PathBuf};

/// Identifies a source photograph by its on-disk path.
///
/// Stored as a string rather than a `PathBuf` because the persistent store
/// keys rows by this value and it must round-trip through a TEXT column
/// unchanged.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Path> for SourceId {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for SourceId {
    fn from(value: PathBuf) -> Self {
        Self::from(value.as_path())
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceId").field(&self.0).finish()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
