use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the [`ContainerInfo`] layout.
pub const CONTAINER_INFO_VERSION: u8 = 1;

/// Identity of one open container.
///
/// Two handles refer to the same container iff their ids are equal; a
/// reference is "external" when its source container id differs from the
/// container it is being stored into.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(uuid::Uuid);

impl ContainerId {
    /// Generate a new, unique container id (UUID v7, time-ordered).
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerId({})", self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Layout parameters a container reports for reference storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Layout version, currently [`CONTAINER_INFO_VERSION`].
    pub version: u8,
    /// Width of object tokens in bytes.
    pub token_width: u8,
    /// Width of a blob field (length prefix plus heap id) in bytes.
    pub blob_id_width: usize,
}

/// Format version a container may write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatVersion {
    /// Oldest format able to express the data; maximizes reader compatibility.
    #[default]
    Earliest,
    /// Newest format known to this library.
    Latest,
}

/// Lower and upper format version bounds of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatBounds {
    pub low: FormatVersion,
    pub high: FormatVersion,
}

impl Default for FormatBounds {
    fn default() -> Self {
        Self {
            low: FormatVersion::Earliest,
            high: FormatVersion::Latest,
        }
    }
}
