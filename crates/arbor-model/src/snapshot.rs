#![forbid(unsafe_code)]

//! Snapshot cache: a read-only tree shown before the live tree is ready.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     SnapshotSource                           │
//! │   - root / is_leaf / children / presentation by String key   │
//! │   - TreeSnapshot: in-memory implementation                   │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   FileSnapshotStore                          │
//! │   - JSON file (requires snapshot-persistence)                │
//! │   - versioned format, write-rename on save                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `SnapshotError::Io` | File I/O failure | Returns error |
//! | `SnapshotError::Serialization` | JSON encode/decode | Returns error |
//! | `SnapshotError::Corruption` | Dangling child or root key | Returns error |
//! | Version mismatch | Older or newer writer | Logged, treated as no snapshot |
//! | Missing file | First run | No snapshot |
//!
//! # Feature Gates
//!
//! - `snapshot-persistence`: Enables `FileSnapshotStore` with JSON
//!   serialization. Without this feature, only `TreeSnapshot` is available.

use std::collections::BTreeMap;

use arbor_core::Presentation;

/// Current snapshot format version.
pub const FORMAT_VERSION: u32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from snapshot validation and storage.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization error.
    #[cfg(feature = "snapshot-persistence")]
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Snapshot references keys it does not contain.
    #[error("snapshot corruption: {0}")]
    Corruption(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Source
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only tree addressed by stable string keys.
pub trait SnapshotSource: Send + Sync {
    /// Key of the root node, `None` for an empty snapshot.
    fn root(&self) -> Option<String>;

    /// Whether `key` is a leaf. Unknown keys are leaves.
    fn is_leaf(&self, key: &str) -> bool;

    /// Ordered child keys of `key`. Unknown keys have none.
    fn children(&self, key: &str) -> Vec<String>;

    /// Presentation recorded for `key`.
    fn presentation(&self, key: &str) -> Option<Presentation>;
}

/// One recorded node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "snapshot-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct SnapshotNode {
    pub leaf: bool,
    #[cfg_attr(feature = "snapshot-persistence", serde(default))]
    pub children: Vec<String>,
    pub presentation: Presentation,
}

/// In-memory snapshot of a published tree.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "snapshot-persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct TreeSnapshot {
    pub format_version: u32,
    pub root: Option<String>,
    pub nodes: BTreeMap<String, SnapshotNode>,
}

impl Default for TreeSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            root: None,
            nodes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_root(mut self, key: impl Into<String>) -> Self {
        self.root = Some(key.into());
        self
    }

    #[must_use]
    pub fn with_node(mut self, key: impl Into<String>, node: SnapshotNode) -> Self {
        self.insert(key, node);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, node: SnapshotNode) {
        self.nodes.insert(key.into(), node);
    }

    #[must_use]
    pub fn node(&self, key: &str) -> Option<&SnapshotNode> {
        self.nodes.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check that the root and every child key resolve to a recorded node.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if let Some(root) = &self.root {
            if !self.nodes.contains_key(root) {
                return Err(SnapshotError::Corruption(format!("missing root node {root:?}")));
            }
        }
        for (key, node) in &self.nodes {
            if let Some(missing) = node.children.iter().find(|c| !self.nodes.contains_key(*c)) {
                return Err(SnapshotError::Corruption(format!(
                    "node {key:?} references missing child {missing:?}"
                )));
            }
        }
        Ok(())
    }
}

impl SnapshotSource for TreeSnapshot {
    fn root(&self) -> Option<String> {
        self.root.clone()
    }

    fn is_leaf(&self, key: &str) -> bool {
        self.nodes.get(key).is_none_or(|n| n.leaf)
    }

    fn children(&self, key: &str) -> Vec<String> {
        self.nodes
            .get(key)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn presentation(&self, key: &str) -> Option<Presentation> {
        self.nodes.get(key).map(|n| n.presentation.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires snapshot-persistence feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "snapshot-persistence")]
mod file_store {
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};

    use super::{FORMAT_VERSION, SnapshotError, TreeSnapshot};

    /// JSON file holding one [`TreeSnapshot`].
    ///
    /// Saves write a sibling temp file and rename it over the target, so a
    /// crash mid-save leaves the previous snapshot intact.
    #[derive(Debug, Clone)]
    pub struct FileSnapshotStore {
        path: PathBuf,
    }

    impl FileSnapshotStore {
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
            }
        }

        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Load the stored snapshot. `None` when there is none or it was
        /// written by an incompatible version.
        pub fn load(&self) -> Result<Option<TreeSnapshot>, SnapshotError> {
            if !self.path.exists() {
                tracing::debug!(path = %self.path.display(), "no snapshot file");
                return Ok(None);
            }
            let file = File::open(&self.path)?;
            let snapshot: TreeSnapshot = serde_json::from_reader(BufReader::new(file))?;
            if snapshot.format_version != FORMAT_VERSION {
                tracing::warn!(
                    path = %self.path.display(),
                    found = snapshot.format_version,
                    expected = FORMAT_VERSION,
                    "snapshot format version mismatch, ignoring"
                );
                return Ok(None);
            }
            snapshot.validate()?;
            tracing::debug!(path = %self.path.display(), nodes = snapshot.len(), "loaded snapshot");
            Ok(Some(snapshot))
        }

        /// Atomically replace the stored snapshot.
        pub fn save(&self, snapshot: &TreeSnapshot) -> Result<(), SnapshotError> {
            snapshot.validate()?;
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let tmp = self.path.with_extension("tmp");
            {
                let file = File::create(&tmp)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, snapshot)?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp, &self.path)?;
            tracing::debug!(path = %self.path.display(), nodes = snapshot.len(), "saved snapshot");
            Ok(())
        }

        /// Remove the stored snapshot, if any.
        pub fn clear(&self) -> Result<(), SnapshotError> {
            match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            }
        }
    }
}

#[cfg(feature = "snapshot-persistence")]
pub use file_store::FileSnapshotStore;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeSnapshot {
        TreeSnapshot::new()
            .with_root("r")
            .with_node(
                "r",
                SnapshotNode {
                    leaf: false,
                    children: vec!["a".into(), "b".into()],
                    presentation: Presentation::text("root"),
                },
            )
            .with_node(
                "a",
                SnapshotNode {
                    leaf: true,
                    children: Vec::new(),
                    presentation: Presentation::text("a"),
                },
            )
            .with_node("b", SnapshotNode::default())
    }

    #[test]
    fn source_answers_from_nodes() {
        let snapshot = sample();
        assert_eq!(SnapshotSource::root(&snapshot), Some("r".to_string()));
        assert_eq!(snapshot.children("r"), vec!["a".to_string(), "b".to_string()]);
        assert!(snapshot.is_leaf("a"));
        assert!(!snapshot.is_leaf("r"));
        assert!(snapshot.is_leaf("unknown"));
        assert!(snapshot.children("unknown").is_empty());
        assert_eq!(
            snapshot.presentation("a").map(|p| p.main_text().to_string()),
            Some("a".to_string())
        );
    }

    #[test]
    fn validate_detects_dangling_keys() {
        assert!(sample().validate().is_ok());
        let broken = sample().with_root("missing");
        assert!(matches!(broken.validate(), Err(SnapshotError::Corruption(_))));
        let mut dangling = sample();
        dangling.insert(
            "b",
            SnapshotNode {
                children: vec!["ghost".into()],
                ..SnapshotNode::default()
            },
        );
        assert!(matches!(dangling.validate(), Err(SnapshotError::Corruption(_))));
    }

    #[test]
    fn empty_snapshot_is_valid() {
        let snapshot = TreeSnapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.validate().is_ok());
        assert_eq!(snapshot.format_version, FORMAT_VERSION);
    }
}
