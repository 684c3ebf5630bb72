//! Audit result container.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanOptions;
use crate::node::Node;

/// Complete audit of one root path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTree {
    /// Root node of the tree.
    pub root: Node,

    /// Root path that was scanned.
    #[serde(with = "crate::serde_ext::raw_path")]
    pub root_path: PathBuf,

    /// False only when the root itself could not be accessed.
    pub success: bool,

    /// When this scan was performed.
    #[serde(with = "crate::serde_ext::timestamp")]
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Options used for the scan.
    pub options: ScanOptions,
}

impl AuditTree {
    /// Create a new audit tree.
    pub fn new(
        root: Node,
        root_path: PathBuf,
        success: bool,
        options: ScanOptions,
        scan_duration: Duration,
    ) -> Self {
        Self {
            root,
            root_path,
            success,
            scanned_at: SystemTime::now(),
            scan_duration,
            options,
        }
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.size
    }

    /// Get the total number of files.
    pub fn total_files(&self) -> u64 {
        self.root.file_count()
    }

    /// Get the number of entries that could not be scanned.
    pub fn total_errors(&self) -> u64 {
        self.root.error_count()
    }

    /// Check if every entry was scanned.
    pub fn is_complete(&self) -> bool {
        self.success && self.total_errors() == 0
    }

    /// Split into the root node and the overall success flag.
    pub fn into_parts(self) -> (Node, bool) {
        (self.root, self.success)
    }
}
