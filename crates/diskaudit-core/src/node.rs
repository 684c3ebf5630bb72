//! Tree node types and the aggregation fold.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Reason an entry could not be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorReason {
    /// The OS refused to stat or list the entry.
    PermissionDenied,
    /// The entry was listed by its parent but was gone when visited.
    VanishedDuringScan,
    /// The entry, or the worker responsible for it, failed for another reason.
    Unreadable,
}

impl ErrorReason {
    /// Map an I/O error to the reason recorded on an error node.
    ///
    /// `NotADirectory` counts as vanished: the directory that was listed has
    /// been replaced by something else.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Self::VanishedDuringScan,
            _ => Self::Unreadable,
        }
    }

    /// Short label for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission denied",
            Self::VanishedDuringScan => "vanished during scan",
            Self::Unreadable => "unreadable",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of scanned entry and its kind-specific metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Regular file, symlink or special file.
    File {
        /// Detected content type, if the file was classified.
        mimetype: Option<CompactString>,
        /// Whether the content is already in a compressed format.
        compressed_format: Option<bool>,
    },
    /// Directory with aggregate counters over its subtree.
    Directory {
        /// Number of file nodes in this subtree.
        file_count: u64,
        /// Number of directory nodes below this one.
        dir_count: u64,
        /// Number of error nodes in this subtree.
        error_count: u64,
        /// Bytes held by files that are already in a compressed format.
        compressed_bytes: u64,
    },
    /// Entry that could not be scanned.
    Error {
        /// Why the entry could not be scanned.
        reason: ErrorReason,
    },
}

impl NodeKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, NodeKind::Directory { .. })
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, NodeKind::File { .. })
    }

    /// Check if this is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, NodeKind::Error { .. })
    }
}

/// A single scanned entry.
///
/// Children are owned by value; a tree has exactly one owner for each node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Final path component.
    pub name: CompactString,

    /// Absolute path of the entry.
    #[serde(with = "crate::serde_ext::raw_path")]
    pub path: PathBuf,

    /// Node type and associated metadata.
    pub kind: NodeKind,

    /// Size in bytes (aggregate for directories, zero for errors).
    pub size: u64,

    /// Bytes of content fed to the compression estimate.
    pub text_size: Option<u64>,

    /// Bytes of gzip output for that content.
    pub gzip_size: Option<u64>,

    /// Modification time for files, newest file mtime for directories.
    #[serde(with = "crate::serde_ext::opt_timestamp")]
    pub last_modified: Option<SystemTime>,

    /// Children in traversal order (directories only).
    pub children: Vec<Node>,
}

impl Node {
    /// Create an unclassified file node.
    pub fn new_file(path: impl Into<PathBuf>, size: u64, last_modified: Option<SystemTime>) -> Self {
        let path = path.into();
        Self {
            name: entry_name(&path),
            path,
            kind: NodeKind::File {
                mimetype: None,
                compressed_format: None,
            },
            size,
            text_size: None,
            gzip_size: None,
            last_modified,
            children: Vec::new(),
        }
    }

    /// Create a directory shell with no children and zeroed aggregates.
    pub fn new_directory(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: entry_name(&path),
            path,
            kind: NodeKind::Directory {
                file_count: 0,
                dir_count: 0,
                error_count: 0,
                compressed_bytes: 0,
            },
            size: 0,
            text_size: None,
            gzip_size: None,
            last_modified: None,
            children: Vec::new(),
        }
    }

    /// Create an error node.
    pub fn new_error(path: impl Into<PathBuf>, reason: ErrorReason) -> Self {
        let path = path.into();
        Self {
            name: entry_name(&path),
            path,
            kind: NodeKind::Error { reason },
            size: 0,
            text_size: None,
            gzip_size: None,
            last_modified: None,
            children: Vec::new(),
        }
    }

    /// Attach a classification to a file node. Other kinds are returned unchanged.
    pub fn with_classification(mut self, mimetype: impl Into<CompactString>, compressed: bool) -> Self {
        if self.is_file() {
            self.kind = NodeKind::File {
                mimetype: Some(mimetype.into()),
                compressed_format: Some(compressed),
            };
        }
        self
    }

    /// Replace this node with an error node for the same path.
    pub fn into_error(self, reason: ErrorReason) -> Self {
        Self {
            name: self.name,
            path: self.path,
            kind: NodeKind::Error { reason },
            size: 0,
            text_size: None,
            gzip_size: None,
            last_modified: None,
            children: Vec::new(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Check if this node is an error.
    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }

    /// Detected mimetype, for classified files.
    pub fn mimetype(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::File { mimetype, .. } => mimetype.as_deref(),
            _ => None,
        }
    }

    /// Whether a file's content is already compressed.
    pub fn compressed_format(&self) -> Option<bool> {
        match &self.kind {
            NodeKind::File {
                compressed_format, ..
            } => *compressed_format,
            _ => None,
        }
    }

    /// Reason for an error node.
    pub fn error_reason(&self) -> Option<ErrorReason> {
        match &self.kind {
            NodeKind::Error { reason } => Some(*reason),
            _ => None,
        }
    }

    /// Get file count for directories, 1 for files.
    pub fn file_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { file_count, .. } => *file_count,
            NodeKind::File { .. } => 1,
            NodeKind::Error { .. } => 0,
        }
    }

    /// Get directory count below a directory.
    pub fn dir_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { dir_count, .. } => *dir_count,
            _ => 0,
        }
    }

    /// Get error count for directories, 1 for error nodes.
    pub fn error_count(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { error_count, .. } => *error_count,
            NodeKind::Error { .. } => 1,
            NodeKind::File { .. } => 0,
        }
    }

    /// Bytes held in already-compressed formats.
    pub fn compressed_bytes(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory {
                compressed_bytes, ..
            } => *compressed_bytes,
            NodeKind::File {
                compressed_format: Some(true),
                ..
            } => self.size,
            _ => 0,
        }
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Compute this directory's aggregates from its children.
    ///
    /// Called once, after the child list is final. `with_estimates` decides
    /// whether `text_size`/`gzip_size` are summed or left absent. Does nothing
    /// for non-directory nodes.
    pub fn seal(&mut self, with_estimates: bool) {
        let totals = Totals::from_children(&self.children, with_estimates);
        if let NodeKind::Directory {
            file_count,
            dir_count,
            error_count,
            compressed_bytes,
        } = &mut self.kind
        {
            *file_count = totals.file_count;
            *dir_count = totals.dir_count;
            *error_count = totals.error_count;
            *compressed_bytes = totals.compressed_bytes;
            self.size = totals.size;
            self.text_size = totals.text_size;
            self.gzip_size = totals.gzip_size;
            self.last_modified = totals.last_modified;
        }
    }

    /// Iterate over this node and all of its descendants in pre-order.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    /// Find a node by path within this subtree.
    pub fn find(&self, path: &Path) -> Option<&Node> {
        if self.path == path {
            return Some(self);
        }
        self.children
            .iter()
            .find(|child| path.starts_with(&child.path))
            .and_then(|child| child.find(path))
    }
}

/// Pre-order iterator returned by [`Node::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// Aggregate statistics folded over a list of sibling nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Total size in bytes.
    pub size: u64,
    /// Number of file nodes.
    pub file_count: u64,
    /// Number of directory nodes.
    pub dir_count: u64,
    /// Number of error nodes.
    pub error_count: u64,
    /// Bytes in already-compressed files.
    pub compressed_bytes: u64,
    /// Summed text size, when estimates are enabled.
    pub text_size: Option<u64>,
    /// Summed gzip size, when estimates are enabled.
    pub gzip_size: Option<u64>,
    /// Newest file modification time.
    #[serde(with = "crate::serde_ext::opt_timestamp")]
    pub last_modified: Option<SystemTime>,
}

impl Totals {
    /// Create empty totals.
    pub fn new(with_estimates: bool) -> Self {
        Self {
            text_size: with_estimates.then_some(0),
            gzip_size: with_estimates.then_some(0),
            ..Self::default()
        }
    }

    /// Fold totals over a list of children.
    pub fn from_children(children: &[Node], with_estimates: bool) -> Self {
        let mut totals = Self::new(with_estimates);
        for child in children {
            totals.add(child);
        }
        totals
    }

    /// Add one child's contribution.
    ///
    /// Directories contribute their own aggregates, files their own sizes and
    /// error nodes a single error.
    pub fn add(&mut self, child: &Node) {
        self.size += child.size;
        self.file_count += child.file_count();
        self.dir_count += child.dir_count() + u64::from(child.is_dir());
        self.error_count += child.error_count();
        self.compressed_bytes += child.compressed_bytes();

        if let Some(total) = self.text_size.as_mut() {
            *total += child.text_size.unwrap_or(0);
        }
        if let Some(total) = self.gzip_size.as_mut() {
            *total += child.gzip_size.unwrap_or(0);
        }

        if let Some(modified) = child.last_modified {
            self.last_modified = Some(match self.last_modified {
                Some(current) => current.max(modified),
                None => modified,
            });
        }
    }
}

fn entry_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}
