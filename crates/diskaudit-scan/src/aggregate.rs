//! Depth-first directory aggregation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use diskaudit_core::{ErrorReason, Node, ScanOptions};

use crate::builder::NodeBuilder;

/// Recursively scans a directory and folds child totals into each parent.
///
/// A directory that cannot be listed turns into an error node; the rest of
/// the traversal carries on.
#[derive(Debug, Clone, Copy)]
pub struct TreeAggregator<'a> {
    options: &'a ScanOptions,
    builder: NodeBuilder<'a>,
}

impl<'a> TreeAggregator<'a> {
    /// Create an aggregator for the given options.
    pub fn new(options: &'a ScanOptions) -> Self {
        Self {
            options,
            builder: NodeBuilder::new(options),
        }
    }

    /// Build and fully aggregate the entry at `path`.
    pub fn aggregate(&self, path: &Path) -> Node {
        let node = self.builder.build(path);
        if node.is_dir() { self.complete(node) } else { node }
    }

    /// Fill a directory shell from [`NodeBuilder`] with its children and totals.
    ///
    /// Non-directory nodes are returned unchanged.
    pub fn complete(&self, mut shell: Node) -> Node {
        if !shell.is_dir() {
            return shell;
        }

        // The listing is collected up front so no directory handle stays open
        // while descending.
        let entries = match list_dir(&shell.path) {
            Ok(entries) => entries,
            Err(err) => {
                let reason = ErrorReason::from_io(&err);
                warn!(path = %shell.path.display(), error = %err, %reason, "cannot list directory");
                return shell.into_error(reason);
            }
        };

        shell.children.reserve_exact(entries.len());
        for entry in entries {
            let child = self.aggregate(&entry);
            shell.children.push(child);
        }

        shell.seal(self.options.compute_estimates);
        shell
    }
}

/// List the immediate entries of `dir` in directory order.
///
/// Entries that fail mid-iteration are logged and skipped; only a failure
/// to open the directory is returned.
pub(crate) fn list_dir(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        match entry {
            Ok(entry) => paths.push(entry.path()),
            Err(err) => warn!(path = %dir.display(), error = %err, "skipping unreadable entry"),
        }
    }
    Ok(paths)
}
