//! Node construction for a single filesystem entry.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::debug;

use diskaudit_core::{ErrorReason, Node, ScanOptions};

use crate::estimate::{self, SizeEstimate};
use crate::mime::{self, Classification, SPECIAL_MIMETYPE, SYMLINK_MIMETYPE};

/// Builds one node per filesystem entry.
///
/// Directories come back as empty shells for [`TreeAggregator`] to fill.
/// Failures never propagate: an entry that cannot be stat'd or read becomes
/// an error node.
///
/// [`TreeAggregator`]: crate::TreeAggregator
#[derive(Debug, Clone, Copy)]
pub struct NodeBuilder<'a> {
    options: &'a ScanOptions,
}

impl<'a> NodeBuilder<'a> {
    /// Create a builder for the given options.
    pub fn new(options: &'a ScanOptions) -> Self {
        Self { options }
    }

    /// Build the node for `path`.
    pub fn build(&self, path: &Path) -> Node {
        let metadata = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "stat failed");
                return Node::new_error(path, ErrorReason::from_io(&err));
            }
        };

        let file_type = metadata.file_type();
        if file_type.is_dir() {
            return Node::new_directory(path);
        }

        let node = Node::new_file(path, metadata.len(), metadata.modified().ok());
        let built = if file_type.is_file() {
            self.regular_file(node)
        } else if file_type.is_symlink() {
            self.symlink(node)
        } else {
            Ok(self.special(node))
        };

        // Unreadable content still counts at its stat size.
        built.unwrap_or_else(|err| {
            debug!(path = %path.display(), error = %err, "content unreadable, keeping stat size");
            Node::new_file(path, metadata.len(), metadata.modified().ok())
        })
    }

    fn regular_file(&self, node: Node) -> io::Result<Node> {
        let mut file = File::open(&node.path)?;
        let prefix = mime::read_prefix(&mut file, self.options.sniff_len)?;
        let class = mime::classify(&prefix);

        let sizes = if self.wants_estimate(class) {
            Some(estimate::estimate(&prefix, &mut file, self.options.gzip_level)?)
        } else {
            None
        };

        Ok(apply(node, class, sizes))
    }

    /// Links are never followed; the link target is the content.
    fn symlink(&self, node: Node) -> io::Result<Node> {
        let target = fs::read_link(&node.path)?;
        let class = Classification::new(SYMLINK_MIMETYPE, false);
        let sizes = self
            .wants_estimate(class)
            .then(|| estimate::estimate_bytes(target.as_os_str().as_encoded_bytes(), self.options.gzip_level));

        Ok(apply(node, class, sizes))
    }

    /// Fifos, sockets and devices are never opened and count as empty.
    fn special(&self, node: Node) -> Node {
        let class = Classification::new(SPECIAL_MIMETYPE, false);
        let sizes = self
            .wants_estimate(class)
            .then(|| estimate::estimate_bytes(&[], self.options.gzip_level));

        apply(node, class, sizes)
    }

    fn wants_estimate(&self, class: Classification) -> bool {
        self.options.compute_estimates && !class.compressed
    }
}

fn apply(node: Node, class: Classification, sizes: Option<SizeEstimate>) -> Node {
    let mut node = node.with_classification(class.mimetype, class.compressed);
    if let Some(sizes) = sizes {
        node.text_size = Some(sizes.text_size);
        node.gzip_size = Some(sizes.gzip_size);
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::{EMPTY_MIMETYPE, TEXT_MIMETYPE};
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";

    #[test]
    fn test_text_file_with_estimates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "the quick brown fox\n".repeat(50)).unwrap();

        let options = ScanOptions::with_estimates(true);
        let node = NodeBuilder::new(&options).build(&path);

        assert!(node.is_file());
        assert_eq!(node.size, 1000);
        assert_eq!(node.mimetype(), Some(TEXT_MIMETYPE));
        assert_eq!(node.compressed_format(), Some(false));
        assert_eq!(node.text_size, Some(1000));
        assert!(node.gzip_size.unwrap() < 1000);
        assert!(node.last_modified.is_some());
    }

    #[test]
    fn test_compressed_file_skips_estimates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plot.png");
        fs::write(&path, PNG_HEADER).unwrap();

        let options = ScanOptions::with_estimates(true);
        let node = NodeBuilder::new(&options).build(&path);

        assert_eq!(node.mimetype(), Some("image/png"));
        assert_eq!(node.compressed_format(), Some(true));
        assert!(node.text_size.is_none());
        assert!(node.gzip_size.is_none());
    }

    #[test]
    fn test_estimates_disabled() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        fs::write(&path, "text").unwrap();

        let options = ScanOptions::default();
        let node = NodeBuilder::new(&options).build(&path);

        assert_eq!(node.mimetype(), Some(TEXT_MIMETYPE));
        assert!(node.text_size.is_none());
        assert!(node.gzip_size.is_none());
    }

    #[test]
    fn test_large_file_beyond_sniff_len() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("big.txt");
        let content = "0123456789abcdef".repeat(2048);
        fs::write(&path, &content).unwrap();

        let options = ScanOptions::builder()
            .compute_estimates(true)
            .sniff_len(64usize)
            .build()
            .unwrap();
        let node = NodeBuilder::new(&options).build(&path);

        assert_eq!(node.text_size, Some(content.len() as u64));
        assert_eq!(
            node.gzip_size,
            Some(estimate::estimate_bytes(content.as_bytes(), options.gzip_level).gzip_size)
        );
    }

    #[test]
    fn test_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("empty");
        fs::write(&path, b"").unwrap();

        let options = ScanOptions::with_estimates(true);
        let node = NodeBuilder::new(&options).build(&path);

        assert_eq!(node.size, 0);
        assert_eq!(node.mimetype(), Some(EMPTY_MIMETYPE));
        assert_eq!(node.compressed_format(), Some(false));
        assert_eq!(node.text_size, Some(0));
    }

    #[test]
    fn test_directory_shell() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/file"), "x").unwrap();

        let options = ScanOptions::default();
        let node = NodeBuilder::new(&options).build(&temp.path().join("sub"));

        assert!(node.is_dir());
        assert!(node.children.is_empty());
        assert_eq!(node.size, 0);
    }

    #[test]
    fn test_missing_entry_is_vanished() {
        let temp = TempDir::new().unwrap();
        let options = ScanOptions::default();
        let node = NodeBuilder::new(&options).build(&temp.path().join("gone"));

        assert_eq!(node.error_reason(), Some(ErrorReason::VanishedDuringScan));
        assert_eq!(node.size, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_content_keeps_size() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("locked.txt");
        fs::write(&path, "z".repeat(1000)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still open the file.
        if File::open(&path).is_ok() {
            return;
        }

        let options = ScanOptions::with_estimates(true);
        let node = NodeBuilder::new(&options).build(&path);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        assert!(node.is_file());
        assert_eq!(node.size, 1000);
        assert!(node.mimetype().is_none());
        assert!(node.compressed_format().is_none());
        assert!(node.text_size.is_none());
        assert!(node.gzip_size.is_none());
        assert!(node.last_modified.is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_not_followed() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("target.png");
        fs::write(&target, PNG_HEADER).unwrap();
        let link = temp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let options = ScanOptions::with_estimates(true);
        let node = NodeBuilder::new(&options).build(&link);

        assert!(node.is_file());
        assert_eq!(node.mimetype(), Some(SYMLINK_MIMETYPE));
        assert_eq!(
            node.text_size,
            Some(target.as_os_str().as_encoded_bytes().len() as u64)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_a_file() {
        let temp = TempDir::new().unwrap();
        let link = temp.path().join("dangling");
        std::os::unix::fs::symlink(temp.path().join("nowhere"), &link).unwrap();

        let options = ScanOptions::default();
        let node = NodeBuilder::new(&options).build(&link);

        assert!(node.is_file());
        assert_eq!(node.mimetype(), Some(SYMLINK_MIMETYPE));
    }
}
