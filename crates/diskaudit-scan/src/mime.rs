//! Content type sniffing from magic bytes.
//!
//! Classification reads only a bounded prefix of a file and matches it
//! against [`SIGNATURES`], a static table of byte patterns. The table is
//! append-only: new rows go at the end and existing labels never change
//! meaning, so results from older scans stay comparable.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::LazyLock;

/// Version of the signature table. Bumped whenever rows are appended.
pub const SIGNATURE_TABLE_VERSION: u32 = 1;

/// Label for zero-length content.
pub const EMPTY_MIMETYPE: &str = "inode/x-empty";

/// Label for content that matched no signature but looks like text.
pub const TEXT_MIMETYPE: &str = "text/plain";

/// Label for content that matched no signature and is not text.
pub const BINARY_MIMETYPE: &str = "application/octet-stream";

/// Label for symbolic links, which are never followed.
pub const SYMLINK_MIMETYPE: &str = "inode/symlink";

/// Label for fifos, sockets and device nodes, which are never opened.
pub const SPECIAL_MIMETYPE: &str = "inode/x-special";

/// Result of classifying a content prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Detected mimetype.
    pub mimetype: &'static str,
    /// Whether the format is already compressed.
    pub compressed: bool,
}

impl Classification {
    /// Create a classification.
    pub const fn new(mimetype: &'static str, compressed: bool) -> Self {
        Self {
            mimetype,
            compressed,
        }
    }
}

/// One row of the signature table.
#[derive(Debug, Clone, Copy)]
pub struct Signature {
    /// `(offset, bytes)` pairs that must all match.
    pub patterns: &'static [(usize, &'static [u8])],
    /// Mimetype reported on a match.
    pub mimetype: &'static str,
    /// Whether the format is already compressed.
    pub compressed: bool,
}

impl Signature {
    /// Check whether `prefix` carries this signature.
    pub fn matches(&self, prefix: &[u8]) -> bool {
        self.patterns
            .iter()
            .all(|(offset, magic)| prefix.get(*offset..offset + magic.len()) == Some(*magic))
    }
}

const fn sig(
    patterns: &'static [(usize, &'static [u8])],
    mimetype: &'static str,
    compressed: bool,
) -> Signature {
    Signature {
        patterns,
        mimetype,
        compressed,
    }
}

/// Known signatures. The first matching row wins.
pub static SIGNATURES: &[Signature] = &[
    // Compressors and archives
    sig(&[(0, b"\x1f\x8b")], "application/gzip", true),
    sig(&[(0, b"BZh")], "application/x-bzip2", true),
    sig(&[(0, b"\xfd7zXZ\x00")], "application/x-xz", true),
    sig(&[(0, b"\x28\xb5\x2f\xfd")], "application/zstd", true),
    sig(&[(0, b"\x04\x22\x4d\x18")], "application/x-lz4", true),
    sig(&[(0, b"LZIP")], "application/x-lzip", true),
    sig(&[(0, b"\x89LZO\x00\r\n\x1a\n")], "application/x-lzop", true),
    sig(&[(0, b"\xff\x06\x00\x00sNaPpY")], "application/x-snappy-framed", true),
    sig(&[(0, b"\x1f\x9d")], "application/x-compress", true),
    sig(&[(0, b"7z\xbc\xaf\x27\x1c")], "application/x-7z-compressed", true),
    sig(&[(0, b"Rar!\x1a\x07")], "application/vnd.rar", true),
    sig(&[(0, b"PK\x03\x04")], "application/zip", true),
    sig(&[(0, b"PK\x05\x06")], "application/zip", true),
    sig(&[(0, b"PK\x07\x08")], "application/zip", true),
    sig(&[(0, b"MSCF")], "application/vnd.ms-cab-compressed", true),
    sig(&[(0, b"xar!")], "application/x-xar", true),
    sig(&[(0, b"\x60\xea")], "application/x-arj", true),
    sig(&[(20, b"\xdc\xa7\xc4\xfd")], "application/x-zoo", true),
    sig(&[(0, b"CRAM")], "application/x-cram", true),
    sig(&[(257, b"ustar")], "application/x-tar", false),
    // Images
    sig(&[(0, b"\x89PNG\r\n\x1a\n")], "image/png", true),
    sig(&[(0, b"\xff\xd8\xff")], "image/jpeg", true),
    sig(&[(0, b"GIF87a")], "image/gif", true),
    sig(&[(0, b"GIF89a")], "image/gif", true),
    sig(&[(0, b"RIFF"), (8, b"WEBP")], "image/webp", true),
    sig(&[(4, b"ftypheic")], "image/heic", true),
    sig(&[(4, b"ftypmif1")], "image/heif", true),
    sig(&[(4, b"ftypavif")], "image/avif", true),
    sig(&[(0, b"\x00\x00\x00\x0cjP  \r\n\x87\n")], "image/jp2", true),
    sig(&[(0, b"BM"), (6, b"\x00\x00\x00\x00")], "image/bmp", false),
    sig(&[(0, b"II*\x00")], "image/tiff", false),
    sig(&[(0, b"MM\x00*")], "image/tiff", false),
    // Audio
    sig(&[(0, b"ID3")], "audio/mpeg", true),
    sig(&[(0, b"\xff\xfb")], "audio/mpeg", true),
    sig(&[(0, b"\xff\xf3")], "audio/mpeg", true),
    sig(&[(0, b"\xff\xf2")], "audio/mpeg", true),
    sig(&[(0, b"fLaC")], "audio/flac", true),
    sig(&[(0, b"OggS")], "audio/ogg", true),
    sig(&[(0, b"RIFF"), (8, b"WAVE")], "audio/wav", false),
    sig(&[(4, b"ftypM4A")], "audio/mp4", true),
    // Video
    sig(&[(4, b"ftypqt")], "video/quicktime", true),
    sig(&[(4, b"ftyp")], "video/mp4", true),
    sig(&[(0, b"\x1a\x45\xdf\xa3")], "video/x-matroska", true),
    sig(&[(0, b"RIFF"), (8, b"AVI ")], "video/x-msvideo", true),
    sig(&[(0, b"\x00\x00\x01\xba")], "video/mpeg", true),
    sig(&[(0, b"\x00\x00\x01\xb3")], "video/mpeg", true),
    // Documents
    sig(&[(0, b"%PDF-")], "application/pdf", true),
    sig(&[(0, b"%!PS")], "application/postscript", false),
    // Other uncompressed formats
    sig(&[(0, b"\x7fELF")], "application/x-executable", false),
    sig(&[(0, b"SQLite format 3\x00")], "application/vnd.sqlite3", false),
    sig(&[(0, b"\x89HDF\r\n\x1a\n")], "application/x-hdf5", false),
    sig(&[(0, b"\xca\xfe\xba\xbe")], "application/java-vm", false),
    sig(&[(0, b"<?xml")], "text/xml", false),
];

static COMPRESSED_BY_LABEL: LazyLock<HashMap<&'static str, bool>> = LazyLock::new(|| {
    let mut labels = HashMap::with_capacity(SIGNATURES.len());
    for signature in SIGNATURES {
        labels
            .entry(signature.mimetype)
            .or_insert(signature.compressed);
    }
    labels
});

/// Classify a content prefix.
///
/// Never fails: empty input yields [`EMPTY_MIMETYPE`], unmatched input falls
/// back to [`TEXT_MIMETYPE`] or [`BINARY_MIMETYPE`].
pub fn classify(prefix: &[u8]) -> Classification {
    if prefix.is_empty() {
        return Classification::new(EMPTY_MIMETYPE, false);
    }

    if let Some(signature) = SIGNATURES.iter().find(|s| s.matches(prefix)) {
        return Classification::new(signature.mimetype, signature.compressed);
    }

    if looks_like_text(prefix) {
        Classification::new(TEXT_MIMETYPE, false)
    } else {
        Classification::new(BINARY_MIMETYPE, false)
    }
}

/// Classify a file by reading at most `sniff_len` bytes of it.
pub fn classify_path(path: &Path, sniff_len: usize) -> io::Result<Classification> {
    let mut file = File::open(path)?;
    let prefix = read_prefix(&mut file, sniff_len)?;
    Ok(classify(&prefix))
}

/// Check whether a mimetype label from the table denotes a compressed format.
pub fn is_compressed_mimetype(mimetype: &str) -> bool {
    COMPRESSED_BY_LABEL.get(mimetype).copied().unwrap_or(false)
}

/// Read up to `len` bytes from the start of `reader`.
pub(crate) fn read_prefix(reader: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(len.min(64 * 1024));
    reader.take(len as u64).read_to_end(&mut prefix)?;
    Ok(prefix)
}

/// UTF-8 without NUL bytes. A multi-byte character cut off by the end of the
/// prefix still counts as text.
fn looks_like_text(prefix: &[u8]) -> bool {
    if prefix.contains(&0) {
        return false;
    }
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    }
}
