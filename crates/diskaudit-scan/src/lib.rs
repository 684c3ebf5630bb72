//! Tree building and aggregation engine for diskaudit.
//!
//! This crate walks a directory tree, classifies and measures every file and
//! folds the results into per-directory totals.
//!
//! # Overview
//!
//! - [`mime`] sniffs content types from a bounded prefix of each file
//! - [`estimate`] measures gzip output for content that is not already compressed
//! - [`NodeBuilder`] turns one filesystem entry into one node
//! - [`TreeAggregator`] recurses depth-first and folds child totals
//! - [`Auditor`] splits the root's subdirectories across workers and merges
//!   the results
//!
//! Entries that vanish or cannot be read become error nodes instead of
//! failing the scan. Only an inaccessible root yields `success == false`.
//!
//! # Example
//!
//! ```rust,no_run
//! use diskaudit_scan::{ScanOptions, scan};
//!
//! let options = ScanOptions::builder()
//!     .compute_estimates(true)
//!     .workers(4usize)
//!     .build()
//!     .unwrap();
//! let tree = scan("/path/to/audit", &options);
//!
//! println!("Total size: {} bytes", tree.total_size());
//! println!("Gzip estimate: {:?} bytes", tree.root.gzip_size);
//! println!("Unscanned entries: {}", tree.total_errors());
//! ```
//!
//! # Process workers
//!
//! With [`WorkerBackend::Processes`] each worker is a child process that
//! reads a JSON [`Job`] on stdin and answers on stdout. The program must call
//! [`worker::serve`]:
//!
//! ```rust,no_run
//! use diskaudit_scan::{Auditor, ScanOptions};
//!
//! let auditor = Auditor::with_process_workers("/usr/local/bin/diskaudit", ["worker"]);
//! let options = ScanOptions::builder().workers(8usize).build().unwrap();
//! let tree = auditor.scan("/data", &options);
//! ```

mod aggregate;
mod builder;
mod dispatch;
pub mod estimate;
pub mod mime;
pub mod worker;

pub use aggregate::TreeAggregator;
pub use builder::NodeBuilder;
pub use dispatch::{Auditor, WorkerBackend, scan};
pub use worker::{Job, WorkerFault};

// Re-export core types for convenience
pub use diskaudit_core::{
    AuditTree, ErrorReason, Node, NodeKind, ScanError, ScanOptions, ScanOptionsBuilder, Totals,
};
