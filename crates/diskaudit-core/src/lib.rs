//! Core types for diskaudit.
//!
//! This crate provides the data structures shared by the scanning engine and
//! the reporting layer: tree nodes, aggregate totals, scan options and the
//! audit result.

mod config;
mod error;
mod node;
pub mod serde_ext;
mod tree;

pub use config::{
    DEFAULT_GZIP_LEVEL, DEFAULT_SNIFF_LEN, ScanOptions, ScanOptionsBuilder, ScanOptionsBuilderError,
};
pub use error::ScanError;
pub use node::{ErrorReason, Node, NodeKind, Totals, Walk};
pub use tree::AuditTree;
