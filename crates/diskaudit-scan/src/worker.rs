//! Messages exchanged between the dispatcher and its workers.
//!
//! A worker receives a [`Job`] (paths plus immutable options) and answers
//! with one completed subtree per path, in the same order. Process workers
//! speak this protocol as JSON over stdin/stdout via [`serve`].

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitStatus;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use diskaudit_core::{Node, ScanOptions};

use crate::aggregate::TreeAggregator;

/// A unit of work: top-level directories to aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Directories to scan, each into its own subtree.
    #[serde(with = "diskaudit_core::serde_ext::raw_paths")]
    pub paths: Vec<PathBuf>,
    /// Options for the scan.
    pub options: ScanOptions,
}

impl Job {
    /// Create a job.
    pub fn new(paths: Vec<PathBuf>, options: ScanOptions) -> Self {
        Self { paths, options }
    }

    /// Aggregate every path in order.
    pub fn run(&self) -> Vec<Node> {
        let aggregator = TreeAggregator::new(&self.options);
        self.paths
            .iter()
            .map(|path| {
                debug!(path = %path.display(), "aggregating subtree");
                aggregator.aggregate(path)
            })
            .collect()
    }

    /// Check that a reply has one subtree per path.
    pub fn check_reply(&self, nodes: Vec<Node>) -> Result<Vec<Node>, WorkerFault> {
        if nodes.len() == self.paths.len() {
            Ok(nodes)
        } else {
            Err(WorkerFault::Mismatch {
                expected: self.paths.len(),
                got: nodes.len(),
            })
        }
    }
}

/// A worker that failed outright instead of returning subtrees.
#[derive(Debug, Error)]
pub enum WorkerFault {
    /// The worker thread panicked.
    #[error("Worker panicked: {message}")]
    Panicked { message: String },

    /// The worker process could not be started.
    #[error("Failed to start worker {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker process exited unsuccessfully.
    #[error("Worker exited with {status}")]
    Exit { status: ExitStatus },

    /// Talking to the worker failed.
    #[error("Worker I/O error: {0}")]
    Io(#[from] io::Error),

    /// A message could not be encoded or decoded.
    #[error("Malformed worker message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The reply did not have one subtree per path.
    #[error("Worker returned {got} subtrees for {expected} paths")]
    Mismatch { expected: usize, got: usize },
}

/// Serve a single job: read it from `input`, write the subtrees to `output`.
pub fn serve(input: impl Read, mut output: impl Write) -> Result<(), WorkerFault> {
    let job: Job = serde_json::from_reader(input)?;
    let nodes = job.run();
    serde_json::to_writer(&mut output, &nodes)?;
    output.flush()?;
    Ok(())
}
