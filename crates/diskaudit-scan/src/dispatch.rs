//! Root scanning and parallel dispatch of top-level subtrees.
//!
//! The coordinator lists the root once, builds top-level files itself and
//! hands the top-level directories to workers in round-robin batches. Workers
//! share nothing with the coordinator or each other: each gets a [`Job`] and
//! returns subtrees. A worker that faults has its directories replaced by
//! `Unreadable` error nodes. Results are put back in listing order before the
//! root is sealed, so the tree does not depend on the worker count.

use std::any::Any;
use std::fs;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use diskaudit_core::{AuditTree, ErrorReason, Node, ScanError, ScanOptions};

use crate::aggregate::{self, TreeAggregator};
use crate::builder::NodeBuilder;
use crate::worker::{Job, WorkerFault};

/// How top-level subtrees are run when more than one worker is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WorkerBackend {
    /// One thread per worker in a dedicated rayon pool.
    #[default]
    Threads,
    /// One child process per worker, speaking the JSON job protocol.
    Processes {
        /// Executable that serves [`crate::worker::serve`] on stdin/stdout.
        program: PathBuf,
        /// Arguments selecting worker mode.
        args: Vec<String>,
    },
}

/// Scans a root path into an [`AuditTree`].
#[derive(Debug, Clone, Default)]
pub struct Auditor {
    backend: WorkerBackend,
}

impl Auditor {
    /// Create an auditor using thread workers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an auditor with the given backend.
    pub fn with_backend(backend: WorkerBackend) -> Self {
        Self { backend }
    }

    /// Create an auditor that runs workers as child processes.
    pub fn with_process_workers<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_backend(WorkerBackend::Processes {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// The configured backend.
    pub fn backend(&self) -> &WorkerBackend {
        &self.backend
    }

    /// Scan `root`.
    ///
    /// Never fails: if the root cannot be accessed the returned tree has
    /// `success == false` and an error node as its root.
    pub fn scan(&self, root: impl AsRef<Path>, options: &ScanOptions) -> AuditTree {
        let start = Instant::now();
        let root = root.as_ref();
        info!(
            root = %root.display(),
            workers = options.workers,
            estimates = options.compute_estimates,
            "starting scan"
        );

        let (node, root_path, success) = match self.scan_root(root, options) {
            Ok((node, root_path)) => (node, root_path, true),
            Err(err) => {
                warn!(root = %root.display(), error = %err, "root is not accessible");
                (Node::new_error(root, err.reason()), root.to_path_buf(), false)
            }
        };

        let tree = AuditTree::new(node, root_path, success, options.clone(), start.elapsed());
        info!(
            size = tree.total_size(),
            files = tree.total_files(),
            errors = tree.total_errors(),
            elapsed_ms = tree.scan_duration.as_millis() as u64,
            "scan finished"
        );
        tree
    }

    fn scan_root(&self, root: &Path, options: &ScanOptions) -> Result<(Node, PathBuf), ScanError> {
        let root_path = root.canonicalize().map_err(|e| ScanError::io(root, e))?;
        let metadata = fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }
        let entries = aggregate::list_dir(&root_path).map_err(|e| ScanError::io(&root_path, e))?;

        let builder = NodeBuilder::new(options);
        let mut slots: Vec<Option<Node>> = Vec::with_capacity(entries.len());
        let mut dirs: Vec<(usize, PathBuf)> = Vec::new();
        for path in entries {
            let node = builder.build(&path);
            if node.is_dir() {
                dirs.push((slots.len(), path));
                slots.push(None);
            } else {
                slots.push(Some(node));
            }
        }

        for (index, subtree) in self.run_subtrees(dirs, options) {
            slots[index] = Some(subtree);
        }

        let mut node = Node::new_directory(&root_path);
        node.children = slots.into_iter().flatten().collect();
        node.seal(options.compute_estimates);
        Ok((node, root_path))
    }

    /// Aggregate top-level directories, returning `(slot, subtree)` pairs.
    fn run_subtrees(&self, dirs: Vec<(usize, PathBuf)>, options: &ScanOptions) -> Vec<(usize, Node)> {
        let workers = options.workers.max(1).min(dirs.len());
        if workers <= 1 {
            let aggregator = TreeAggregator::new(options);
            return dirs
                .into_iter()
                .map(|(index, path)| (index, aggregator.aggregate(&path)))
                .collect();
        }

        let batches = partition(dirs, workers);
        let jobs: Vec<Job> = batches
            .iter()
            .map(|batch| Job::new(batch.iter().map(|(_, p)| p.clone()).collect(), options.clone()))
            .collect();
        debug!(workers, backend = ?self.backend, "dispatching top-level directories");

        let replies = match &self.backend {
            WorkerBackend::Threads => run_threads(jobs),
            WorkerBackend::Processes { program, args } => run_processes(program, args, jobs),
        };

        batches
            .into_iter()
            .zip(replies)
            .flat_map(|(batch, reply)| match reply {
                Ok(nodes) => batch
                    .into_iter()
                    .map(|(index, _)| index)
                    .zip(nodes)
                    .collect::<Vec<_>>(),
                Err(fault) => {
                    warn!(error = %fault, dirs = batch.len(), "worker failed, marking its directories unreadable");
                    batch
                        .into_iter()
                        .map(|(index, path)| (index, Node::new_error(path, ErrorReason::Unreadable)))
                        .collect::<Vec<_>>()
                }
            })
            .collect()
    }
}

/// Scan `root` with thread workers.
pub fn scan(root: impl AsRef<Path>, options: &ScanOptions) -> AuditTree {
    Auditor::new().scan(root, options)
}

/// Deal items round-robin into `count` batches.
pub(crate) fn partition<T>(items: Vec<T>, count: usize) -> Vec<Vec<T>> {
    let count = count.max(1);
    let mut batches: Vec<Vec<T>> = (0..count).map(|_| Vec::new()).collect();
    for (n, item) in items.into_iter().enumerate() {
        batches[n % count].push(item);
    }
    batches
}

fn run_threads(jobs: Vec<Job>) -> Vec<Result<Vec<Node>, WorkerFault>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.len())
        .thread_name(|i| format!("diskaudit-worker-{i}"))
        .build();

    match pool {
        Ok(pool) => pool.install(|| {
            jobs.into_par_iter()
                .map(|job| run_isolated(|| job.run()))
                .collect()
        }),
        Err(err) => {
            warn!(error = %err, "cannot build worker pool, scanning sequentially");
            jobs.into_iter().map(|job| run_isolated(|| job.run())).collect()
        }
    }
}

/// Run a worker body, turning a panic into a fault.
fn run_isolated(work: impl FnOnce() -> Vec<Node>) -> Result<Vec<Node>, WorkerFault> {
    panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| WorkerFault::Panicked {
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_processes(program: &Path, args: &[String], jobs: Vec<Job>) -> Vec<Result<Vec<Node>, WorkerFault>> {
    // Start every worker before waiting on any of them.
    let children: Vec<_> = jobs
        .iter()
        .map(|job| spawn_worker(program, args, job))
        .collect();

    children
        .into_iter()
        .zip(&jobs)
        .map(|(child, job)| collect_reply(child?, job))
        .collect()
}

fn spawn_worker(program: &Path, args: &[String], job: &Job) -> Result<Child, WorkerFault> {
    let request = serde_json::to_vec(job)?;
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| WorkerFault::Spawn {
            program: program.to_path_buf(),
            source,
        })?;

    // Dropping stdin after the write signals end of input.
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(err) = stdin.write_all(&request) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err.into());
        }
    }
    Ok(child)
}

fn collect_reply(child: Child, job: &Job) -> Result<Vec<Node>, WorkerFault> {
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(WorkerFault::Exit {
            status: output.status,
        });
    }
    let nodes: Vec<Node> = serde_json::from_slice(&output.stdout)?;
    job.check_reply(nodes)
}
