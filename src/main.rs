//! diskaudit - Audit where the bytes in a directory tree go.
//!
//! Usage:
//!   diskaudit report DIR        Scan a tree and print per-directory totals
//!   diskaudit mimetype FILE     Print the sniffed mimetype of one file
//!   diskaudit --help            Show help

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use diskaudit_core::{AuditTree, DEFAULT_SNIFF_LEN, Node, ScanOptions};
use diskaudit_scan::{Auditor, mime, worker};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "DISKAUDIT_LOG";

#[derive(Parser)]
#[command(
    name = "diskaudit",
    version,
    about = "Data management audit tool",
    long_about = "diskaudit reports how much space each directory uses, how much of it \
                  is already compressed, and how small the rest would get under gzip."
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a data management audit report
    Report {
        /// Directory to audit
        directory: PathBuf,

        /// Number of levels of nesting to report
        #[arg(short, long, default_value = "2")]
        level: usize,

        /// Parameter to sort by
        #[arg(short, long, value_enum, default_value_t = SortBy::Size)]
        sort_by: SortBy,

        /// Reverse the sort order
        #[arg(short, long)]
        reverse: bool,

        /// Report compressed share and gzip estimates (reads every file in full)
        #[arg(short = 'm', long)]
        check_mimetype: bool,

        /// Number of parallel workers
        #[arg(short = 'j', long)]
        workers: Option<usize>,

        /// Run workers as threads in this process instead of child processes
        #[arg(long)]
        threads: bool,

        /// Write the full tree as JSON to this file
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Load scan options from a JSON file; flags take precedence
        #[arg(long, value_name = "FILE")]
        options: Option<PathBuf>,
    },

    /// Print the perceived mimetype and whether it is compressed
    Mimetype {
        /// File to inspect
        file: PathBuf,
    },

    /// Serve one scan job over stdin/stdout
    #[command(hide = true)]
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SortBy {
    Size,
    Mtime,
    Name,
    Files,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Report {
            directory,
            level,
            sort_by,
            reverse,
            check_mimetype,
            workers,
            threads,
            json,
            options,
        } => {
            let options = load_options(options.as_deref(), check_mimetype, workers)?;
            let tree = run_scan(&directory, &options, threads)?;

            print_report(&tree, level, sort_by, reverse, check_mimetype);

            if let Some(output) = json {
                export_json(&tree, &output)?;
            }
            if !tree.success {
                bail!("Cannot audit {}", directory.display());
            }
        }
        Command::Mimetype { file } => {
            let class = mime::classify_path(&file, DEFAULT_SNIFF_LEN)
                .with_context(|| format!("Cannot read {}", file.display()))?;
            println!(
                "{} compressed={}",
                class.mimetype,
                mime::is_compressed_mimetype(class.mimetype)
            );
        }
        Command::Worker => {
            let stdout = io::stdout();
            worker::serve(io::stdin().lock(), BufWriter::new(stdout.lock()))
                .context("Worker failed")?;
        }
    }

    Ok(())
}

/// Install the stderr subscriber. Stdout carries reports and worker replies.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Resolve scan options: JSON file first, then command-line overrides.
fn load_options(path: Option<&Path>, check_mimetype: bool, workers: Option<usize>) -> Result<ScanOptions> {
    let mut options = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read options from {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid options in {}", path.display()))?
        }
        None => ScanOptions::default(),
    };

    if check_mimetype {
        options.compute_estimates = true;
    }
    if let Some(workers) = workers {
        options.workers = workers;
    }
    options.validate()?;
    Ok(options)
}

/// Workers run as child processes unless `threads` is set, so a worker that
/// aborts or is killed only costs its own directories.
fn run_scan(directory: &Path, options: &ScanOptions, threads: bool) -> Result<AuditTree> {
    let auditor = if threads || options.workers <= 1 {
        Auditor::new()
    } else {
        let program = std::env::current_exe().context("Cannot locate own executable")?;
        Auditor::with_process_workers(program, ["worker"])
    };

    eprintln!("Auditing {}...", directory.display());
    Ok(auditor.scan(directory, options))
}

fn print_report(tree: &AuditTree, level: usize, sort_by: SortBy, reverse: bool, check_mimetype: bool) {
    println!("{}", "─".repeat(60));
    println!(" diskaudit {}", env!("CARGO_PKG_VERSION"));
    println!(" Auditing directory: {}", tree.root_path.display());
    println!(" Scanned in {:.2}s", tree.scan_duration.as_secs_f64());
    if tree.total_errors() > 0 {
        println!(" {} entries could not be scanned", tree.total_errors());
    }
    println!("{}", "─".repeat(60));
    println!();

    if check_mimetype {
        println!("{:>10} {:>10} {:>10} {:>8} {:>7} {:<10}", "Total", "Compressed", "Gzip", "#Files", "#Errors", "Last write");
    } else {
        println!("{:>10} {:>8} {:>7} {:<10}", "Total", "#Files", "#Errors", "Last write");
    }

    print_dir(&tree.root, 0, level, sort_by, reverse, check_mimetype);
}

/// Print a directory row, then its subdirectories down to `max_level`.
fn print_dir(node: &Node, level: usize, max_level: usize, sort_by: SortBy, reverse: bool, check_mimetype: bool) {
    let mut row = format!("{:>10} ", format_size(node.size));
    if check_mimetype {
        row.push_str(&format!(
            "{:>10} {:>10} ",
            format_share(node.compressed_bytes(), node.size),
            node.gzip_size.map(format_size).unwrap_or_else(|| "NA".to_string())
        ));
    }
    row.push_str(&format!(
        "{:>8} {:>7} {:<10} ",
        node.file_count(),
        node.error_count(),
        format_date(node.last_modified)
    ));
    if level > 0 {
        row.push_str(&"-".repeat(level));
        row.push(' ');
    }
    row.push_str(&node.name);
    if node.is_error() {
        if let Some(reason) = node.error_reason() {
            row.push_str(&format!(" ({reason})"));
        }
    }
    println!("{row}");

    if level >= max_level {
        return;
    }

    let mut dirs: Vec<&Node> = node.children.iter().filter(|c| !c.is_file()).collect();
    dirs.sort_by(|a, b| compare(a, b, sort_by));
    if reverse {
        dirs.reverse();
    }
    for dir in dirs {
        print_dir(dir, level + 1, max_level, sort_by, reverse, check_mimetype);
    }
}

/// Ascending order, except size which lists the largest first.
fn compare(a: &Node, b: &Node, sort_by: SortBy) -> Ordering {
    match sort_by {
        SortBy::Size => b.size.cmp(&a.size),
        SortBy::Mtime => a.last_modified.cmp(&b.last_modified),
        SortBy::Name => a.name.cmp(&b.name),
        SortBy::Files => a.file_count().cmp(&b.file_count()),
    }
    .then_with(|| a.name.cmp(&b.name))
}

fn export_json(tree: &AuditTree, output: &Path) -> Result<()> {
    let file = File::create(output).with_context(|| format!("Cannot create {}", output.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), tree)?;
    eprintln!("Exported to {}", output.display());
    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_share(part: u64, total: u64) -> String {
    if total == 0 {
        "NA".to_string()
    } else {
        format!("{:.1}%", 100.0 * part as f64 / total as f64)
    }
}

fn format_date(time: Option<SystemTime>) -> String {
    match time {
        Some(time) => DateTime::<Local>::from(time).format("%Y-%m-%d").to_string(),
        None => "-".to_string(),
    }
}
