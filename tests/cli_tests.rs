//! End-to-end tests for the diskaudit binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use diskaudit_core::{AuditTree, ErrorReason, ScanOptions};
use diskaudit_scan::{Auditor, scan};
use tempfile::TempDir;

const BIN: &str = env!("CARGO_BIN_EXE_diskaudit");

fn diskaudit(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .env_remove("DISKAUDIT_LOG")
        .output()
        .unwrap()
}

fn create_tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("docs/drafts")).unwrap();
    fs::create_dir_all(root.join("media")).unwrap();
    fs::create_dir_all(root.join("logs")).unwrap();

    fs::write(root.join("docs/guide.txt"), "how to audit\n".repeat(40)).unwrap();
    fs::write(root.join("docs/drafts/todo.txt"), "write more docs\n").unwrap();
    fs::write(root.join("media/photo.jpg"), b"\xff\xd8\xff\xe0\x00\x10JFIF\x00").unwrap();
    fs::write(root.join("logs/app.log"), "INFO started\n".repeat(100)).unwrap();
    fs::write(root.join("top.txt"), "top").unwrap();

    temp
}

#[test]
fn test_report_lists_directories() {
    let temp = create_tree();
    let dir = temp.path().to_str().unwrap();

    let output = diskaudit(&["report", dir, "-l", "1"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Last write"));
    assert!(stdout.contains("- docs"));
    assert!(stdout.contains("- media"));
    assert!(stdout.contains("- logs"));
    // Level 1 stops before nested directories.
    assert!(!stdout.contains("drafts"));
    // Only directories are reported.
    assert!(!stdout.contains("top.txt"));
}

#[test]
fn test_report_sorted_by_size() {
    let temp = create_tree();
    let dir = temp.path().to_str().unwrap();

    let stdout = String::from_utf8(diskaudit(&["report", dir, "-l", "1"]).stdout).unwrap();
    let logs = stdout.find("- logs").unwrap();
    let docs = stdout.find("- docs").unwrap();
    let media = stdout.find("- media").unwrap();
    assert!(logs < docs && docs < media, "{stdout}");

    let stdout = String::from_utf8(diskaudit(&["report", dir, "-l", "1", "-r"]).stdout).unwrap();
    assert!(stdout.find("- media").unwrap() < stdout.find("- logs").unwrap());

    let stdout = String::from_utf8(diskaudit(&["report", dir, "-l", "1", "-s", "name"]).stdout).unwrap();
    assert!(stdout.find("- docs").unwrap() < stdout.find("- logs").unwrap());
    assert!(stdout.find("- logs").unwrap() < stdout.find("- media").unwrap());
}

#[test]
fn test_report_with_mimetype_check() {
    let temp = create_tree();
    let dir = temp.path().to_str().unwrap();

    let output = diskaudit(&["report", dir, "-m", "-j", "2", "-l", "3"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Compressed"));
    assert!(stdout.contains("Gzip"));
    assert!(stdout.contains("100.0%"));
    assert!(stdout.contains("-- drafts"));
}

#[test]
fn test_report_json_export() {
    let temp = create_tree();
    let out = TempDir::new().unwrap();
    let json = out.path().join("tree.json");

    let output = diskaudit(&[
        "report",
        temp.path().to_str().unwrap(),
        "-m",
        "--json",
        json.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let tree: AuditTree = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert!(tree.success);
    assert_eq!(tree.total_files(), 5);
    assert!(tree.root.gzip_size.is_some());
}

#[test]
fn test_report_missing_directory_fails() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope");

    let output = diskaudit(&["report", missing.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_report_rejects_zero_workers() {
    let temp = create_tree();
    let output = diskaudit(&["report", temp.path().to_str().unwrap(), "-j", "0"]);
    assert!(!output.status.success());
}

#[test]
fn test_report_options_file() {
    let temp = create_tree();
    let out = TempDir::new().unwrap();
    let options = out.path().join("options.json");
    let json = out.path().join("tree.json");
    fs::write(&options, r#"{"compute_estimates": true, "gzip_level": 1}"#).unwrap();

    let output = diskaudit(&[
        "report",
        temp.path().to_str().unwrap(),
        "--options",
        options.to_str().unwrap(),
        "--json",
        json.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let tree: AuditTree = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert!(tree.options.compute_estimates);
    assert_eq!(tree.options.gzip_level, 1);
}

#[test]
fn test_mimetype_command() {
    let temp = create_tree();

    let output = diskaudit(&["mimetype", temp.path().join("media/photo.jpg").to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "image/jpeg compressed=true");

    let output = diskaudit(&["mimetype", temp.path().join("top.txt").to_str().unwrap()]);
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), "text/plain compressed=false");
}

#[test]
fn test_process_workers_match_thread_workers() {
    let temp = create_tree();
    let options = ScanOptions::builder()
        .compute_estimates(true)
        .workers(3usize)
        .build()
        .unwrap();

    let threads = scan(temp.path(), &options);
    let processes = Auditor::with_process_workers(Path::new(BIN), ["worker"]).scan(temp.path(), &options);

    assert!(processes.success);
    assert_eq!(processes.total_errors(), 0);
    assert_eq!(processes.root, threads.root);
}

#[test]
fn test_report_with_process_workers() {
    let temp = create_tree();
    let output = diskaudit(&["report", temp.path().to_str().unwrap(), "-j", "2"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("- logs"));
    assert!(!stdout.contains("could not be scanned"));
}

#[test]
fn test_report_with_thread_workers() {
    let temp = create_tree();
    let output = diskaudit(&["report", temp.path().to_str().unwrap(), "-j", "2", "--threads"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("- docs"));
    assert!(!stdout.contains("could not be scanned"));
}

/// Top-level directories a..d with a little content each.
fn create_four_dirs() -> TempDir {
    let temp = TempDir::new().unwrap();
    for (i, dir) in ["a", "b", "c", "d"].iter().enumerate() {
        fs::create_dir(temp.path().join(dir)).unwrap();
        fs::write(temp.path().join(dir).join("data.txt"), "x".repeat(i + 1)).unwrap();
    }
    temp
}

fn process_scan(root: &Path, workers: usize) -> AuditTree {
    let options = ScanOptions::builder().workers(workers).build().unwrap();
    Auditor::with_process_workers(Path::new(BIN), ["worker"]).scan(root, &options)
}

#[cfg(unix)]
#[test]
fn test_process_workers_handle_non_utf8_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = create_four_dirs();
    let odd = temp.path().join("a").join(OsStr::from_bytes(b"bad\xffname"));
    fs::write(&odd, "0123456789").unwrap();

    let threads = scan(temp.path(), &ScanOptions::builder().workers(2usize).build().unwrap());
    let processes = process_scan(temp.path(), 2);

    assert_eq!(processes.total_errors(), 0);
    assert_eq!(processes.total_size(), 1 + 2 + 3 + 4 + 10);
    assert_eq!(processes.root, threads.root);
    assert!(processes.root.find(&processes.root_path.join("a").join(OsStr::from_bytes(b"bad\xffname"))).is_some());

    let out = TempDir::new().unwrap();
    let json = out.path().join("tree.json");
    let output = diskaudit(&["report", temp.path().to_str().unwrap(), "--json", json.to_str().unwrap()]);
    assert!(output.status.success());
    let exported: AuditTree = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(exported.total_size(), processes.total_size());
}

#[test]
fn test_process_workers_handle_pre_epoch_mtime() {
    use std::time::{Duration, SystemTime};

    let temp = create_four_dirs();
    let old_file = temp.path().join("b/old.txt");
    fs::write(&old_file, "from the sixties").unwrap();
    let sixties = SystemTime::UNIX_EPOCH - Duration::from_secs(10 * 365 * 86_400);
    fs::File::options()
        .write(true)
        .open(&old_file)
        .unwrap()
        .set_modified(sixties)
        .unwrap();

    let threads = scan(temp.path(), &ScanOptions::builder().workers(2usize).build().unwrap());
    let processes = process_scan(temp.path(), 2);

    assert_eq!(processes.total_errors(), 0);
    assert_eq!(processes.total_size(), 1 + 2 + 3 + 4 + 16);
    assert_eq!(processes.root, threads.root);

    let root_path = processes.root_path.clone();
    let node = processes.root.find(&root_path.join("b/old.txt")).unwrap();
    assert_eq!(node.last_modified, Some(sixties));
}

#[cfg(unix)]
#[test]
fn test_directory_deleted_after_root_listing() {
    let temp = create_four_dirs();
    let victim = temp.path().canonicalize().unwrap().join("b");

    // Each worker removes `b` before it starts, after the coordinator listed the root.
    let script = format!("rm -rf '{}' && exec '{}' worker", victim.display(), BIN);
    let options = ScanOptions::builder().workers(2usize).build().unwrap();
    let tree = Auditor::with_process_workers("sh", ["-c".to_string(), script]).scan(temp.path(), &options);

    assert!(tree.success);
    assert_eq!(tree.total_errors(), 1);
    assert_eq!(tree.total_size(), 1 + 3 + 4);
    assert_eq!(tree.total_files(), 3);

    let node = tree.root.find(&victim).unwrap();
    assert_eq!(node.error_reason(), Some(ErrorReason::VanishedDuringScan));
    assert_eq!(node.size, 0);
}
