use std::fs;
use std::process::{Command, Output};
use std::sync::MutexGuard;

fn serial() -> MutexGuard<'static, ()> {
    super::TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fileuser_with_log(level: &str, path: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fileuser"))
        .arg(path)
        .env("FILEUSER_LOG", level)
        .output()
        .expect("run fileuser")
}

fn log_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter(|line| line.starts_with("[fileuser]["))
        .map(str::to_owned)
        .collect()
}

#[test]
fn info_level_reports_run_summary_only() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logged.txt");
    fs::write(&path, b"x").unwrap();

    let output = fileuser_with_log("info", &path);
    assert!(output.status.success());
    let lines = log_lines(&output);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].starts_with("[fileuser][INFO] 1 paths, 0 owners"), "{}", lines[0]);
}

#[test]
fn debug_level_traces_each_argument() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("gone.txt");

    let output = fileuser_with_log("DEBUG", &missing);
    assert!(output.status.success());
    let lines = log_lines(&output);
    assert!(lines.iter().any(|line| line.starts_with("[fileuser][DEBUG] open of ")));
    assert!(lines.iter().any(|line| line.contains("fallback true")));
}

#[test]
fn off_and_unknown_levels_stay_quiet() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quiet.txt");
    fs::write(&path, b"x").unwrap();

    let off = fileuser_with_log("off", &path);
    assert!(off.stderr.is_empty());

    let unknown = fileuser_with_log("chatty", &path);
    assert!(unknown.status.success());
    assert!(log_lines(&unknown).is_empty());
    let stderr = String::from_utf8_lossy(&unknown.stderr);
    assert!(stderr.starts_with("fileuser: ignoring FILEUSER_LOG: "), "{stderr}");
}
