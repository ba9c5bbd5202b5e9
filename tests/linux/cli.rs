use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::process::{Command, Output};
use std::sync::MutexGuard;

fn serial() -> MutexGuard<'static, ()> {
    super::TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn fileuser<S: AsRef<OsStr>>(args: &[S]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fileuser"))
        .args(args)
        .env_remove("FILEUSER_LOG")
        .output()
        .expect("run fileuser")
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn batch_continues_past_a_failing_path() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.txt");
    let third = dir.path().join("third.txt");
    fs::write(&first, b"1").unwrap();
    fs::write(&third, b"3").unwrap();
    let second = dir.path().join("second.txt");

    let output = fileuser(&[
        first.to_str().unwrap(),
        second.to_str().unwrap(),
        third.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    let stderr = text(&output.stderr);
    let failures: Vec<&str> = stderr.lines().collect();
    assert_eq!(failures.len(), 1, "stderr: {stderr}");
    assert!(failures[0].starts_with(&format!("fileuser: open of {} failed: ", second.display())));
    assert!(!failures[0].contains("os error"));
}

#[test]
fn held_file_prints_padded_pid_lines() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("held.txt");
    fs::write(&path, b"x").unwrap();
    let mut holder = Command::new("sleep")
        .arg("30")
        .stdin(fs::File::open(&path).unwrap())
        .spawn()
        .unwrap();

    let output = fileuser(&[path.to_str().unwrap()]);
    let _ = holder.kill();
    let _ = holder.wait();

    assert!(output.status.success());
    let stdout = text(&output.stdout);
    let prefix = format!("{:>10} ", holder.id());
    assert_eq!(stdout.lines().count(), 1, "stdout: {stdout}");
    assert!(stdout.starts_with(&prefix), "stdout: {stdout}");
}

#[test]
fn missing_argument_is_a_startup_failure() {
    let _guard = serial();
    let output = fileuser::<&str>(&[]);
    assert!(!output.status.success());
    assert_eq!(text(&output.stderr), "fileuser: missing argument\n");
}

#[test]
fn help_and_license_exit_cleanly() {
    let _guard = serial();
    let help = fileuser(&["-?"]);
    assert!(help.status.success());
    assert!(text(&help.stdout).starts_with("FileUser "));

    let license = fileuser(&["-license"]);
    assert!(license.status.success());
    assert!(text(&license.stdout).contains("Permission is hereby granted"));
}

#[test]
fn unknown_option_is_ignored_with_a_warning() {
    let _guard = serial();
    let output = fileuser(&["-z"]);
    assert!(!output.status.success());
    let stderr = text(&output.stderr);
    assert!(stderr.starts_with("Argument not understood, ignored: -z\n"));
}

#[test]
fn non_unicode_path_is_opened_as_given() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(OsStr::from_bytes(b"r\xe9sum\xe9.txt"));
    fs::write(&path, b"x").unwrap();
    let mut holder = Command::new("sleep")
        .arg("30")
        .stdin(fs::File::open(&path).unwrap())
        .spawn()
        .unwrap();

    let output = fileuser(&[path.as_os_str()]);
    let _ = holder.kill();
    let _ = holder.wait();

    assert!(output.status.success());
    assert!(output.stderr.is_empty(), "stderr: {}", text(&output.stderr));
    assert!(text(&output.stdout).starts_with(&format!("{:>10} ", holder.id())));
}

#[test]
fn slash_argument_is_a_path_not_an_option() {
    let _guard = serial();
    let output = fileuser(&["/s"]);
    assert!(output.status.success());
    let stderr = text(&output.stderr);
    assert!(!stderr.contains("Argument not understood"));
    assert!(stderr.starts_with("fileuser: open of /s failed: "), "stderr: {stderr}");
}
