use std::collections::BTreeSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::MutexGuard;

use fileuser::config::FileUserConfig;
use fileuser::owners::{resolve_path, OwnerQuery, Reporter};
use fileuser::session::Session;
use fileuser::*;

fn serial() -> MutexGuard<'static, ()> {
    super::TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A `sleep` process holding a file as stdin or a directory as its cwd.
struct Holder {
    child: Child,
}

impl Holder {
    fn file(path: &Path) -> Self {
        let file = File::open(path).expect("open file for holder");
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::from(file))
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn holder");
        Self { child }
    }

    fn cwd(dir: &Path) -> Self {
        let child = Command::new("sleep")
            .arg("30")
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .expect("spawn holder");
        Self { child }
    }

    fn pid(&self) -> u64 {
        self.child.id() as u64
    }
}

impl Drop for Holder {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn temp_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"payload").expect("write temp file");
    path
}

fn resolve(path: &Path) -> PathOutcome {
    let query = PlatformOwnerQuery::new().expect("procfs available");
    let mut buffer = QueryBuffer::with_capacity(QUERY_BUFFER_CAPACITY).unwrap();
    resolve_path(&query, path, &mut buffer, IMAGE_NAME_CAPACITY)
}

fn owner_pids(outcome: &PathOutcome) -> BTreeSet<u64> {
    match outcome {
        PathOutcome::Resolved(owners) => owners.iter().map(|owner| owner.pid).collect(),
        other => panic!("expected owners, got {other:?}"),
    }
}

fn open_descriptor_count() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

#[test]
fn unheld_file_has_no_owners() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(dir.path(), "idle.txt");
    assert!(owner_pids(&resolve(&path)).is_empty());
}

#[test]
fn every_holder_is_reported_with_its_image() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(dir.path(), "held.txt");
    let first = Holder::file(&path);
    let second = Holder::file(&path);

    let outcome = resolve(&path);
    let expected: BTreeSet<u64> = [first.pid(), second.pid()].into_iter().collect();
    assert_eq!(owner_pids(&outcome), expected);

    if let PathOutcome::Resolved(owners) = &outcome {
        for owner in owners {
            let name = owner.image_name.as_deref().expect("own child is queryable");
            assert!(name.starts_with('/'), "unexpected image path {name}");
        }
    }
}

#[test]
fn directory_held_as_working_directory_is_reported() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let holder = Holder::cwd(dir.path());
    let pids = owner_pids(&resolve(dir.path()));
    assert!(pids.contains(&holder.pid()));
}

#[test]
fn running_executable_is_reported() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("sleep");
    fs::copy("/bin/sleep", &image).expect("copy sleep binary");
    let child = Command::new(&image)
        .arg("30")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .expect("spawn copied binary");
    let holder = Holder { child };

    let pids = owner_pids(&resolve(&image));
    assert!(pids.contains(&holder.pid()), "pid {} missing from {pids:?}", holder.pid());
}

#[test]
fn missing_file_fails_to_open() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let outcome = resolve(&dir.path().join("absent.txt"));
    match outcome {
        PathOutcome::OpenFailed(err) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected open failure, got {other:?}"),
    }
}

#[test]
fn holders_beyond_buffer_capacity_fail_the_query() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(dir.path(), "crowded.txt");
    let _holders: Vec<Holder> = (0..3).map(|_| Holder::file(&path)).collect();

    let word = std::mem::size_of::<usize>();
    let config = FileUserConfig {
        buffer_capacity: word * 3,
        ..FileUserConfig::default()
    };
    let query = PlatformOwnerQuery::new().unwrap();
    let mut session = Session::new(query, &config).unwrap();
    let mut reporter = Reporter::new(Vec::new(), Vec::new());
    session.process_path(&path, &mut reporter).unwrap();

    let (out, err) = reporter.into_inner();
    assert!(out.is_empty());
    assert_eq!(
        String::from_utf8(err).unwrap(),
        format!("fileuser: query of {} failed: c0000004\n", path.display())
    );
}

#[test]
fn repeated_queries_agree() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(dir.path(), "stable.txt");
    let _holder = Holder::file(&path);

    let first = resolve(&path);
    let second = resolve(&path);
    let pairs = |outcome: &PathOutcome| match outcome {
        PathOutcome::Resolved(owners) => owners
            .iter()
            .map(|owner| (owner.pid, owner.image_name.clone()))
            .collect::<BTreeSet<_>>(),
        other => panic!("expected owners, got {other:?}"),
    };
    assert_eq!(pairs(&first), pairs(&second));
}

#[test]
fn queries_release_their_descriptors() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(dir.path(), "hygiene.txt");
    let _holder = Holder::file(&path);
    let query = PlatformOwnerQuery::new().unwrap();
    let mut buffer = QueryBuffer::with_capacity(QUERY_BUFFER_CAPACITY).unwrap();

    let before = open_descriptor_count();
    for _ in 0..20 {
        resolve_path(&query, &path, &mut buffer, IMAGE_NAME_CAPACITY);
        resolve_path(&query, &dir.path().join("missing"), &mut buffer, IMAGE_NAME_CAPACITY);
    }
    assert_eq!(open_descriptor_count(), before);
}

#[test]
fn own_query_handle_is_not_an_owner() {
    let _guard = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = temp_file(dir.path(), "self.txt");
    let query = PlatformOwnerQuery::new().unwrap();
    let handle = query.open_path(&path).unwrap();
    let mut buffer = QueryBuffer::with_capacity(QUERY_BUFFER_CAPACITY).unwrap();
    assert_eq!(query.query_process_ids(&handle, &mut buffer), QueryStatus::SUCCESS);
    assert!(buffer.process_ids().unwrap().is_empty());
}
