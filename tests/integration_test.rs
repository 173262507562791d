//! Integration tests for datasync.
//!
//! Drives the orchestrator end to end against a filesystem chunk store and
//! in-memory record tables.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::cast_possible_wrap
)]

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use datasync::gc::{ChunkSweeper, SweepConfig};
use datasync::io::{ByteStream, CsvCodec, ExportRequest, FormatCodec, ImportRequest, XlsxCodec};
use datasync::{
    ChunkArtifact, ChunkStore, EntityRegistry, Error, FilesystemChunkStore, JobId,
    JobOrchestrator, JobState, OrchestratorConfig, RecordTable, Row,
};
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    store: Arc<dyn ChunkStore>,
    users: Arc<RecordTable>,
    orchestrator: JobOrchestrator,
}

fn harness(users: RecordTable, chunk_size: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ChunkStore> = Arc::new(FilesystemChunkStore::new(dir.path()).unwrap());
    harness_on(dir, store, users, chunk_size)
}

fn harness_on(
    dir: TempDir,
    store: Arc<dyn ChunkStore>,
    users: RecordTable,
    chunk_size: usize,
) -> Harness {
    let users = Arc::new(users);
    let registry = EntityRegistry::new().with_entity("users", Arc::clone(&users));
    let orchestrator = JobOrchestrator::new(
        Arc::clone(&store),
        Arc::new(registry),
        OrchestratorConfig::default().with_export_chunk_size(chunk_size),
    );
    Harness {
        _dir: dir,
        store,
        users,
        orchestrator,
    }
}

/// Filesystem store whose `rename` and `delete` fail a set number of times.
struct FlakyStore {
    inner: FilesystemChunkStore,
    rename_failures: AtomicUsize,
    delete_failures: AtomicUsize,
}

impl FlakyStore {
    fn new(dir: &TempDir, rename_failures: usize, delete_failures: usize) -> Self {
        Self {
            inner: FilesystemChunkStore::new(dir.path()).unwrap(),
            rename_failures: AtomicUsize::new(rename_failures),
            delete_failures: AtomicUsize::new(delete_failures),
        }
    }

    fn should_fail(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn injected(operation: &str) -> Error {
        Error::Store {
            operation: operation.to_string(),
            cause: "injected failure".to_string(),
        }
    }
}

impl ChunkStore for FlakyStore {
    fn put(
        &self,
        key: &str,
        job_id: Option<&JobId>,
        bytes: &[u8],
    ) -> datasync::Result<ChunkArtifact> {
        self.inner.put(key, job_id, bytes)
    }

    fn append(
        &self,
        key: &str,
        job_id: Option<&JobId>,
        bytes: &[u8],
    ) -> datasync::Result<ChunkArtifact> {
        self.inner.append(key, job_id, bytes)
    }

    fn truncate(&self, key: &str, len: u64) -> datasync::Result<ChunkArtifact> {
        self.inner.truncate(key, len)
    }

    fn get(&self, key: &str) -> datasync::Result<ByteStream> {
        self.inner.get(key)
    }

    fn stat(&self, key: &str) -> datasync::Result<Option<ChunkArtifact>> {
        self.inner.stat(key)
    }

    fn rename(&self, from: &str, to: &str) -> datasync::Result<ChunkArtifact> {
        if Self::should_fail(&self.rename_failures) {
            return Err(Self::injected("rename"));
        }
        self.inner.rename(from, to)
    }

    fn delete(&self, key: &str) -> datasync::Result<bool> {
        if Self::should_fail(&self.delete_failures) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(key)
    }

    fn list(&self) -> datasync::Result<Vec<ChunkArtifact>> {
        self.inner.list()
    }

    fn path_of(&self, key: &str) -> datasync::Result<PathBuf> {
        self.inner.path_of(key)
    }

    fn stage_upload(
        &self,
        file_name: &str,
        reader: &mut dyn Read,
    ) -> datasync::Result<ChunkArtifact> {
        self.inner.stage_upload(file_name, reader)
    }
}

fn flaky_harness(users: RecordTable, chunk_size: usize, renames: usize, deletes: usize) -> Harness {
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn ChunkStore> = Arc::new(FlakyStore::new(&dir, renames, deletes));
    harness_on(dir, store, users, chunk_size)
}

fn users_table() -> RecordTable {
    RecordTable::new("id", ["id", "name", "email"])
}

fn seeded(rows: usize) -> RecordTable {
    let table = users_table();
    for i in 1..=rows {
        table.insert(Row::from_pairs([
            ("id", i.to_string()),
            ("name", format!("user{i}")),
            ("email", format!("user{i}@example.com")),
        ]));
    }
    table
}

fn stage(h: &Harness, name: &str, data: &[u8]) {
    let mut reader = data;
    h.store.stage_upload(name, &mut reader).unwrap();
}

fn read_artifact(h: &Harness, key: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    h.store.get(key).unwrap().read_to_end(&mut buf).unwrap();
    buf
}

fn users_csv(rows: usize) -> String {
    let mut csv = String::from("id,name,email\n");
    for i in 1..=rows {
        csv.push_str(&format!("{i},user{i},user{i}@example.com\n"));
    }
    csv
}

#[test]
fn test_export_three_rows_in_windows_of_two() {
    let h = harness(seeded(3), 2);
    let job_id = h
        .orchestrator
        .start_export("users", &ExportRequest::new("csv"))
        .unwrap();

    let first = h.orchestrator.step_export(&job_id).unwrap();
    assert_eq!(first.processed, 2);
    assert_eq!(first.total, Some(3));
    assert!(!first.done);

    let second = h.orchestrator.step_export(&job_id).unwrap();
    assert_eq!(second.processed, 3);
    assert_eq!(second.total, Some(3));
    assert!(second.done);
    assert!(second.download_ready);

    let artifact = h.orchestrator.download(&job_id).unwrap();
    let content = String::from_utf8(read_artifact(&h, &artifact.key)).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(
        lines,
        vec![
            "id,name,email",
            "1,user1,user1@example.com",
            "2,user2,user2@example.com",
            "3,user3,user3@example.com",
        ]
    );

    let keys: Vec<String> = h.store.list().unwrap().into_iter().map(|a| a.key).collect();
    assert_eq!(keys, vec![artifact.key]);
}

#[test]
fn test_export_selected_columns_in_order() {
    let h = harness(seeded(2), 10);
    let job_id = h
        .orchestrator
        .start_export(
            "users",
            &ExportRequest::new("csv").with_columns(["email", "id"]),
        )
        .unwrap();
    assert!(h.orchestrator.step_export(&job_id).unwrap().done);

    let artifact = h.orchestrator.download(&job_id).unwrap();
    let content = String::from_utf8(read_artifact(&h, &artifact.key)).unwrap();
    assert_eq!(content.lines().next(), Some("email,id"));
    assert_eq!(content.lines().nth(1), Some("user1@example.com,1"));
}

#[test]
fn test_export_xlsx() {
    let h = harness(seeded(5), 2);
    let job_id = h
        .orchestrator
        .start_export("users", &ExportRequest::new("xlsx"))
        .unwrap();

    while !h.orchestrator.step_export(&job_id).unwrap().done {}

    let artifact = h.orchestrator.download(&job_id).unwrap();
    assert!(artifact.key.ends_with(".xlsx"));

    let bytes = read_artifact(&h, &artifact.key);
    let decoded = XlsxCodec
        .decode(Box::new(std::io::Cursor::new(bytes)), None, 0, 100)
        .unwrap();
    assert_eq!(decoded.header, vec!["id", "name", "email"]);
    assert_eq!(decoded.rows.len(), 5);
    assert_eq!(decoded.rows[4].get("name"), Some("user5"));
    assert!(decoded.end_of_file);

    assert_eq!(h.store.list().unwrap().len(), 1);
}

#[test]
fn test_export_empty_entity() {
    let h = harness(users_table(), 10);
    let job_id = h
        .orchestrator
        .start_export("users", &ExportRequest::new("csv"))
        .unwrap();

    let progress = h.orchestrator.step_export(&job_id).unwrap();
    assert!(progress.done);
    assert_eq!((progress.processed, progress.total), (0, Some(0)));

    let artifact = h.orchestrator.download(&job_id).unwrap();
    let content = String::from_utf8(read_artifact(&h, &artifact.key)).unwrap();
    assert_eq!(content.trim_end(), "id,name,email");
}

#[test]
fn test_export_rejects_unsupported_format_without_writing() {
    let h = harness(seeded(3), 2);
    let err = h
        .orchestrator
        .start_export("users", &ExportRequest::new("json"))
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert!(h.store.list().unwrap().is_empty());
    assert!(h.orchestrator.jobs().is_empty());
}

#[test]
fn test_export_missing_format() {
    let h = harness(seeded(1), 2);
    let err = h
        .orchestrator
        .start_export("users", &ExportRequest::default())
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_import_seven_rows_in_windows_of_three() {
    let h = harness(users_table(), 10);
    stage(&h, "users.csv", users_csv(7).as_bytes());
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();

    let mut seen = Vec::new();
    for offset in [0, 3, 6] {
        let progress = h
            .orchestrator
            .step_import(&job_id, &ImportRequest::new("users.csv", offset, 3))
            .unwrap();
        assert!(progress.errors.is_empty());
        seen.push((progress.processed, progress.done));
    }

    assert_eq!(seen, vec![(3, false), (6, false), (7, true)]);
    let job = h.orchestrator.job(&job_id).unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.total, Some(7));
    assert_eq!(h.users.len(), 7);
}

#[test]
fn test_import_seven_rows_single_window() {
    let h = harness(users_table(), 10);
    stage(&h, "users.csv", users_csv(7).as_bytes());
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();

    let progress = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.csv", 0, 10))
        .unwrap();
    assert_eq!(progress.processed, 7);
    assert!(progress.done);
    assert!(progress.errors.is_empty());
}

#[test]
fn test_export_two_columns_decodes_to_original_rows() {
    let h = harness(seeded(3), 2);
    let job_id = h
        .orchestrator
        .start_export("users", &ExportRequest::new("csv").with_columns(["id", "name"]))
        .unwrap();
    assert!(!h.orchestrator.step_export(&job_id).unwrap().done);
    assert!(h.orchestrator.step_export(&job_id).unwrap().done);

    let artifact = h.orchestrator.download(&job_id).unwrap();
    let columns: Vec<String> = ["id", "name"].map(String::from).to_vec();
    let decoded = CsvCodec::new()
        .decode(h.store.get(&artifact.key).unwrap(), Some(&columns), 0, 10)
        .unwrap();
    let expected: Vec<Row> = (1..=3)
        .map(|i| Row::from_pairs([("id", i.to_string()), ("name", format!("user{i}"))]))
        .collect();
    assert_eq!(decoded.rows, expected);
}

#[test]
fn test_import_exact_multiple_detects_end_of_file() {
    let h = harness(users_table(), 10);
    stage(&h, "users.csv", users_csv(6).as_bytes());
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();

    let first = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.csv", 0, 3))
        .unwrap();
    assert!(!first.done);
    let second = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.csv", 3, 3))
        .unwrap();
    assert!(second.done);
    assert_eq!(second.total, Some(6));
}

#[test]
fn test_import_bad_row_is_reported_and_rest_applied() {
    let h = harness(users_table().with_required(["email"]), 10);
    let mut csv = String::from("id,name,email\n");
    for i in 1..=7 {
        let email = if i == 4 {
            String::new()
        } else {
            format!("user{i}@example.com")
        };
        csv.push_str(&format!("{i},user{i},{email}\n"));
    }
    stage(&h, "users.csv", csv.as_bytes());
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();

    let progress = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.csv", 0, 10))
        .unwrap();

    assert_eq!(progress.processed, 7);
    assert!(progress.done);
    assert_eq!(progress.errors.len(), 1);
    assert_eq!(progress.errors[0].row_index, 4);
    assert!(progress.errors[0].reason.contains("email"));

    assert_eq!(h.users.len(), 6);
    assert!(h.users.get("4").is_none());
    assert!(h.users.get("5").is_some());
}

#[test]
fn test_import_row_index_is_absolute_across_windows() {
    let h = harness(users_table().with_required(["email"]), 10);
    stage(
        &h,
        "users.csv",
        b"id,name,email\n1,a,a@x\n2,b,b@x\n3,c,\n4,d,d@x\n",
    );
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();

    h.orchestrator
        .step_import(&job_id, &ImportRequest::new("users.csv", 0, 2))
        .unwrap();
    let progress = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.csv", 2, 2))
        .unwrap();
    assert_eq!(progress.errors.len(), 1);
    assert_eq!(progress.errors[0].row_index, 3);
}

#[test]
fn test_import_replay_is_idempotent() {
    let h = harness(users_table(), 10);
    stage(&h, "users.csv", users_csv(4).as_bytes());
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();
    let window = ImportRequest::new("users.csv", 0, 2);

    let first = h.orchestrator.step_import(&job_id, &window).unwrap();
    let snapshot = h.users.rows();
    let replay = h.orchestrator.step_import(&job_id, &window).unwrap();

    assert_eq!(first.processed, 2);
    assert_eq!(replay.processed, 2);
    assert_eq!(h.users.rows(), snapshot);

    let rest = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.csv", 2, 2))
        .unwrap();
    assert_eq!(rest.processed, 4);
}

#[test]
fn test_import_caller_supplied_total() {
    let h = harness(users_table(), 10);
    stage(&h, "users.csv", users_csv(4).as_bytes());
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();

    let progress = h
        .orchestrator
        .step_import(
            &job_id,
            &ImportRequest::new("users.csv", 0, 2).with_total(4),
        )
        .unwrap();
    assert_eq!((progress.processed, progress.total), (2, Some(4)));
}

#[test]
fn test_import_invalid_windows() {
    let h = harness(users_table(), 10);
    stage(&h, "users.csv", users_csv(2).as_bytes());
    let job_id = h.orchestrator.start_import("users", "users.csv", None).unwrap();

    for request in [
        ImportRequest::new("users.csv", -1, 10),
        ImportRequest::new("users.csv", 0, 0),
        ImportRequest {
            limit: None,
            ..ImportRequest::new("users.csv", 0, 1)
        },
    ] {
        let err = h.orchestrator.step_import(&job_id, &request).unwrap_err();
        assert!(matches!(err, Error::InvalidWindow(_)), "{err}");
    }
    assert_eq!(h.orchestrator.job(&job_id).unwrap().state, JobState::Pending);
}

#[test]
fn test_import_corrupt_first_window_fails_job() {
    let h = harness(users_table(), 10);
    stage(&h, "users.xlsx", b"this is not a workbook");
    let job_id = h.orchestrator.start_import("users", "users.xlsx", None).unwrap();

    let err = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.xlsx", 0, 10))
        .unwrap_err();
    assert!(matches!(err, Error::CorruptFile(_)));
    assert_eq!(h.orchestrator.job(&job_id).unwrap().state, JobState::Failed);
}

#[test]
fn test_import_xlsx() {
    let h = harness(users_table(), 10);
    let columns: Vec<String> = ["id", "name", "email"].map(String::from).to_vec();
    let rows: Vec<Row> = (1..=3)
        .map(|i| {
            Row::from_pairs([
                ("id", i.to_string()),
                ("name", format!("user{i}")),
                ("email", format!("user{i}@example.com")),
            ])
        })
        .collect();
    let bytes = XlsxCodec.encode(&rows, &columns, true).unwrap();
    stage(&h, "users.xlsx", &bytes);

    let job_id = h.orchestrator.start_import("users", "users.xlsx", None).unwrap();
    let progress = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.xlsx", 0, 10))
        .unwrap();

    assert!(progress.done);
    assert_eq!(progress.processed, 3);
    assert_eq!(h.users.get("2").unwrap().get("email"), Some("user2@example.com"));
}

#[test]
fn test_export_then_import_round_trip() {
    let source = harness(seeded(5), 2);
    let job_id = source
        .orchestrator
        .start_export("users", &ExportRequest::new("csv"))
        .unwrap();
    while !source.orchestrator.step_export(&job_id).unwrap().done {}
    let artifact = source.orchestrator.download(&job_id).unwrap();
    let bytes = read_artifact(&source, &artifact.key);

    let target = harness(users_table(), 10);
    stage(&target, "users.csv", &bytes);
    let import_id = target
        .orchestrator
        .start_import("users", "users.csv", None)
        .unwrap();
    while let Some(window) = target.orchestrator.next_import_window(&import_id, 2).unwrap() {
        let request = ImportRequest::new(window.file_name, window.offset as i64, 2);
        target.orchestrator.step_import(&import_id, &request).unwrap();
    }

    assert_eq!(target.users.rows(), source.users.rows());
}

#[test]
fn test_export_retry_after_failed_finalize_writes_each_row_once() {
    let h = flaky_harness(seeded(3), 2, 1, 0);
    let job_id = h
        .orchestrator
        .start_export("users", &ExportRequest::new("csv"))
        .unwrap();

    assert_eq!(h.orchestrator.step_export(&job_id).unwrap().processed, 2);
    let err = h.orchestrator.step_export(&job_id).unwrap_err();
    assert!(matches!(err, Error::Store { .. }));

    let job = h.orchestrator.job(&job_id).unwrap();
    assert_eq!((job.processed, job.cursor, job.state), (2, 2, JobState::Running));

    let retried = h.orchestrator.step_export(&job_id).unwrap();
    assert_eq!(retried.processed, 3);
    assert!(retried.done);

    let artifact = h.orchestrator.download(&job_id).unwrap();
    let decoded = CsvCodec::new()
        .decode(h.store.get(&artifact.key).unwrap(), None, 0, usize::MAX)
        .unwrap();
    assert_eq!(decoded.rows.len(), 3);
    assert_eq!(decoded.rows[2].get("id"), Some("3"));
}

#[test]
fn test_xlsx_export_retry_after_failed_cleanup() {
    let h = flaky_harness(seeded(3), 2, 0, 1);
    let job_id = h
        .orchestrator
        .start_export("users", &ExportRequest::new("xlsx"))
        .unwrap();

    h.orchestrator.step_export(&job_id).unwrap();
    assert!(h.orchestrator.step_export(&job_id).is_err());
    assert!(h.orchestrator.step_export(&job_id).unwrap().done);

    let artifact = h.orchestrator.download(&job_id).unwrap();
    let decoded = XlsxCodec::new()
        .decode(h.store.get(&artifact.key).unwrap(), None, 0, usize::MAX)
        .unwrap();
    assert_eq!(decoded.rows.len(), 3);
    let keys: Vec<String> = h.store.list().unwrap().into_iter().map(|a| a.key).collect();
    assert_eq!(keys, vec![artifact.key]);
}

#[test]
fn test_xlsx_export_keeps_rows_with_only_empty_values() {
    let users = users_table();
    for (id, name, email) in [("1", "a", "a@x"), ("2", "", ""), ("3", "c", "")] {
        users.insert(Row::from_pairs([("id", id), ("name", name), ("email", email)]));
    }
    let h = harness(users, 2);
    let job_id = h
        .orchestrator
        .start_export(
            "users",
            &ExportRequest::new("xlsx").with_columns(["name", "email"]),
        )
        .unwrap();
    while !h.orchestrator.step_export(&job_id).unwrap().done {}

    let job = h.orchestrator.job(&job_id).unwrap();
    let artifact = h.orchestrator.download(&job_id).unwrap();
    let decoded = XlsxCodec::new()
        .decode(h.store.get(&artifact.key).unwrap(), None, 0, usize::MAX)
        .unwrap();
    assert_eq!(decoded.rows.len(), job.processed);
    assert_eq!(decoded.rows[1].get("name"), Some(""));
    assert_eq!(decoded.rows[2].get("name"), Some("c"));
}

#[test]
fn test_xlsx_import_blank_row_keeps_row_numbering() {
    let h = harness(users_table(), 10);
    let columns: Vec<String> = ["id", "name", "email"].map(String::from).to_vec();
    let rows = vec![
        Row::from_pairs([("id", "1"), ("name", "a"), ("email", "a@x")]),
        Row::from_pairs([("id", ""), ("name", ""), ("email", "")]),
        Row::from_pairs([("id", "3"), ("name", "c"), ("email", "c@x")]),
    ];
    stage(&h, "users.xlsx", &XlsxCodec.encode(&rows, &columns, true).unwrap());
    let job_id = h.orchestrator.start_import("users", "users.xlsx", None).unwrap();

    let first = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.xlsx", 0, 2))
        .unwrap();
    assert_eq!(first.errors.len(), 1);
    assert_eq!(first.errors[0].row_index, 2);

    let second = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.xlsx", 2, 2))
        .unwrap();
    assert!(second.errors.is_empty());
    assert_eq!((second.processed, second.done), (3, true));
    assert!(h.users.get("3").is_some());
    assert_eq!(h.users.len(), 2);
}

#[test]
fn test_xlsx_import_later_window_decode_failure_keeps_job() {
    let h = harness(users_table(), 10);
    let columns: Vec<String> = ["id", "name", "email"].map(String::from).to_vec();
    let rows: Vec<Row> = (1..=4)
        .map(|i| {
            Row::from_pairs([
                ("id", i.to_string()),
                ("name", format!("u{i}")),
                ("email", format!("u{i}@x")),
            ])
        })
        .collect();
    let workbook = XlsxCodec.encode(&rows, &columns, true).unwrap();
    stage(&h, "users.xlsx", &workbook);
    let job_id = h.orchestrator.start_import("users", "users.xlsx", None).unwrap();

    h.orchestrator
        .step_import(&job_id, &ImportRequest::new("users.xlsx", 0, 2))
        .unwrap();

    stage(&h, "users.xlsx", b"truncated upload");
    let err = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.xlsx", 2, 2))
        .unwrap_err();
    assert!(matches!(err, Error::CorruptFile(_)));
    let job = h.orchestrator.job(&job_id).unwrap();
    assert_eq!((job.state, job.processed), (JobState::Running, 2));

    stage(&h, "users.xlsx", &workbook);
    let retried = h
        .orchestrator
        .step_import(&job_id, &ImportRequest::new("users.xlsx", 2, 2))
        .unwrap();
    assert_eq!((retried.processed, retried.done), (4, true));
    assert_eq!(h.users.len(), 4);
}

#[test]
fn test_export_rejects_duplicate_columns() {
    let h = harness(seeded(1), 10);
    let err = h
        .orchestrator
        .start_export("users", &ExportRequest::new("csv").with_columns(["id", "id"]))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(h.orchestrator.jobs().is_empty());
}

#[test]
fn test_sweep_deletes_only_stale_artifacts() {
    fn long_ago() -> u64 {
        1_000
    }
    fn recently() -> u64 {
        1_000 + 20 * 3600
    }

    let dir = TempDir::new().unwrap();
    let old_store = FilesystemChunkStore::new(dir.path())
        .unwrap()
        .with_clock(long_ago);
    old_store.put("stale.part", None, b"old").unwrap();

    let new_store = FilesystemChunkStore::new(dir.path())
        .unwrap()
        .with_clock(recently);
    new_store.put("fresh.part", None, b"new").unwrap();

    let store: Arc<dyn ChunkStore> = Arc::new(new_store);
    let sweeper = ChunkSweeper::new(Arc::clone(&store), SweepConfig::default());
    let now = 1_000 + 25 * 3600;

    let dry = sweeper.sweep_at(now, 24 * 3600, true).unwrap();
    assert_eq!(dry.deleted_keys, vec!["stale.part".to_string()]);
    assert_eq!(store.list().unwrap().len(), 2);

    let report = sweeper.sweep_at(now, 24 * 3600, false).unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.deleted, 1);
    assert!(report.errors.is_empty());

    let keys: Vec<String> = store.list().unwrap().into_iter().map(|a| a.key).collect();
    assert_eq!(keys, vec!["fresh.part".to_string()]);
}

#[test]
fn test_download_after_sweep_reports_missing_file() {
    let h = harness(seeded(1), 10);
    let job_id = h
        .orchestrator
        .start_export("users", &ExportRequest::new("csv"))
        .unwrap();
    h.orchestrator.step_export(&job_id).unwrap();

    let artifact = h.orchestrator.download(&job_id).unwrap();
    assert!(h.store.delete(&artifact.key).unwrap());

    assert!(matches!(
        h.orchestrator.download(&job_id),
        Err(Error::FileNotFound(_))
    ));
}
