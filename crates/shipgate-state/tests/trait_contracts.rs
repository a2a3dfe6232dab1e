//! Behavioural contract tests for `RunLog`.
//!
//! Every check runs against both the in-memory fake and the file backend.

use std::time::Duration;

use shipgate_core::{Decision, GateVerdict, RunDraft, RunRecord, Task, TaskId};
use shipgate_state::fakes::MemoryRunLog;
use shipgate_state::{FileRunLog, RunKey, RunLog, StorageError};

fn sealed(task_id: &str, decision: Decision) -> RunRecord {
    let task = Task::new(format!("change for {task_id}")).with_id(task_id);
    let verdict = match decision {
        Decision::Promote => GateVerdict::pass("build", "ok").mandatory(),
        Decision::Hold => GateVerdict::fail("build", "exit 1").mandatory(),
    };
    RunDraft::new(task, "cfg-digest")
        .decide(decision, vec![verdict])
        .seal()
}

async fn tick() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}

async fn append_then_get(log: &dyn RunLog) {
    let record = sealed("task-a", Decision::Promote);
    let key = log.append(&record).await.unwrap();
    assert_eq!(key, RunKey::of(&record));
    assert_eq!(log.get(&key).await.unwrap(), record);
}

async fn duplicate_is_rejected(log: &dyn RunLog) {
    let record = sealed("task-dup", Decision::Hold);
    log.append(&record).await.unwrap();
    let err = log.append(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::DuplicateRecord { .. }));
    assert_eq!(log.list(None).await.unwrap().len(), 1);
}

async fn missing_key_is_not_found(log: &dyn RunLog) {
    let record = sealed("task-ghost", Decision::Hold);
    let err = log.get(&RunKey::of(&record)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

async fn same_task_runs_accumulate(log: &dyn RunLog) {
    let first = sealed("task-x", Decision::Hold);
    tick().await;
    let other = sealed("task-y", Decision::Promote);
    tick().await;
    let second = sealed("task-x", Decision::Promote);

    log.append(&first).await.unwrap();
    log.append(&other).await.unwrap();
    log.append(&second).await.unwrap();

    let x = log.list(Some(&TaskId::from("task-x"))).await.unwrap();
    assert_eq!(x, vec![first.clone(), second.clone()]);

    let all = log.list(None).await.unwrap();
    assert_eq!(all.len(), 3);

    let latest = log.latest(2).await.unwrap();
    assert_eq!(latest, vec![second, other]);
}

#[tokio::test]
async fn memory_log_contracts() {
    append_then_get(&MemoryRunLog::new()).await;
    duplicate_is_rejected(&MemoryRunLog::new()).await;
    missing_key_is_not_found(&MemoryRunLog::new()).await;
    same_task_runs_accumulate(&MemoryRunLog::new()).await;
}

#[tokio::test]
async fn file_log_contracts() {
    let dir = tempfile::tempdir().unwrap();
    let path = |name: &str| dir.path().join(name).join("runs.jsonl");

    append_then_get(&FileRunLog::new(path("a"))).await;
    duplicate_is_rejected(&FileRunLog::new(path("b"))).await;
    missing_key_is_not_found(&FileRunLog::new(path("c"))).await;
    same_task_runs_accumulate(&FileRunLog::new(path("d"))).await;
}

#[tokio::test]
async fn file_log_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");
    let record = sealed("task-persist", Decision::Promote);

    FileRunLog::new(&path).append(&record).await.unwrap();
    let reopened = FileRunLog::new(&path);
    assert_eq!(reopened.list(None).await.unwrap(), vec![record]);
}

#[tokio::test]
async fn file_log_detects_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");
    let log = FileRunLog::new(&path);
    log.append(&sealed("task-held", Decision::Hold)).await.unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains(r#""decision":"HOLD""#));
    std::fs::write(
        &path,
        content.replacen(r#""decision":"HOLD""#, r#""decision":"PROMOTE""#, 1),
    )
    .unwrap();

    let err = log.list(None).await.unwrap_err();
    assert!(matches!(err, StorageError::DigestMismatch { .. }));
}

#[tokio::test]
async fn file_log_reports_corrupt_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.jsonl");
    let log = FileRunLog::new(&path);
    log.append(&sealed("task-ok", Decision::Promote)).await.unwrap();

    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{not json\n");
    std::fs::write(&path, content).unwrap();

    match log.list(None).await.unwrap_err() {
        StorageError::Corrupt { line, .. } => assert_eq!(line, 2),
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_file_is_empty_log() {
    let dir = tempfile::tempdir().unwrap();
    let log = FileRunLog::new(dir.path().join("nothing.jsonl"));
    assert!(log.list(None).await.unwrap().is_empty());
    assert!(log.latest(5).await.unwrap().is_empty());
}
