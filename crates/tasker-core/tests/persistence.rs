//! Durability across reopen for both backends

mod common;

use common::{register, test_cipher};
use tasker_core::{BackendKind, TaskDraft, Tasker, TaskerConfig};
use tempfile::TempDir;

fn config(dir: &TempDir, backend: BackendKind) -> TaskerConfig {
    TaskerConfig {
        data_dir: dir.path().to_path_buf(),
        backend,
        key: Some(test_cipher().to_base64_pkcs1().unwrap()),
        ..Default::default()
    }
}

async fn survives_reopen(backend: BackendKind) {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = TempDir::new().unwrap();

    {
        let tasker = Tasker::open(config(&dir, backend)).unwrap();
        let alice = register(&tasker, "alice");
        tasker.registry().create_list(&alice, "work", true).unwrap();
        for i in 0..3 {
            tasker
                .tasks()
                .create(&alice, "alice", "work", TaskDraft::new(format!("t{}", i), "s"))
                .await
                .unwrap();
        }
        tasker
            .tasks()
            .delete(&alice, "alice", "work", 1)
            .await
            .unwrap();
        tasker.shutdown();
    }

    let tasker = Tasker::open(config(&dir, backend)).unwrap();
    let alice = tasker.principal_for("alice").unwrap();

    let list = tasker.registry().get_list("alice", "work").unwrap();
    assert!(list.is_public());
    assert_eq!(list.task_number, 3);

    let page = tasker
        .tasks()
        .fetch_page(&alice, "alice", "work", 0, 10)
        .await
        .unwrap();
    let titles: Vec<&str> = page.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles.len(), 2);
    assert!(titles.contains(&"t0") && titles.contains(&"t2"));

    let next = tasker
        .tasks()
        .create(&alice, "alice", "work", TaskDraft::new("t3", "s"))
        .await
        .unwrap();
    assert_eq!(next.id, 3);

    assert!(tasker.accounts().login("alice", "password").is_ok());
}

#[tokio::test]
async fn test_redb_survives_reopen() {
    survives_reopen(BackendKind::Redb).await;
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    survives_reopen(BackendKind::Snapshot).await;
}

#[tokio::test]
async fn test_key_rotation_across_reopen() {
    let dir = TempDir::new().unwrap();
    let tasker = Tasker::open(config(&dir, BackendKind::Redb)).unwrap();
    let alice = register(&tasker, "alice");
    tasker
        .tasks()
        .create(&alice, "alice", "tasks", TaskDraft::new("secret", "s"))
        .await
        .unwrap();

    let new_key = common::second_cipher();
    let (tasker, report) = tasker.rotate_key(new_key.clone()).unwrap();
    assert_eq!(report.rotated, 1);
    tasker.shutdown();

    let mut rotated = config(&dir, BackendKind::Redb);
    rotated.key = Some(new_key.to_base64_pkcs1().unwrap());
    let tasker = Tasker::open(rotated).unwrap();
    let task = tasker
        .tasks()
        .fetch_one(&alice, "alice", "tasks", 0)
        .await
        .unwrap();
    assert_eq!(task.title, "secret");
}
