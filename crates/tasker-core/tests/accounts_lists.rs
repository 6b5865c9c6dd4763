//! Account and list lifecycle tests

mod common;

use common::{memory_tasker, redb_tasker, register};
use tasker_core::{Permissions, Principal, TaskDraft, TaskerError};

#[test]
fn test_reserved_and_separator_names_rejected() {
    let tasker = memory_tasker();
    let alice = register(&tasker, "alice");

    for name in ["login", "a/b", "new", "Register", "x.y"] {
        assert!(
            matches!(
                tasker.registry().create_list(&alice, name, false),
                Err(TaskerError::InvalidName(_))
            ),
            "{} should be rejected",
            name
        );
    }
}

#[test]
fn test_create_list_defaults_and_collisions() {
    let tasker = memory_tasker();
    let alice = register(&tasker, "alice");

    let private = tasker.registry().create_list(&alice, "work", false).unwrap();
    assert_eq!(private.permissions, Permissions::READ_TASK | Permissions::WRITE_TASK);
    assert_eq!(private.task_number, 0);

    let public = tasker.registry().create_list(&alice, "blog", true).unwrap();
    assert!(public.is_public());

    assert!(matches!(
        tasker.registry().create_list(&alice, "work", true),
        Err(TaskerError::NameUnavailable(_))
    ));

    let names: Vec<String> = tasker
        .registry()
        .lists_of("alice")
        .unwrap()
        .into_iter()
        .map(|l| l.name)
        .collect();
    assert_eq!(names, vec!["blog", "tasks", "work"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_list_creation_has_one_winner() {
    let (tasker, _dir) = redb_tasker();
    let alice = register(&tasker, "alice");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = tasker.registry().clone();
            let alice = alice.clone();
            std::thread::spawn(move || registry.create_list(&alice, "work", false))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, TaskerError::NameUnavailable(_))));

    // A late duplicate must not reset the live list's counter
    for i in 0..3 {
        tasker
            .tasks()
            .create(&alice, "alice", "work", TaskDraft::new(format!("t{}", i), "s"))
            .await
            .unwrap();
    }
    assert!(matches!(
        tasker.registry().create_list(&alice, "work", true),
        Err(TaskerError::NameUnavailable(_))
    ));
    let list = tasker.registry().get_list("alice", "work").unwrap();
    assert_eq!(list.task_number, 3);
    assert!(!list.is_public());

    let next = tasker
        .tasks()
        .create(&alice, "alice", "work", TaskDraft::new("t3", "s"))
        .await
        .unwrap();
    assert_eq!(next.id, 3);
    let first = tasker
        .tasks()
        .fetch_one(&alice, "alice", "work", 0)
        .await
        .unwrap();
    assert_eq!(first.title, "t0");
}

#[test]
fn test_public_handle_is_not_registrable() {
    let tasker = memory_tasker();
    assert!(matches!(
        tasker
            .accounts()
            .register("public", "p@example.com", "password"),
        Err(TaskerError::InvalidName(_))
    ));
}

#[test]
fn test_create_list_needs_permission() {
    let tasker = memory_tasker();
    register(&tasker, "alice");

    let restricted = Principal::new("alice", Permissions::READ_TASK);
    assert!(matches!(
        tasker.registry().create_list(&restricted, "work", false),
        Err(TaskerError::Forbidden(_))
    ));
    assert!(matches!(
        tasker
            .registry()
            .create_list(&Principal::anonymous(), "work", false),
        Err(TaskerError::Forbidden(_))
    ));
}

#[test]
fn test_visible_lists() {
    let tasker = memory_tasker();
    let alice = register(&tasker, "alice");
    let bob = register(&tasker, "bob");
    tasker.registry().create_list(&alice, "blog", true).unwrap();
    tasker.registry().create_list(&alice, "diary", false).unwrap();
    tasker
        .registry()
        .set_list_permissions(&alice, "diary", Permissions::WRITE_TASK)
        .unwrap();

    let names = |p: &Principal| -> Vec<String> {
        tasker
            .registry()
            .visible_lists(p, "alice")
            .unwrap()
            .into_iter()
            .map(|l| l.name)
            .collect()
    };
    assert_eq!(names(&alice), vec!["blog", "diary", "tasks"]);
    assert_eq!(names(&bob), vec!["blog", "tasks"]);
    assert_eq!(names(&Principal::anonymous()), vec!["blog"]);
}

#[tokio::test]
async fn test_delete_list_cascades() {
    let (tasker, _dir) = redb_tasker();
    let alice = register(&tasker, "alice");
    tasker.registry().create_list(&alice, "work", false).unwrap();
    for _ in 0..3 {
        tasker
            .tasks()
            .create(&alice, "alice", "work", TaskDraft::new("t", "s"))
            .await
            .unwrap();
    }

    assert!(matches!(
        tasker.registry().delete_list(&alice, "tasks"),
        Err(TaskerError::ValidationFailed(_))
    ));

    tasker.registry().delete_list(&alice, "work").unwrap();
    assert!(matches!(
        tasker.registry().get_list("alice", "work"),
        Err(TaskerError::NotFound(_))
    ));

    // A new list with the same name starts from scratch
    tasker.registry().create_list(&alice, "work", false).unwrap();
    let task = tasker
        .tasks()
        .create(&alice, "alice", "work", TaskDraft::new("t", "s"))
        .await
        .unwrap();
    assert_eq!(task.id, 0);
    let page = tasker
        .tasks()
        .fetch_page(&alice, "alice", "work", 0, 10)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}

#[test]
fn test_only_owner_sets_permissions() {
    let tasker = memory_tasker();
    register(&tasker, "alice");
    let bob = register(&tasker, "bob");

    // Bob addresses his own namespace; alice's list is unreachable
    assert!(matches!(
        tasker
            .registry()
            .set_list_permissions(&bob, "work", Permissions::PUBLIC_LIST),
        Err(TaskerError::NotFound(_))
    ));
    assert!(tasker
        .registry()
        .set_list_permissions(&Principal::anonymous(), "tasks", Permissions::NONE)
        .is_err());
}

#[tokio::test]
async fn test_account_deletion_cascades() {
    let tasker = memory_tasker();
    let alice = register(&tasker, "alice");
    let bob = register(&tasker, "bob");
    tasker
        .tasks()
        .create(&alice, "alice", "tasks", TaskDraft::new("mine", "s"))
        .await
        .unwrap();
    tasker
        .tasks()
        .create(&bob, "bob", "tasks", TaskDraft::new("bob's", "s"))
        .await
        .unwrap();

    tasker.accounts().delete_account(&alice, "alice").unwrap();

    assert!(matches!(
        tasker.registry().lists_of("alice"),
        Err(TaskerError::NotFound(_))
    ));

    // Re-registering starts empty
    let alice = register(&tasker, "alice");
    let page = tasker
        .tasks()
        .fetch_page(&alice, "alice", "tasks", 0, 10)
        .await
        .unwrap();
    assert!(page.is_empty());

    // Other accounts are untouched
    let page = tasker
        .tasks()
        .fetch_page(&bob, "bob", "tasks", 0, 10)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
}

#[test]
fn test_session_round_trip() {
    let tasker = memory_tasker();
    register(&tasker, "alice");

    let session = tasker.accounts().login("alice", "password").unwrap();
    assert_eq!(session.token.len(), 128);

    let principal = tasker.authenticate(&session.token).unwrap();
    assert_eq!(principal.handle, "alice");

    tasker.accounts().logout(&session.token).unwrap();
    assert!(matches!(
        tasker.authenticate(&session.token),
        Err(TaskerError::Unauthorized)
    ));
}
