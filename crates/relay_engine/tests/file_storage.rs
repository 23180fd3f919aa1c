use std::fs;

use pretty_assertions::assert_eq;
use relay_core::{
    ItemStatus, ProcessStatePatch, QueueItem, RetryConfig, ScheduleConfig, SettingsPatch, TabId,
};
use relay_engine::{ensure_dir, AtomicFileWriter, FileStorage, LockError, Storage, StorageError};
use serde_json::json;
use tempfile::TempDir;

fn storage(temp: &TempDir) -> FileStorage {
    FileStorage::new(temp.path().join("data"), temp.path().join("session"))
}

#[test]
fn missing_files_read_as_defaults() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp);

    assert!(storage.get_queue().unwrap().is_empty());
    assert_eq!(storage.get_settings().unwrap(), Default::default());
    assert_eq!(storage.get_process_state().unwrap(), None);
}

#[test]
fn queue_survives_a_new_storage_instance() {
    let temp = TempDir::new().unwrap();
    let mut done = QueueItem::new("summarize this").with_id("a").with_tool("search");
    done.mark_processing(1_000);
    done.mark_completed(Some(json!({ "text": "ok", "tokens": 12 })), 3_500);
    let queue = vec![done, QueueItem::new("next one").with_id("b")];

    storage(&temp).set_queue(&queue).unwrap();
    let reloaded = storage(&temp).get_queue().unwrap();

    assert_eq!(reloaded, queue);
    assert_eq!(reloaded[0].status, ItemStatus::Completed);
    assert_eq!(reloaded[0].completion_time_seconds, Some(2.5));
}

#[test]
fn settings_patches_merge() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp);

    storage
        .set_settings(SettingsPatch {
            drip_feed: Some(true),
            ..SettingsPatch::default()
        })
        .unwrap();
    let merged = storage
        .set_settings(SettingsPatch::schedule(ScheduleConfig::daily(42)))
        .unwrap();

    assert!(merged.drip_feed);
    assert_eq!(merged.schedule_config, ScheduleConfig::daily(42));
    assert_eq!(merged.retry_config, RetryConfig::default());
    assert_eq!(storage.get_settings().unwrap(), merged);
}

#[test]
fn process_state_lives_in_the_session_dir() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp);

    storage
        .set_process_state(ProcessStatePatch::started())
        .unwrap();
    let state = storage
        .set_process_state(ProcessStatePatch::active_tab(TabId::from("7")))
        .unwrap();

    assert!(state.is_processing);
    assert_eq!(state.active_tab_id, Some(TabId::from("7")));
    assert!(temp.path().join("session/process_state.ron").is_file());

    // A fresh session starts with no run record while the queue stays.
    let fresh = FileStorage::new(temp.path().join("data"), temp.path().join("other"));
    assert_eq!(fresh.get_process_state().unwrap(), None);
}

#[test]
fn slots_are_written_and_removed() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp);
    let slot = temp.path().join("session/slots/queue_images_a.json");

    storage
        .put("queue_images_a", json!([{ "name": "cat.png" }]))
        .unwrap();
    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&slot).unwrap()).unwrap();
    assert_eq!(stored, json!([{ "name": "cat.png" }]));

    storage.remove("queue_images_a").unwrap();
    assert!(!slot.exists());
    // Removing twice is fine.
    storage.remove("queue_images_a").unwrap();
}

#[test]
fn corrupt_queue_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp);
    ensure_dir(storage.data_dir()).unwrap();
    fs::write(storage.data_dir().join("queue.ron"), "[ not ron").unwrap();

    let err = storage.get_queue().unwrap_err();
    assert!(matches!(err, StorageError::Parse { .. }));
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("queue.ron", "[]").unwrap();
    let second = writer.write("queue.ron", "[()]").unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "[()]");
}

#[test]
fn writer_fails_when_dir_is_a_file() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let result = AtomicFileWriter::new(file_path.clone()).write("queue.ron", "[]");
    assert!(result.is_err());
}

#[test]
fn second_engine_host_is_refused_until_the_first_lets_go() {
    let temp = TempDir::new().unwrap();
    let first = storage(&temp).lock_engine().unwrap();
    assert!(first.path().starts_with(temp.path().join("data")));

    let err = storage(&temp).lock_engine().unwrap_err();
    match err {
        LockError::Held { holder, .. } => assert_eq!(holder, std::process::id().to_string()),
        other => panic!("expected Held, got {other:?}"),
    }

    drop(first);
    assert!(storage(&temp).lock_engine().is_ok());
}

#[test]
fn engines_on_separate_queues_do_not_contend() {
    let temp = TempDir::new().unwrap();
    let _first = storage(&temp).lock_engine().unwrap();
    let other = FileStorage::new(temp.path().join("other-data"), temp.path().join("session"));
    assert!(other.lock_engine().is_ok());
}
