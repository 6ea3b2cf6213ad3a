use super::*;

fn storage_in(dir: &tempfile::TempDir) -> FileStorage {
    FileStorage::open(dir.path()).unwrap()
}

#[test]
fn clear_refuses_unknown_board() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    let config = EditorConfig::default();
    let err = run_clear(storage.clone(), config.clone(), "nope").unwrap_err();
    assert!(matches!(err, CliError::UnknownBoard(ref id) if id == "nope"));
    assert!(storage.get(&config.board_key("nope")).unwrap().is_none());
}

#[test]
fn clear_saves_existing_board() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    let config = EditorConfig::default();
    run_add_note(storage.clone(), config.clone(), "desk", "hello".into(), None).unwrap();
    run_clear(storage.clone(), config.clone(), "desk").unwrap();

    let raw = storage.get(&config.board_key("desk")).unwrap().unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["stickies"].as_array().map(Vec::len), Some(0));
}

#[test]
fn add_note_fails_when_storage_rejects_the_write() {
    let dir = tempfile::tempdir().unwrap();
    let storage = storage_in(&dir);
    fs::remove_dir_all(dir.path()).unwrap();
    let err = run_add_note(storage, EditorConfig::default(), "desk", "hello".into(), None).unwrap_err();
    assert!(matches!(err, CliError::WriteFailed(ref id) if id == "desk"));
}
