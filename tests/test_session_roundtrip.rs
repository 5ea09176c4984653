//! Session archive persistence

use archivist::chat::ChatTurn;
use archivist::error::ArchivistError;
use archivist::evaluation::Evaluation;
use archivist::session::{new_session_id, SessionArchive};
use tempfile::TempDir;

#[test]
fn test_two_turns_survive_reload() {
    let temp = TempDir::new().unwrap();
    let archive = SessionArchive::new(temp.path().join("history"));
    let id = new_session_id();

    let turns = vec![
        ChatTurn::user("What color is the sky?"),
        ChatTurn::assistant("The sky is blue.").with_evaluation(Evaluation {
            faithfulness: Some(true),
            relevancy: Some(true),
            feedback: "YES. Supported.".to_string(),
        }),
    ];
    assert!(archive.save(&id, &turns).unwrap());

    // Fresh archive over the same directory, as after a restart
    let reopened = SessionArchive::new(temp.path().join("history"));
    assert_eq!(reopened.load(&id).unwrap(), turns);

    let sessions = reopened.list().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, id);
    assert_eq!(sessions[0].preview, "What color is the sky?...");
}

#[test]
fn test_empty_session_not_persisted() {
    let temp = TempDir::new().unwrap();
    let archive = SessionArchive::new(temp.path());
    let id = new_session_id();

    assert!(!archive.save(&id, &[]).unwrap());
    assert!(matches!(
        archive.load(&id),
        Err(ArchivistError::SessionNotFound { .. })
    ));
}

#[test]
fn test_delete_then_list() {
    let temp = TempDir::new().unwrap();
    let archive = SessionArchive::new(temp.path());
    let keep = new_session_id();
    let gone = new_session_id();

    archive.save(&keep, &[ChatTurn::user("first")]).unwrap();
    archive.save(&gone, &[ChatTurn::user("second")]).unwrap();
    archive.delete(&gone).unwrap();

    let ids: Vec<String> = archive.list().unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![keep]);
    assert!(matches!(
        archive.delete(&gone),
        Err(ArchivistError::SessionNotFound { .. })
    ));
}

#[test]
fn test_path_like_ids_rejected() {
    let temp = TempDir::new().unwrap();
    let archive = SessionArchive::new(temp.path());
    assert!(matches!(
        archive.save("../escape", &[ChatTurn::user("x")]),
        Err(ArchivistError::InvalidSessionId { .. })
    ));
}
