use notey_core::db::open_db_in_memory;
use notey_core::{
    Note, NoteColor, NoteId, NoteRepository, NoteValidationError, RepoError, SqliteNoteRepository,
};
use rusqlite::Connection;

fn clock_at_1000() -> i64 {
    1_000
}

fn clock_at_500() -> i64 {
    500
}

fn clock_at_2000() -> i64 {
    2_000
}

#[test]
fn insert_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::with_clock(&conn, clock_at_1000).unwrap();

    let color = NoteColor::PALETTE[3];
    let id = repo
        .insert_note(&Note::draft("Shopping", "buy milk", color))
        .unwrap();

    let loaded = repo.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.title, "Shopping");
    assert_eq!(loaded.description, "buy milk");
    assert_eq!(loaded.color, color);
    assert_eq!(loaded.last_modified, 1_000);
}

#[test]
fn insert_ignores_caller_supplied_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let mut note = Note::draft("Trip", "", NoteColor::DEFAULT);
    note.id = NoteId(42);
    let id = repo.insert_note(&note).unwrap();

    assert!(id.is_assigned());
    assert_ne!(id, NoteId(42));
}

#[test]
fn insert_with_blank_title_is_rejected_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    for title in ["", "   ", "\t\n"] {
        let err = repo
            .insert_note(&Note::draft(title, "body", NoteColor::DEFAULT))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Validation(NoteValidationError::BlankTitle)
        ));
    }

    assert!(repo.list_notes().unwrap().is_empty());
}

#[test]
fn insert_keeps_unicode_and_long_text_verbatim() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let description = "日本語のメモ 🎒\n\n".repeat(2_000);
    let id = repo
        .insert_note(&Note::draft("  padded  ", description.as_str(), NoteColor::DEFAULT))
        .unwrap();

    let loaded = repo.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.title, "  padded  ");
    assert_eq!(loaded.description, description);
}

#[test]
fn update_replaces_fields_and_keeps_id() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::with_clock(&conn, clock_at_1000).unwrap();
    let id = repo
        .insert_note(&Note::draft("draft", "old", NoteColor::DEFAULT))
        .unwrap();

    let later = SqliteNoteRepository::with_clock(&conn, clock_at_2000).unwrap();
    let mut note = later.get_note(id).unwrap().unwrap();
    note.title = "final".to_string();
    note.description = "new".to_string();
    note.color = NoteColor::PALETTE[0];
    later.update_note(&note).unwrap();

    let loaded = later.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.title, "final");
    assert_eq!(loaded.description, "new");
    assert_eq!(loaded.color, NoteColor::PALETTE[0]);
    assert_eq!(loaded.last_modified, 2_000);
}

#[test]
fn update_never_moves_last_modified_backwards() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::with_clock(&conn, clock_at_1000).unwrap();
    let id = repo
        .insert_note(&Note::draft("title", "", NoteColor::DEFAULT))
        .unwrap();

    let skewed = SqliteNoteRepository::with_clock(&conn, clock_at_500).unwrap();
    let mut note = skewed.get_note(id).unwrap().unwrap();
    note.description = "edited".to_string();
    skewed.update_note(&note).unwrap();

    let loaded = skewed.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.description, "edited");
    assert_eq!(loaded.last_modified, 1_000);
}

#[test]
fn update_missing_note_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let mut note = Note::draft("ghost", "", NoteColor::DEFAULT);
    note.id = NoteId(77);
    let err = repo.update_note(&note).unwrap_err();

    assert!(matches!(err, RepoError::NotFound(NoteId(77))));
    assert!(repo.list_notes().unwrap().is_empty());
}

#[test]
fn update_with_blank_title_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let id = repo
        .insert_note(&Note::draft("keep", "", NoteColor::DEFAULT))
        .unwrap();

    let mut note = repo.get_note(id).unwrap().unwrap();
    note.title = " ".to_string();
    let err = repo.update_note(&note).unwrap_err();

    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(repo.get_note(id).unwrap().unwrap().title, "keep");
}

#[test]
fn delete_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let id = repo
        .insert_note(&Note::draft("gone", "", NoteColor::DEFAULT))
        .unwrap();

    assert!(repo.delete_note(id).unwrap());
    assert!(!repo.delete_note(id).unwrap());
    assert!(!repo.delete_note(NoteId(9_999)).unwrap());
    assert!(repo.get_note(id).unwrap().is_none());
}

#[test]
fn ids_are_not_reused_after_delete() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let first = repo
        .insert_note(&Note::draft("one", "", NoteColor::DEFAULT))
        .unwrap();
    let second = repo
        .insert_note(&Note::draft("two", "", NoteColor::DEFAULT))
        .unwrap();
    repo.delete_note(second).unwrap();

    let third = repo
        .insert_note(&Note::draft("three", "", NoteColor::DEFAULT))
        .unwrap();
    assert!(second > first);
    assert!(third > second);
}

#[test]
fn list_returns_notes_in_insertion_order() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    for title in ["a", "b", "c"] {
        repo.insert_note(&Note::draft(title, "", NoteColor::DEFAULT))
            .unwrap();
    }

    let titles: Vec<String> = repo
        .list_notes()
        .unwrap()
        .into_iter()
        .map(|note| note.title)
        .collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
}

#[test]
fn repository_requires_migrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteNoteRepository::try_new(&conn).err().unwrap();
    assert!(matches!(err, RepoError::MissingRequiredTable(_)));
}

#[test]
fn update_description_leaves_other_fields_alone() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::with_clock(&conn, clock_at_1000).unwrap();
    let id = repo
        .insert_note(&Note::draft("Letter", "dear team", NoteColor::PALETTE[4]))
        .unwrap();

    let later = SqliteNoteRepository::with_clock(&conn, clock_at_2000).unwrap();
    let mut edited = later.get_note(id).unwrap().unwrap();
    edited.title = "Renamed".to_string();
    later.update_note(&edited).unwrap();
    later.update_description(id, "Dear team,").unwrap();

    let loaded = later.get_note(id).unwrap().unwrap();
    assert_eq!(loaded.title, "Renamed");
    assert_eq!(loaded.color, NoteColor::PALETTE[4]);
    assert_eq!(loaded.description, "Dear team,");
    assert_eq!(loaded.last_modified, 2_000);

    let skewed = SqliteNoteRepository::with_clock(&conn, clock_at_500).unwrap();
    skewed.update_description(id, "again").unwrap();
    assert_eq!(skewed.get_note(id).unwrap().unwrap().last_modified, 2_000);
}

#[test]
fn update_description_of_missing_note_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let err = repo.update_description(NoteId(5), "text").unwrap_err();

    assert!(matches!(err, RepoError::NotFound(NoteId(5))));
}
