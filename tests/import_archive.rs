//! End-to-end coverage of the export-archive importer (spec.md §4.5, §8
//! scenario S5) against a real on-disk database, mirroring the teacher's
//! full-schema integration-test role (`email-tests`) without its IMAP
//! fixtures.

use chatvault::db::Accessor;
use chatvault::import::import_export_archive;

fn open_test_db() -> (tempfile::TempDir, Accessor) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("main.db");
    let accessor = Accessor::open(&db_path).unwrap();
    (dir, accessor)
}

/// S5: two `MessageList` entries share `(from, originalarrivaltime)`; only
/// the second carries `properties.edittime`. One `Messages` row should
/// survive, carrying the later message's `pk_id`/`guid` and the
/// `edited_timestamp`.
#[test]
fn edited_export_message_collapses_to_one_row() {
    let (_dir, accessor) = open_test_db();
    let export = r#"
    {
      "userId": "8:self",
      "conversations": [
        {
          "id": "8:alice",
          "displayName": "Alice",
          "MessageList": [
            {
              "id": "100",
              "from": "8:alice",
              "displayName": "Alice",
              "content": "hello",
              "originalarrivaltime": "2020-01-01T00:00:00Z",
              "messagetype": "Text",
              "properties": {}
            },
            {
              "id": "200",
              "from": "8:alice",
              "displayName": "Alice",
              "content": "hello edited",
              "originalarrivaltime": "2020-01-01T00:00:00Z",
              "messagetype": "Text",
              "properties": { "edittime": "1577836860" }
            }
          ]
        }
      ]
    }
    "#;

    let summary = import_export_archive(export.as_bytes(), &accessor, "self").unwrap();
    assert_eq!(summary.conversations_imported, 1);
    assert_eq!(summary.messages_imported, 1);

    let conversations = accessor.get_conversations().unwrap();
    assert_eq!(conversations.len(), 1);
    let convo_id = conversations[0].get("id").and_then(|v| v.as_i64()).unwrap();

    let messages = accessor.get_messages(convo_id).unwrap();
    assert_eq!(messages.len(), 1);
    let edited_timestamp = messages[0].get("edited_timestamp").and_then(|v| v.as_i64());
    assert_eq!(edited_timestamp, Some(1577836860));
}

/// A `48:`-prefixed chat is skipped entirely: no conversation, no messages.
#[test]
fn special_prefixed_chat_is_skipped() {
    let (_dir, accessor) = open_test_db();
    let export = r#"
    {
      "userId": "8:self",
      "conversations": [
        { "id": "48:skype.alert", "MessageList": [] }
      ]
    }
    "#;

    let summary = import_export_archive(export.as_bytes(), &accessor, "self").unwrap();
    assert_eq!(summary.conversations_imported, 0);
    assert_eq!(summary.conversations_skipped, 1);
    assert!(accessor.get_conversations().unwrap().is_empty());
}

/// A single chat with no `threadProperties.members` synthesizes `{self, other}`.
#[test]
fn single_chat_without_member_list_synthesizes_pair() {
    let (_dir, accessor) = open_test_db();
    let export = r#"
    {
      "userId": "8:self",
      "conversations": [
        {
          "id": "8:bob",
          "MessageList": [
            {
              "id": "1",
              "from": "8:bob",
              "content": "hi",
              "originalarrivaltime": "2021-05-01T00:00:00Z",
              "messagetype": "Text",
              "properties": {}
            }
          ]
        }
      ]
    }
    "#;

    let summary = import_export_archive(export.as_bytes(), &accessor, "self").unwrap();
    assert_eq!(summary.conversations_imported, 1);
    assert_eq!(summary.participants_inserted, 2);
}
