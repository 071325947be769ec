//! Delete-cascade graph, ported from `skypedata.py::delete_data`'s
//! `CASCADE_DELETES`/`DEFERRED`/`REL_ALIASES`/`DEL_ALIASES` tables. The
//! traversal descends up to three levels (parent -> link table ->
//! grandchild), building one `DELETE FROM ... WHERE col IN (SELECT ...)`
//! per edge; `Calls` is deferred because it participates in a cycle with
//! `CallMembers`.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;

use crate::error::Result;

type Rule = (&'static str, &'static str, &'static [(&'static str, &'static [&'static str])]);

const CASCADE_DELETES: &[Rule] = &[
    ("CallMembers", "call_db_id", &[("Calls", &["id"])]),
    ("CallMembers", "call_name", &[("Calls", &["name"])]),
    (
        "Calls",
        "id",
        &[
            ("CallMembers", &["call_db_id"]),
            ("ContentSharings", &["call_id"]),
            ("LightWeightMeetings", &["call_id"]),
        ],
    ),
    ("Calls", "name", &[("CallMembers", &["call_name"])]),
    ("Chats", "name", &[("ChatMembers", &["chatname"])]),
    (
        "Contacts",
        "identity",
        &[
            ("Alerts", &["partner_name"]),
            ("CallMembers", &["identity"]),
            ("Calls", &["host_identity"]),
            ("ChatMembers", &["identity"]),
            ("MessageAnnotations", &["author"]),
            ("Messages", &["author"]),
            ("Participants", &["identity"]),
            ("SMSes", &["convo_name", "TRIM(target_numbers)"]),
            ("Transfers", &["partner_handle"]),
            ("VideoMessages", &["author"]),
            ("Voicemails", &["partner_handle"]),
        ],
    ),
    (
        "Conversations",
        "id",
        &[
            ("Calls", &["conv_dbid"]),
            ("Chats", &["conv_dbid"]),
            ("Messages", &["convo_id"]),
            ("MediaDocuments", &["convo_id"]),
            ("Participants", &["convo_id"]),
            ("Transfers", &["convo_id"]),
            ("Videos", &["convo_id"]),
            ("Voicemails", &["convo_id"]),
        ],
    ),
    ("Conversations", "identity", &[("SMSes", &["convo_name"])]),
    (
        "Messages",
        "id",
        &[
            ("MessageAnnotations", &["message_id"]),
            ("SMSes", &["chatmsg_id"]),
        ],
    ),
];

const DEFERRED_TABLE: &str = "Calls";
const DEFERRED_COL: &str = "id";

fn rel_alias(table: &str, col: &str) -> &str {
    match (table, col) {
        ("Contacts", "identity") => "COALESCE(skypename, pstnnumber, '')",
        _ => col,
    }
}

fn del_alias(table: &str, col: &str) -> &str {
    match (table, col) {
        ("Contacts", "identity") | ("Conversations", "identity") => "id",
        _ => col,
    }
}

fn rules_for(table: &str) -> impl Iterator<Item = &'static (&'static str, &'static [(&'static str, &'static [&'static str])])> {
    CASCADE_DELETES.iter().filter(move |(t, _, _)| *t == table)
}

/// One path segment: parent (table, col) through an optional link
/// (table, col, parent-col-in-link) through an optional grandchild
/// (parent-col-in-link2, table, col).
struct DelPath {
    segments: Vec<String>, // flattened, mirrors the python tuple layout
}

fn build_delstack(root: &str) -> Vec<DelPath> {
    let mut stack = Vec::new();
    for (table, pcol, rels) in rules_for(root) {
        stack.push(DelPath {
            segments: vec![table.to_string(), pcol.to_string()],
        });
        for (table2, cols2) in rels.iter() {
            for col2 in cols2.iter() {
                stack.push(DelPath {
                    segments: vec![
                        table.to_string(),
                        pcol.to_string(),
                        table2.to_string(),
                        col2.to_string(),
                    ],
                });
            }
            for (pcol2, rels2) in rules_for(table2) {
                for (table3, cols3) in rels2.iter() {
                    for col2 in cols2.iter() {
                        for col3 in cols3.iter() {
                            stack.push(DelPath {
                                segments: vec![
                                    table.to_string(),
                                    pcol.to_string(),
                                    table2.to_string(),
                                    col2.to_string(),
                                    pcol2.to_string(),
                                    table3.to_string(),
                                    col3.to_string(),
                                ],
                            });
                        }
                    }
                }
            }
        }
    }
    // Depth-first, Calls deferred to the end at each depth.
    stack.sort_by_key(|p| {
        let len = p.segments.len();
        let second_last = p.segments[p.segments.len() - 2].clone();
        (len, second_last == DEFERRED_TABLE, p.segments[p.segments.len() - 2..].to_vec())
    });
    stack
}

/// A row eligible for deletion: its numeric (or alias) key value, plus the
/// key value of a linked predecessor row if one exists (Conversations'
/// `__link`, so deleting the newer row also deletes the older one's data).
pub struct Deletable {
    pub key_value: String,
    pub linked_key_value: Option<String>,
}

/// Executes the cascade for `root` ("Conversations" or "Contacts") against
/// `deletables`, returning rows deleted per table. Runs inside its own
/// transaction.
pub fn delete_cascade(
    conn: &mut Connection,
    root: &str,
    deletables: &[Deletable],
) -> Result<HashMap<String, usize>> {
    let mut result = HashMap::new();
    if deletables.is_empty() {
        return Ok(result);
    }

    let delstack = build_delstack(root);
    let mut sqls: Vec<(String, String)> = Vec::new();
    let mut seen_sqls: HashSet<String> = HashSet::new();
    let mut deferred_wheres: Vec<String> = Vec::new();

    let mut values: Vec<String> = deletables.iter().map(|d| d.key_value.clone()).collect();
    for d in deletables {
        if let Some(link) = &d.linked_key_value {
            values.push(link.clone());
        }
    }
    let val_list = values.join(", ");

    for path in &delstack {
        let segs = &path.segments;
        let (stable, scol) = (segs[0].as_str(), segs[1].as_str());
        let (dtable, dcol) = (segs[segs.len() - 2].as_str(), segs[segs.len() - 1].as_str());

        let mut val = val_list.clone();
        if segs.len() != 2 && rel_alias(stable, scol) != scol {
            val = format!(
                "SELECT {} FROM {} WHERE {} IN ({})",
                rel_alias(stable, scol),
                stable,
                del_alias(stable, scol),
                val
            );
        }
        let mut index = 2;
        while index + 3 < segs.len() {
            let ftable = &segs[index];
            let fcol = &segs[index + 1];
            let fkeycol = &segs[index + 2];
            val = format!("SELECT {} FROM {} WHERE {} IN ({})", fkeycol, ftable, fcol, val);
            index += 3;
        }

        if dtable == DEFERRED_TABLE && dcol == DEFERRED_COL {
            deferred_wheres.push(format!("{} IN ({})", del_alias(dtable, dcol), val));
            continue;
        }

        let sql = format!("DELETE FROM {} WHERE {} IN ({})", dtable, del_alias(dtable, dcol), val);
        if seen_sqls.insert(sql.clone()) {
            sqls.push((dtable.to_string(), sql));
        }
    }

    let tx = conn.transaction()?;

    if !deferred_wheres.is_empty() {
        let select_sql = format!(
            "SELECT {} FROM {} WHERE {}",
            DEFERRED_COL,
            DEFERRED_TABLE,
            deferred_wheres.join(" OR ")
        );
        let mut stmt = tx.prepare(&select_sql)?;
        let ids: Vec<i64> = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .filter_map(|r| r.ok())
            .collect();
        if !ids.is_empty() {
            let id_list = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
            sqls.push((
                DEFERRED_TABLE.to_string(),
                format!("DELETE FROM {} WHERE {} IN ({})", DEFERRED_TABLE, DEFERRED_COL, id_list),
            ));
        }
    }

    for (table, sql) in &sqls {
        let count = tx.execute(sql, [])?;
        if count > 0 {
            *result.entry(table.clone()).or_insert(0) += count;
        }
    }

    tx.commit()?;
    Ok(result)
}

/// Rewrites `ContactGroups.members` to drop the given identities, mirroring
/// the post-cascade membership cleanup in `delete_data`.
pub fn prune_contact_group_members(conn: &Connection, removed_identities: &[String]) -> Result<()> {
    let mut stmt = conn.prepare("SELECT id, members FROM ContactGroups")?;
    let rows: Vec<(i64, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .filter_map(|r| r.ok())
        .collect();
    for (id, members) in rows {
        let members = members.unwrap_or_default();
        let kept: Vec<&str> = members
            .split_whitespace()
            .filter(|m| !removed_identities.iter().any(|r| r == m))
            .collect();
        let rejoined = kept.join(" ");
        if rejoined != members {
            conn.execute(
                "UPDATE ContactGroups SET members = ?1 WHERE id = ?2",
                rusqlite::params![rejoined, id],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delstack_defers_calls_to_last() {
        let stack = build_delstack("Conversations");
        let calls_positions: Vec<usize> = stack
            .iter()
            .enumerate()
            .filter(|(_, p)| p.segments[p.segments.len() - 2] == "Calls")
            .map(|(i, _)| i)
            .collect();
        let non_calls_positions: Vec<usize> = stack
            .iter()
            .enumerate()
            .filter(|(_, p)| p.segments[p.segments.len() - 2] != "Calls")
            .map(|(i, _)| i)
            .collect();
        if let (Some(&last_non), Some(&first_calls)) =
            (non_calls_positions.last(), calls_positions.first())
        {
            assert!(first_calls >= last_non || calls_positions.len() == stack.len());
        }
    }

    #[test]
    fn delete_cascade_removes_conversation_and_messages() {
        let mut conn = Connection::open_in_memory().unwrap();
        super::super::schema::ensure_schema(&conn).unwrap();
        conn.execute("INSERT INTO Conversations (id, identity) VALUES (1, 'alice')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO Messages (id, convo_id, author, body_xml) VALUES (1, 1, 'alice', 'hi')",
            [],
        )
        .unwrap();

        let deletables = vec![Deletable {
            key_value: "1".to_string(),
            linked_key_value: None,
        }];
        let result = delete_cascade(&mut conn, "Conversations", &deletables).unwrap();
        assert_eq!(result.get("Messages").copied(), Some(1));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM Conversations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
