// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation transcript persistence.
//!
//! Messages are ordered by a per-conversation sequence number assigned at
//! append time. Parts are stored as a JSON array.

use std::str::FromStr;

use driftwood_core::{ContentPart, DriftwoodError, Message, Role};
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::queries::json_column_err;

fn encode_parts(parts: &[ContentPart]) -> Result<String, DriftwoodError> {
    serde_json::to_string(parts).map_err(|e| DriftwoodError::Storage {
        source: Box::new(e),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<Message, rusqlite::Error> {
    let role: String = row.get(1)?;
    let role = Role::from_str(&role).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let parts: String = row.get(2)?;
    let parts = serde_json::from_str(&parts).map_err(|e| json_column_err(2, e))?;
    Ok(Message {
        id: row.get(0)?,
        role,
        parts,
        created_at: row.get(3)?,
    })
}

/// Append a message to the end of a conversation. Returns its sequence number.
pub async fn append_message(
    db: &Database,
    conversation_id: &str,
    msg: &Message,
) -> Result<i64, DriftwoodError> {
    let conversation_id = conversation_id.to_string();
    let id = msg.id.clone();
    let role = msg.role.to_string();
    let parts = encode_parts(&msg.parts)?;
    let created_at = msg.created_at;

    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let tx = conn.transaction()?;
            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO messages (id, conversation_id, seq, role, parts, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, conversation_id, seq, role, parts, created_at],
            )?;
            tx.commit()?;
            Ok(seq)
        })
        .await
        .map_err(map_tr_err)
}

/// Load a conversation's transcript in order.
pub async fn load_transcript(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, DriftwoodError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Message>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, role, parts, created_at FROM messages
                 WHERE conversation_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], row_to_message)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the parts of an existing message.
pub async fn update_message_parts(db: &Database, msg: &Message) -> Result<(), DriftwoodError> {
    let id = msg.id.clone();
    let parts = encode_parts(&msg.parts)?;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE messages SET parts = ?1 WHERE id = ?2",
                params![parts, id],
            )?;
            if updated != 1 {
                return Err(rusqlite::Error::StatementChangedRows(updated));
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a transcript rewrite atomically: update the parts of `updated`
/// messages and delete the messages whose ids are in `removed`.
pub async fn rewrite_messages(
    db: &Database,
    conversation_id: &str,
    updated: &[Message],
    removed: &[String],
) -> Result<(), DriftwoodError> {
    if updated.is_empty() && removed.is_empty() {
        return Ok(());
    }

    let conversation_id = conversation_id.to_string();
    let updates = updated
        .iter()
        .map(|m| Ok((m.id.clone(), encode_parts(&m.parts)?)))
        .collect::<Result<Vec<_>, DriftwoodError>>()?;
    let removed = removed.to_vec();

    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            for (id, parts) in &updates {
                tx.execute(
                    "UPDATE messages SET parts = ?1 WHERE id = ?2 AND conversation_id = ?3",
                    params![parts, id, conversation_id],
                )?;
            }
            for id in &removed {
                tx.execute(
                    "DELETE FROM messages WHERE id = ?1 AND conversation_id = ?2",
                    params![id, conversation_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
