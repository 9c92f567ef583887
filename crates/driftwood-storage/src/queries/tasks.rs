// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled task persistence.

use chrono::{DateTime, Utc};
use driftwood_core::{DriftwoodError, ScheduledTask};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::queries::json_column_err;

const TASK_COLUMNS: &str =
    "id, owner, trigger_spec, payload, callback, created_at, next_run_at";

fn row_to_task(row: &rusqlite::Row<'_>) -> Result<ScheduledTask, rusqlite::Error> {
    let trigger: String = row.get(2)?;
    let trigger = serde_json::from_str(&trigger).map_err(|e| json_column_err(2, e))?;
    Ok(ScheduledTask {
        id: row.get(0)?,
        owner: row.get(1)?,
        trigger,
        payload: row.get(3)?,
        callback: row.get(4)?,
        created_at: row.get(5)?,
        next_run_at: row.get(6)?,
    })
}

/// Insert a new task.
pub async fn insert_task(db: &Database, task: &ScheduledTask) -> Result<(), DriftwoodError> {
    let trigger = serde_json::to_string(&task.trigger).map_err(|e| DriftwoodError::Storage {
        source: Box::new(e),
    })?;
    let task = task.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO scheduled_tasks
                     (id, owner, trigger_spec, payload, callback, created_at, next_run_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    task.id,
                    task.owner,
                    trigger,
                    task.payload,
                    task.callback,
                    task.created_at,
                    task.next_run_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Tasks owned by a conversation, soonest first.
pub async fn list_tasks(db: &Database, owner: &str) -> Result<Vec<ScheduledTask>, DriftwoodError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<ScheduledTask>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM scheduled_tasks
                 WHERE owner = ?1 ORDER BY next_run_at ASC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![owner], row_to_task)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a task only if `owner` owns it. Returns whether a row was removed.
pub async fn delete_task(db: &Database, owner: &str, id: &str) -> Result<bool, DriftwoodError> {
    let owner = owner.to_string();
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let deleted = conn.execute(
                "DELETE FROM scheduled_tasks WHERE id = ?1 AND owner = ?2",
                params![id, owner],
            )?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a task by id regardless of owner.
pub async fn delete_task_by_id(db: &Database, id: &str) -> Result<bool, DriftwoodError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let deleted = conn.execute("DELETE FROM scheduled_tasks WHERE id = ?1", params![id])?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Earliest `next_run_at` across all tasks.
pub async fn next_run_at(db: &Database) -> Result<Option<DateTime<Utc>>, DriftwoodError> {
    db.connection()
        .call(|conn| -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
            conn.query_row(
                "SELECT next_run_at FROM scheduled_tasks ORDER BY next_run_at ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Tasks whose `next_run_at` is at or before `now`, oldest first.
pub async fn due_tasks(
    db: &Database,
    now: DateTime<Utc>,
) -> Result<Vec<ScheduledTask>, DriftwoodError> {
    db.connection()
        .call(move |conn| -> Result<Vec<ScheduledTask>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM scheduled_tasks
                 WHERE next_run_at <= ?1 ORDER BY next_run_at ASC"
            ))?;
            let rows = stmt.query_map(params![now], row_to_task)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Move a recurring task to its next occurrence. Returns false if it no longer exists.
pub async fn update_next_run(
    db: &Database,
    id: &str,
    next: DateTime<Utc>,
) -> Result<bool, DriftwoodError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let updated = conn.execute(
                "UPDATE scheduled_tasks SET next_run_at = ?1 WHERE id = ?2",
                params![next, id],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use driftwood_core::Trigger;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn make_task(id: &str, owner: &str, trigger: Trigger, next_run_at: DateTime<Utc>) -> ScheduledTask {
        ScheduledTask {
            id: id.to_string(),
            owner: owner.to_string(),
            trigger,
            payload: format!("payload for {id}"),
            callback: "execute_task".to_string(),
            created_at: Utc::now(),
            next_run_at,
        }
    }

    #[tokio::test]
    async fn insert_and_list_by_owner() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let later = make_task("t2", "conv-a", Trigger::After { seconds: 60 }, now + Duration::seconds(60));
        let sooner = make_task(
            "t1",
            "conv-a",
            Trigger::Cron { expression: "*/5 * * * *".into() },
            now + Duration::seconds(5),
        );
        let other = make_task("t3", "conv-b", Trigger::After { seconds: 1 }, now);

        insert_task(&db, &later).await.unwrap();
        insert_task(&db, &sooner).await.unwrap();
        insert_task(&db, &other).await.unwrap();

        let tasks = list_tasks(&db, "conv-a").await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "t1");
        assert_eq!(tasks[0].trigger, sooner.trigger);
        assert_eq!(tasks[1].id, "t2");
        assert!(list_tasks(&db, "conv-c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_respects_owner() {
        let (db, _dir) = setup_db().await;
        let task = make_task("t1", "conv-a", Trigger::After { seconds: 1 }, Utc::now());
        insert_task(&db, &task).await.unwrap();

        assert!(!delete_task(&db, "conv-b", "t1").await.unwrap());
        assert!(delete_task(&db, "conv-a", "t1").await.unwrap());
        assert!(!delete_task(&db, "conv-a", "t1").await.unwrap());
    }

    #[tokio::test]
    async fn due_and_next_run() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        assert!(next_run_at(&db).await.unwrap().is_none());

        let past = make_task("past", "c", Trigger::After { seconds: 0 }, now - Duration::seconds(10));
        let future = make_task("future", "c", Trigger::After { seconds: 3600 }, now + Duration::hours(1));
        insert_task(&db, &future).await.unwrap();
        insert_task(&db, &past).await.unwrap();

        assert_eq!(next_run_at(&db).await.unwrap(), Some(past.next_run_at));
        let due = due_tasks(&db, now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "past");
    }

    #[tokio::test]
    async fn update_next_run_moves_task() {
        let (db, _dir) = setup_db().await;
        let now = Utc::now();
        let task = make_task(
            "cron",
            "c",
            Trigger::Cron { expression: "* * * * *".into() },
            now - Duration::seconds(1),
        );
        insert_task(&db, &task).await.unwrap();

        let next = now + Duration::minutes(1);
        assert!(update_next_run(&db, "cron", next).await.unwrap());
        assert!(due_tasks(&db, now).await.unwrap().is_empty());
        assert!(!update_next_run(&db, "gone", next).await.unwrap());
        assert!(delete_task_by_id(&db, "cron").await.unwrap());
    }
}
