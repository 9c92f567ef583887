// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent task scheduler with a single firing loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftwood_core::{DriftwoodError, ScheduledTask, Trigger};
use driftwood_storage::Database;
use driftwood_storage::queries::tasks;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::trigger::{first_run, next_cron_run};

/// Name of the only callback tasks are created with.
pub const EXECUTE_TASK: &str = "execute_task";

/// Receives tasks when they fire.
#[async_trait]
pub trait TaskCallback: Send + Sync + 'static {
    async fn execute_task(&self, task: ScheduledTask) -> Result<(), DriftwoodError>;
}

/// Result of [`Scheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

/// Creates, lists and cancels scheduled tasks, and fires them from [`Scheduler::run`].
#[derive(Clone)]
pub struct Scheduler {
    db: Database,
    wake: Arc<Notify>,
    max_idle: Duration,
}

impl Scheduler {
    pub fn new(db: Database, max_idle: Duration) -> Self {
        Self {
            db,
            wake: Arc::new(Notify::new()),
            max_idle,
        }
    }

    /// Store a new task owned by `owner` and return its id.
    pub async fn schedule(
        &self,
        owner: &str,
        trigger: Trigger,
        description: &str,
    ) -> Result<String, DriftwoodError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(DriftwoodError::Validation(
                "task description must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let next_run_at = first_run(&trigger, now)?;
        let task = ScheduledTask {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            trigger,
            payload: description.to_string(),
            callback: EXECUTE_TASK.to_string(),
            created_at: now,
            next_run_at,
        };
        tasks::insert_task(&self.db, &task).await?;
        self.wake.notify_one();

        info!(
            task_id = %task.id,
            owner,
            trigger = %task.trigger,
            next_run_at = %task.next_run_at,
            "task scheduled"
        );
        Ok(task.id)
    }

    /// Tasks owned by `owner`, soonest first.
    pub async fn list(&self, owner: &str) -> Result<Vec<ScheduledTask>, DriftwoodError> {
        tasks::list_tasks(&self.db, owner).await
    }

    /// Remove a task. Ids owned by other conversations are reported as not found.
    pub async fn cancel(&self, owner: &str, id: &str) -> Result<CancelOutcome, DriftwoodError> {
        if tasks::delete_task(&self.db, owner, id).await? {
            self.wake.notify_one();
            info!(task_id = id, owner, "task cancelled");
            Ok(CancelOutcome::Cancelled)
        } else {
            debug!(task_id = id, owner, "cancel requested for unknown task");
            Ok(CancelOutcome::NotFound)
        }
    }

    /// Fire every task due at `now`. Returns how many were dispatched.
    ///
    /// One-shot tasks are deleted before dispatch and cron tasks are advanced,
    /// so a crash mid-dispatch never fires the same occurrence twice.
    pub async fn fire_due(
        &self,
        callback: &Arc<dyn TaskCallback>,
        now: DateTime<Utc>,
    ) -> Result<usize, DriftwoodError> {
        let due = tasks::due_tasks(&self.db, now).await?;
        let mut fired = 0;

        for task in due {
            if task.callback != EXECUTE_TASK {
                warn!(task_id = %task.id, callback = %task.callback, "unknown callback, dropping task");
                tasks::delete_task_by_id(&self.db, &task.id).await?;
                continue;
            }

            match &task.trigger {
                Trigger::Cron { expression } => match next_cron_run(expression, now) {
                    Ok(next) => {
                        tasks::update_next_run(&self.db, &task.id, next).await?;
                    }
                    Err(e) => {
                        warn!(task_id = %task.id, error = %e, "cron task cannot be rescheduled, dropping");
                        tasks::delete_task_by_id(&self.db, &task.id).await?;
                    }
                },
                Trigger::At { .. } | Trigger::After { .. } => {
                    tasks::delete_task_by_id(&self.db, &task.id).await?;
                }
            }

            info!(task_id = %task.id, owner = %task.owner, "firing scheduled task");
            let callback = Arc::clone(callback);
            tokio::spawn(async move {
                let task_id = task.id.clone();
                if let Err(e) = callback.execute_task(task).await {
                    error!(task_id = %task_id, error = %e, "scheduled task callback failed");
                }
            });
            fired += 1;
        }

        Ok(fired)
    }

    /// Run the firing loop until `cancel` is triggered.
    ///
    /// Sleeps until the earliest due time, at most `max_idle`, and wakes early
    /// whenever a task is scheduled or cancelled.
    pub async fn run(
        &self,
        callback: Arc<dyn TaskCallback>,
        cancel: CancellationToken,
    ) -> Result<(), DriftwoodError> {
        info!("scheduler running");

        loop {
            if let Err(e) = self.fire_due(&callback, Utc::now()).await {
                error!(error = %e, "failed to fire due tasks");
            }

            let wait = match tasks::next_run_at(&self.db).await {
                Ok(Some(next)) => (next - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
                    .min(self.max_idle),
                Ok(None) => self.max_idle,
                Err(e) => {
                    warn!(error = %e, "failed to read next run time");
                    self.max_idle
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("shutdown signal received, stopping scheduler");
                    break;
                }
                _ = self.wake.notified() => {
                    debug!("scheduler woken by task change");
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerSpec;
    use chrono::Duration as ChronoDuration;
    use tempfile::tempdir;
    use tokio::sync::mpsc;

    struct ChannelCallback(mpsc::UnboundedSender<ScheduledTask>);

    #[async_trait]
    impl TaskCallback for ChannelCallback {
        async fn execute_task(&self, task: ScheduledTask) -> Result<(), DriftwoodError> {
            let _ = self.0.send(task);
            Ok(())
        }
    }

    async fn setup() -> (Scheduler, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cron.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (Scheduler::new(db, Duration::from_secs(60)), dir)
    }

    fn callback() -> (Arc<dyn TaskCallback>, mpsc::UnboundedReceiver<ScheduledTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelCallback(tx)), rx)
    }

    #[tokio::test]
    async fn schedule_list_cancel_roundtrip() {
        let (scheduler, _dir) = setup().await;
        let trigger = Trigger::try_from(TriggerSpec::delayed(30)).unwrap();
        let id = scheduler
            .schedule("conv-1", trigger, "water the plants")
            .await
            .unwrap();

        let listed = scheduler.list("conv-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].payload, "water the plants");
        assert_eq!(listed[0].callback, EXECUTE_TASK);

        assert_eq!(
            scheduler.cancel("conv-1", &id).await.unwrap(),
            CancelOutcome::Cancelled
        );
        assert!(scheduler.list("conv-1").await.unwrap().is_empty());
        assert_eq!(
            scheduler.cancel("conv-1", &id).await.unwrap(),
            CancelOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn tasks_are_scoped_to_owner() {
        let (scheduler, _dir) = setup().await;
        let id = scheduler
            .schedule("conv-1", Trigger::After { seconds: 10 }, "mine")
            .await
            .unwrap();
        assert!(scheduler.list("conv-2").await.unwrap().is_empty());
        assert_eq!(
            scheduler.cancel("conv-2", &id).await.unwrap(),
            CancelOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn empty_description_is_rejected() {
        let (scheduler, _dir) = setup().await;
        let err = scheduler
            .schedule("conv-1", Trigger::After { seconds: 1 }, "   ")
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn one_shot_fires_once_and_is_deleted() {
        let (scheduler, _dir) = setup().await;
        let (cb, mut rx) = callback();
        scheduler
            .schedule("conv-1", Trigger::After { seconds: 0 }, "ping")
            .await
            .unwrap();

        let later = Utc::now() + ChronoDuration::seconds(1);
        assert_eq!(scheduler.fire_due(&cb, later).await.unwrap(), 1);
        let fired = rx.recv().await.unwrap();
        assert_eq!(fired.payload, "ping");
        assert!(scheduler.list("conv-1").await.unwrap().is_empty());
        assert_eq!(scheduler.fire_due(&cb, later).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cron_task_is_advanced_not_deleted() {
        let (scheduler, _dir) = setup().await;
        let (cb, mut rx) = callback();
        let trigger = Trigger::try_from(TriggerSpec::cron("* * * * *")).unwrap();
        let id = scheduler.schedule("conv-1", trigger, "tick").await.unwrap();
        let before = scheduler.list("conv-1").await.unwrap()[0].next_run_at;

        let at = before + ChronoDuration::seconds(1);
        assert_eq!(scheduler.fire_due(&cb, at).await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().id, id);

        let after = scheduler.list("conv-1").await.unwrap();
        assert_eq!(after.len(), 1);
        assert!(after[0].next_run_at > at);
    }

    #[tokio::test]
    async fn future_tasks_do_not_fire() {
        let (scheduler, _dir) = setup().await;
        let (cb, _rx) = callback();
        scheduler
            .schedule("conv-1", Trigger::After { seconds: 3600 }, "later")
            .await
            .unwrap();
        assert_eq!(scheduler.fire_due(&cb, Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn run_loop_fires_and_stops_on_cancel() {
        let (scheduler, _dir) = setup().await;
        let (cb, mut rx) = callback();
        let cancel = CancellationToken::new();

        let runner = {
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cb, cancel).await })
        };

        scheduler
            .schedule("conv-1", Trigger::After { seconds: 0 }, "now please")
            .await
            .unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("task should fire")
            .unwrap();
        assert_eq!(fired.payload, "now please");

        cancel.cancel();
        runner.await.unwrap().unwrap();
    }
}
