// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling tools. Every task is owned by the calling conversation.

use async_trait::async_trait;
use driftwood_core::{DriftwoodError, Trigger};
use driftwood_cron::{CancelOutcome, Scheduler};

use super::bottle::unexpected;
use crate::kind::{CancelTaskInput, ScheduleTaskInput, ToolInput, ToolKind};
use crate::tool::{Tool, ToolContext, ToolOutput};

/// Returned by `list_scheduled_tasks` when the conversation owns no tasks.
pub const NO_TASKS: &str = "No scheduled tasks found.";

pub struct ScheduleTaskTool {
    scheduler: Scheduler,
}

impl ScheduleTaskTool {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ScheduleTaskTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ScheduleTask
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError> {
        let ScheduleTaskInput { when, description } = match input {
            ToolInput::ScheduleTask(input) => input,
            other => return Err(unexpected(self.kind(), &other)),
        };
        let trigger = Trigger::try_from(when)?;
        let summary = trigger.to_string();
        let id = self
            .scheduler
            .schedule(&ctx.conversation_id, trigger, &description)
            .await?;
        Ok(ToolOutput::ok(format!(
            "Scheduled task {id} ({summary}): {}",
            description.trim()
        )))
    }
}

pub struct ListScheduledTasksTool {
    scheduler: Scheduler,
}

impl ListScheduledTasksTool {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for ListScheduledTasksTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ListScheduledTasks
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError> {
        if !matches!(input, ToolInput::ListScheduledTasks) {
            return Err(unexpected(self.kind(), &input));
        }

        let tasks = self.scheduler.list(&ctx.conversation_id).await?;
        if tasks.is_empty() {
            return Ok(ToolOutput::ok(NO_TASKS));
        }

        let lines: Vec<String> = tasks
            .iter()
            .map(|t| {
                format!(
                    "- {}: {} ({}, next run {})",
                    t.id,
                    t.payload,
                    t.trigger,
                    t.next_run_at.to_rfc3339()
                )
            })
            .collect();
        Ok(ToolOutput::ok(format!(
            "{} scheduled task(s):\n{}",
            tasks.len(),
            lines.join("\n")
        )))
    }
}

pub struct CancelScheduledTaskTool {
    scheduler: Scheduler,
}

impl CancelScheduledTaskTool {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for CancelScheduledTaskTool {
    fn kind(&self) -> ToolKind {
        ToolKind::CancelScheduledTask
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError> {
        let CancelTaskInput { id } = match input {
            ToolInput::CancelScheduledTask(input) => input,
            other => return Err(unexpected(self.kind(), &other)),
        };
        let content = match self.scheduler.cancel(&ctx.conversation_id, &id).await? {
            CancelOutcome::Cancelled => format!("Task {id} cancelled."),
            CancelOutcome::NotFound => format!("Task {id} not found."),
        };
        Ok(ToolOutput::ok(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use driftwood_cron::TriggerSpec;
    use driftwood_storage::Database;
    use tempfile::TempDir;

    async fn scheduler() -> (Scheduler, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (Scheduler::new(db, Duration::from_secs(60)), dir)
    }

    fn schedule_input(when: TriggerSpec, description: &str) -> ToolInput {
        ToolInput::ScheduleTask(ScheduleTaskInput {
            when,
            description: description.to_string(),
        })
    }

    #[tokio::test]
    async fn delayed_schedule_list_cancel_list() {
        let (scheduler, _dir) = scheduler().await;
        let ctx = ToolContext::new("conv-a");
        let schedule = ScheduleTaskTool::new(scheduler.clone());
        let list = ListScheduledTasksTool::new(scheduler.clone());
        let cancel = CancelScheduledTaskTool::new(scheduler.clone());

        let out = schedule
            .invoke(&ctx, schedule_input(TriggerSpec::delayed(3600), "water the plants"))
            .await
            .unwrap();
        assert!(out.content.contains("after 3600s"), "{}", out.content);

        let tasks = scheduler.list("conv-a").await.unwrap();
        assert_eq!(tasks.len(), 1);
        let id = tasks[0].id.clone();

        let out = list.invoke(&ctx, ToolInput::ListScheduledTasks).await.unwrap();
        assert!(out.content.contains(&id));
        assert!(out.content.contains("water the plants"));

        let out = cancel
            .invoke(
                &ctx,
                ToolInput::CancelScheduledTask(CancelTaskInput { id: id.clone() }),
            )
            .await
            .unwrap();
        assert_eq!(out.content, format!("Task {id} cancelled."));

        let out = list.invoke(&ctx, ToolInput::ListScheduledTasks).await.unwrap();
        assert_eq!(out.content, NO_TASKS);
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn tasks_are_scoped_to_the_conversation() {
        let (scheduler, _dir) = scheduler().await;
        ScheduleTaskTool::new(scheduler.clone())
            .invoke(
                &ToolContext::new("owner"),
                schedule_input(TriggerSpec::cron("0 9 * * *"), "morning report"),
            )
            .await
            .unwrap();
        let id = scheduler.list("owner").await.unwrap()[0].id.clone();

        let stranger = ToolContext::new("stranger");
        let out = ListScheduledTasksTool::new(scheduler.clone())
            .invoke(&stranger, ToolInput::ListScheduledTasks)
            .await
            .unwrap();
        assert_eq!(out.content, NO_TASKS);

        let out = CancelScheduledTaskTool::new(scheduler.clone())
            .invoke(
                &stranger,
                ToolInput::CancelScheduledTask(CancelTaskInput { id: id.clone() }),
            )
            .await
            .unwrap();
        assert_eq!(out.content, format!("Task {id} not found."));
        assert_eq!(scheduler.list("owner").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_trigger_type_is_validation_error() {
        let (scheduler, _dir) = scheduler().await;
        let when = TriggerSpec {
            kind: "someday".to_string(),
            date: None,
            delay_in_seconds: None,
            cron: None,
        };
        let err = ScheduleTaskTool::new(scheduler)
            .invoke(&ToolContext::new("c"), schedule_input(when, "maybe"))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("someday"));
    }
}
