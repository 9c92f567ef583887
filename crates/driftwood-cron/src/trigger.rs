// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-facing trigger descriptions and next-run computation.

use chrono::{DateTime, NaiveDateTime, Utc};
use driftwood_core::{DriftwoodError, Trigger};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// When a task should run, as supplied by a tool call.
///
/// `type` selects which of the other fields is read:
/// `"scheduled"` reads `date`, `"delayed"` reads `delayInSeconds`,
/// `"cron"` reads `cron`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSpec {
    /// One of "scheduled", "delayed" or "cron".
    #[serde(rename = "type")]
    pub kind: String,
    /// Absolute time, RFC 3339 (`2026-05-01T09:00:00Z`). Naive times are read as UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Seconds from now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_in_seconds: Option<u64>,
    /// Cron expression (`*/10 * * * *`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
}

impl TriggerSpec {
    pub fn delayed(seconds: u64) -> Self {
        Self {
            kind: "delayed".to_string(),
            date: None,
            delay_in_seconds: Some(seconds),
            cron: None,
        }
    }

    pub fn cron(expression: impl Into<String>) -> Self {
        Self {
            kind: "cron".to_string(),
            date: None,
            delay_in_seconds: None,
            cron: Some(expression.into()),
        }
    }
}

impl TryFrom<TriggerSpec> for Trigger {
    type Error = DriftwoodError;

    fn try_from(spec: TriggerSpec) -> Result<Self, Self::Error> {
        match spec.kind.as_str() {
            "scheduled" => {
                let date = spec
                    .date
                    .ok_or_else(|| missing("date", "scheduled"))?;
                Ok(Trigger::At {
                    at: parse_date(&date)?,
                })
            }
            "delayed" => {
                let seconds = spec
                    .delay_in_seconds
                    .ok_or_else(|| missing("delayInSeconds", "delayed"))?;
                Ok(Trigger::After { seconds })
            }
            "cron" => {
                let expression = spec.cron.ok_or_else(|| missing("cron", "cron"))?;
                parse_cron(&expression)?;
                Ok(Trigger::Cron { expression })
            }
            other => Err(DriftwoodError::Validation(format!(
                "unknown trigger type `{other}`; expected one of scheduled, delayed, cron"
            ))),
        }
    }
}

fn missing(field: &str, kind: &str) -> DriftwoodError {
    DriftwoodError::Validation(format!("`{field}` is required for a {kind} trigger"))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, DriftwoodError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|_| DriftwoodError::Validation(format!("`{raw}` is not a valid date")))
}

fn parse_cron(expression: &str) -> Result<croner::Cron, DriftwoodError> {
    expression.parse::<croner::Cron>().map_err(|e| {
        DriftwoodError::Validation(format!("invalid cron expression `{expression}`: {e}"))
    })
}

/// First run time of a newly created task.
pub fn first_run(trigger: &Trigger, now: DateTime<Utc>) -> Result<DateTime<Utc>, DriftwoodError> {
    match trigger {
        Trigger::At { at } => Ok(*at),
        Trigger::After { seconds } => {
            let delay = i64::try_from(*seconds)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .ok_or_else(|| {
                    DriftwoodError::Validation(format!("delay of {seconds}s is too large"))
                })?;
            now.checked_add_signed(delay).ok_or_else(|| {
                DriftwoodError::Validation(format!("delay of {seconds}s is too large"))
            })
        }
        Trigger::Cron { expression } => next_cron_run(expression, now),
    }
}

/// Next occurrence of a cron expression strictly after `after`.
pub fn next_cron_run(
    expression: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, DriftwoodError> {
    parse_cron(expression)?
        .find_next_occurrence(&after, false)
        .map_err(|e| {
            DriftwoodError::Validation(format!(
                "cron expression `{expression}` has no upcoming run: {e}"
            ))
        })
}
