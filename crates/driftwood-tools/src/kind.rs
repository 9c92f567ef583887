// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The closed set of tool names and their typed inputs.

use driftwood_core::DriftwoodError;
use driftwood_cron::TriggerSpec;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// Every tool the model can call. Names outside this set are rejected.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum ToolKind {
    ThrowBottle,
    RetrieveBottle,
    ScheduleTask,
    ListScheduledTasks,
    CancelScheduledTask,
    GetLocalTime,
    GetWeatherInformation,
}

impl ToolKind {
    /// Look up a kind by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Whether a human must approve each call before it runs.
    pub fn requires_confirmation(self) -> bool {
        matches!(self, ToolKind::GetWeatherInformation)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ThrowBottle => {
                "Throw a message in a bottle into the sea. A stranger may find it later."
            }
            ToolKind::RetrieveBottle => {
                "Fish a random message in a bottle out of the sea. The bottle is removed once found."
            }
            ToolKind::ScheduleTask => {
                "Schedule a task to run later: at a date (type \"scheduled\"), after a delay \
                 in seconds (type \"delayed\"), or on a cron schedule (type \"cron\")."
            }
            ToolKind::ListScheduledTasks => "List the tasks scheduled in this conversation.",
            ToolKind::CancelScheduledTask => "Cancel a scheduled task by its id.",
            ToolKind::GetLocalTime => "Get the current local time at a place.",
            ToolKind::GetWeatherInformation => {
                "Get the current weather at a place. Requires the user's approval."
            }
        }
    }

    /// JSON Schema of this kind's input, inlined for the model backend.
    pub fn input_schema(self) -> serde_json::Value {
        match self {
            ToolKind::ThrowBottle => schema_of::<ThrowBottleInput>(),
            ToolKind::RetrieveBottle | ToolKind::ListScheduledTasks => schema_of::<NoInput>(),
            ToolKind::ScheduleTask => schema_of::<ScheduleTaskInput>(),
            ToolKind::CancelScheduledTask => schema_of::<CancelTaskInput>(),
            ToolKind::GetLocalTime | ToolKind::GetWeatherInformation => {
                schema_of::<LocationInput>()
            }
        }
    }
}

fn schema_of<T: JsonSchema>() -> serde_json::Value {
    let generator = schemars::generate::SchemaSettings::draft2020_12()
        .with(|s| s.inline_subschemas = true)
        .into_generator();
    let mut schema = generator.into_root_schema_for::<T>().to_value();
    if let Some(obj) = schema.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    schema
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ThrowBottleInput {
    /// The message to put in the bottle.
    pub message: String,
}

/// Input of tools that take no arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoInput {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScheduleTaskInput {
    /// When the task runs.
    pub when: TriggerSpec,
    /// What to do when the task runs.
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CancelTaskInput {
    /// Id returned when the task was scheduled.
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LocationInput {
    /// A place name, such as "Lisbon" or "Kyoto, Japan".
    pub location: String,
}

/// A validated tool input.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInput {
    ThrowBottle(ThrowBottleInput),
    RetrieveBottle,
    ScheduleTask(ScheduleTaskInput),
    ListScheduledTasks,
    CancelScheduledTask(CancelTaskInput),
    GetLocalTime(LocationInput),
    GetWeatherInformation(LocationInput),
}

impl ToolInput {
    /// Deserialize the model's JSON arguments for `kind`.
    pub fn parse(kind: ToolKind, raw: serde_json::Value) -> Result<Self, DriftwoodError> {
        // Models sometimes send null for argument-less tools.
        let raw = if raw.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            raw
        };

        Ok(match kind {
            ToolKind::ThrowBottle => ToolInput::ThrowBottle(decode(kind, raw)?),
            ToolKind::RetrieveBottle => {
                decode::<NoInput>(kind, raw)?;
                ToolInput::RetrieveBottle
            }
            ToolKind::ScheduleTask => ToolInput::ScheduleTask(decode(kind, raw)?),
            ToolKind::ListScheduledTasks => {
                decode::<NoInput>(kind, raw)?;
                ToolInput::ListScheduledTasks
            }
            ToolKind::CancelScheduledTask => ToolInput::CancelScheduledTask(decode(kind, raw)?),
            ToolKind::GetLocalTime => ToolInput::GetLocalTime(decode(kind, raw)?),
            ToolKind::GetWeatherInformation => {
                ToolInput::GetWeatherInformation(decode(kind, raw)?)
            }
        })
    }

    pub fn kind(&self) -> ToolKind {
        match self {
            ToolInput::ThrowBottle(_) => ToolKind::ThrowBottle,
            ToolInput::RetrieveBottle => ToolKind::RetrieveBottle,
            ToolInput::ScheduleTask(_) => ToolKind::ScheduleTask,
            ToolInput::ListScheduledTasks => ToolKind::ListScheduledTasks,
            ToolInput::CancelScheduledTask(_) => ToolKind::CancelScheduledTask,
            ToolInput::GetLocalTime(_) => ToolKind::GetLocalTime,
            ToolInput::GetWeatherInformation(_) => ToolKind::GetWeatherInformation,
        }
    }
}

fn decode<T: DeserializeOwned>(kind: ToolKind, raw: serde_json::Value) -> Result<T, DriftwoodError> {
    serde_json::from_value(raw)
        .map_err(|e| DriftwoodError::Validation(format!("invalid input for `{kind}`: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn names_are_snake_case() {
        assert_eq!(ToolKind::ThrowBottle.name(), "throw_bottle");
        assert_eq!(ToolKind::GetWeatherInformation.to_string(), "get_weather_information");
        assert_eq!(
            ToolKind::from_name("list_scheduled_tasks"),
            Some(ToolKind::ListScheduledTasks)
        );
        assert_eq!(ToolKind::from_name("rm_rf"), None);
    }

    #[test]
    fn only_weather_requires_confirmation() {
        let confirm: Vec<_> = ToolKind::iter().filter(|k| k.requires_confirmation()).collect();
        assert_eq!(confirm, vec![ToolKind::GetWeatherInformation]);
    }

    #[test]
    fn schemas_are_objects() {
        for kind in ToolKind::iter() {
            let schema = kind.input_schema();
            assert_eq!(schema["type"], "object", "{kind} schema: {schema}");
            assert!(schema.get("$schema").is_none());
        }
    }

    #[test]
    fn schedule_schema_inlines_trigger() {
        let schema = ToolKind::ScheduleTask.input_schema();
        let when = &schema["properties"]["when"];
        assert!(when["properties"]["type"].is_object(), "schema: {schema}");
        assert!(when["properties"]["delayInSeconds"].is_object());
        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "description"));
    }

    #[test]
    fn parse_typed_inputs() {
        let input = ToolInput::parse(ToolKind::ThrowBottle, json!({"message": "ahoy"})).unwrap();
        assert_eq!(
            input,
            ToolInput::ThrowBottle(ThrowBottleInput {
                message: "ahoy".into()
            })
        );

        let input = ToolInput::parse(
            ToolKind::ScheduleTask,
            json!({"when": {"type": "delayed", "delayInSeconds": 5}, "description": "stretch"}),
        )
        .unwrap();
        assert_eq!(input.kind(), ToolKind::ScheduleTask);
    }

    #[test]
    fn argument_less_tools_accept_null_and_empty() {
        assert_eq!(
            ToolInput::parse(ToolKind::RetrieveBottle, serde_json::Value::Null).unwrap(),
            ToolInput::RetrieveBottle
        );
        assert_eq!(
            ToolInput::parse(ToolKind::ListScheduledTasks, json!({})).unwrap(),
            ToolInput::ListScheduledTasks
        );
    }

    #[test]
    fn bad_inputs_are_validation_errors() {
        let err = ToolInput::parse(ToolKind::ThrowBottle, json!({})).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("throw_bottle"));

        let err = ToolInput::parse(ToolKind::GetLocalTime, json!({"location": 5})).unwrap_err();
        assert!(err.is_validation());

        let err =
            ToolInput::parse(ToolKind::RetrieveBottle, json!({"unexpected": true})).unwrap_err();
        assert!(err.is_validation());
    }
}
