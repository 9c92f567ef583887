// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait, registry, and the confirmation executor map.
//!
//! The [`ToolRegistry`] is the catalog the model sees and the only path for
//! running auto-execute tools. Confirmation-required tools are listed in the
//! catalog but executed exclusively through [`ConfirmationExecutors`], which
//! only the transcript resolver holds.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use driftwood_core::DriftwoodError;
use serde::{Deserialize, Serialize};

use crate::kind::{ToolInput, ToolKind};

/// Output from a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub content: String,
    /// Set when the text describes a failure the model should see.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Per-call context passed to every tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    /// Conversation that issued the call.
    pub conversation_id: String,
}

impl ToolContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
        }
    }
}

/// A tool implementation.
///
/// `invoke` receives input already validated against the tool's kind.
#[async_trait]
pub trait Tool: Send + Sync {
    fn kind(&self) -> ToolKind;

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError>;
}

/// How the orchestrator must treat a call to a given name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    AutoExecute,
    ConfirmationRequired,
    Unknown,
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub kind: ToolKind,
    pub description: &'static str,
    pub input_schema: serde_json::Value,
    pub requires_confirmation: bool,
}

impl ToolDefinition {
    fn for_kind(kind: ToolKind) -> Self {
        Self {
            kind,
            description: kind.description(),
            input_schema: kind.input_schema(),
            requires_confirmation: kind.requires_confirmation(),
        }
    }
}

/// Catalog of available tools plus the invocation path for auto tools.
#[derive(Default)]
pub struct ToolRegistry {
    definitions: BTreeMap<ToolKind, ToolDefinition>,
    auto: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an auto-execute tool.
    pub fn register_auto(&mut self, tool: Arc<dyn Tool>) -> Result<(), DriftwoodError> {
        let kind = tool.kind();
        if kind.requires_confirmation() {
            return Err(DriftwoodError::Internal(format!(
                "`{kind}` requires confirmation and cannot be registered as auto-execute"
            )));
        }
        self.definitions.insert(kind, ToolDefinition::for_kind(kind));
        self.auto.insert(kind, tool);
        Ok(())
    }

    /// List a confirmation-required tool and hand its executor to `executors`.
    pub fn register_confirmation(
        &mut self,
        tool: Arc<dyn Tool>,
        executors: &mut ConfirmationExecutors,
    ) -> Result<(), DriftwoodError> {
        let kind = tool.kind();
        if !kind.requires_confirmation() {
            return Err(DriftwoodError::Internal(format!(
                "`{kind}` does not require confirmation"
            )));
        }
        self.definitions.insert(kind, ToolDefinition::for_kind(kind));
        executors.insert(tool);
        Ok(())
    }

    /// Classify a tool name coming from the model.
    pub fn classify(&self, name: &str) -> ToolClass {
        match ToolKind::from_name(name).and_then(|k| self.definitions.get(&k)) {
            Some(def) if def.requires_confirmation => ToolClass::ConfirmationRequired,
            Some(_) => ToolClass::AutoExecute,
            None => ToolClass::Unknown,
        }
    }

    pub fn schema(&self, name: &str) -> Option<&serde_json::Value> {
        let kind = ToolKind::from_name(name)?;
        self.definitions.get(&kind).map(|d| &d.input_schema)
    }

    /// Validate raw model input for a registered tool of either class.
    pub fn validate(
        &self,
        name: &str,
        input: serde_json::Value,
    ) -> Result<ToolInput, DriftwoodError> {
        let kind = self.registered_kind(name)?;
        ToolInput::parse(kind, input)
    }

    /// Run an auto-execute tool.
    ///
    /// Unknown names, confirmation-required tools and malformed input are
    /// validation errors.
    pub async fn invoke(
        &self,
        ctx: &ToolContext,
        name: &str,
        input: serde_json::Value,
    ) -> Result<ToolOutput, DriftwoodError> {
        let kind = self.registered_kind(name)?;
        let tool = self.auto.get(&kind).ok_or_else(|| {
            DriftwoodError::Validation(format!(
                "`{name}` requires user confirmation and cannot be invoked directly"
            ))
        })?;
        let input = ToolInput::parse(kind, input)?;
        tool.invoke(ctx, input).await
    }

    /// Provider-format definitions, sorted by name.
    pub fn tool_definitions(&self) -> Vec<serde_json::Value> {
        let mut defs: Vec<_> = self
            .definitions
            .values()
            .map(|d| {
                serde_json::json!({
                    "name": d.kind.name(),
                    "description": d.description,
                    "input_schema": d.input_schema,
                })
            })
            .collect();
        defs.sort_by(|a, b| {
            a["name"]
                .as_str()
                .unwrap_or("")
                .cmp(b["name"].as_str().unwrap_or(""))
        });
        defs
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn registered_kind(&self, name: &str) -> Result<ToolKind, DriftwoodError> {
        ToolKind::from_name(name)
            .filter(|k| self.definitions.contains_key(k))
            .ok_or_else(|| DriftwoodError::Validation(format!("unknown tool `{name}`")))
    }
}

/// Execution functions for confirmation-required tools, run after approval.
#[derive(Default, Clone)]
pub struct ConfirmationExecutors {
    tools: HashMap<ToolKind, Arc<dyn Tool>>,
}

impl ConfirmationExecutors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    pub fn contains(&self, name: &str) -> bool {
        ToolKind::from_name(name).is_some_and(|k| self.tools.contains_key(&k))
    }

    /// Execute an approved call with its recorded input.
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        name: &str,
        input: serde_json::Value,
    ) -> Result<ToolOutput, DriftwoodError> {
        let (kind, tool) = ToolKind::from_name(name)
            .and_then(|k| self.tools.get(&k).map(|t| (k, t)))
            .ok_or_else(|| {
                DriftwoodError::Validation(format!("no confirmation executor for `{name}`"))
            })?;
        let input = ToolInput::parse(kind, input)?;
        tool.invoke(ctx, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::ThrowBottleInput;
    use serde_json::json;

    /// Echoes bottle messages back without storing them.
    struct EchoBottle;

    #[async_trait]
    impl Tool for EchoBottle {
        fn kind(&self) -> ToolKind {
            ToolKind::ThrowBottle
        }

        async fn invoke(
            &self,
            ctx: &ToolContext,
            input: ToolInput,
        ) -> Result<ToolOutput, DriftwoodError> {
            match input {
                ToolInput::ThrowBottle(ThrowBottleInput { message }) => {
                    Ok(ToolOutput::ok(format!("{}: {message}", ctx.conversation_id)))
                }
                other => Err(DriftwoodError::Internal(format!("unexpected {other:?}"))),
            }
        }
    }

    struct FakeWeather;

    #[async_trait]
    impl Tool for FakeWeather {
        fn kind(&self) -> ToolKind {
            ToolKind::GetWeatherInformation
        }

        async fn invoke(
            &self,
            _ctx: &ToolContext,
            _input: ToolInput,
        ) -> Result<ToolOutput, DriftwoodError> {
            Ok(ToolOutput::ok("sunny"))
        }
    }

    fn registry() -> (ToolRegistry, ConfirmationExecutors) {
        let mut registry = ToolRegistry::new();
        let mut executors = ConfirmationExecutors::new();
        registry.register_auto(Arc::new(EchoBottle)).unwrap();
        registry
            .register_confirmation(Arc::new(FakeWeather), &mut executors)
            .unwrap();
        (registry, executors)
    }

    #[test]
    fn classify_by_name() {
        let (registry, _) = registry();
        assert_eq!(registry.classify("throw_bottle"), ToolClass::AutoExecute);
        assert_eq!(
            registry.classify("get_weather_information"),
            ToolClass::ConfirmationRequired
        );
        assert_eq!(registry.classify("retrieve_bottle"), ToolClass::Unknown);
        assert_eq!(registry.classify("launch_missiles"), ToolClass::Unknown);
    }

    #[test]
    fn wrong_class_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        let mut executors = ConfirmationExecutors::new();
        assert!(registry.register_auto(Arc::new(FakeWeather)).is_err());
        assert!(
            registry
                .register_confirmation(Arc::new(EchoBottle), &mut executors)
                .is_err()
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn schema_lookup() {
        let (registry, _) = registry();
        let schema = registry.schema("throw_bottle").unwrap();
        assert!(schema["properties"]["message"].is_object());
        assert!(registry.schema("retrieve_bottle").is_none());
    }

    #[tokio::test]
    async fn invoke_runs_auto_tools_with_context() {
        let (registry, _) = registry();
        let ctx = ToolContext::new("conv-9");
        let out = registry
            .invoke(&ctx, "throw_bottle", json!({"message": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, ToolOutput::ok("conv-9: hi"));
    }

    #[tokio::test]
    async fn invoke_refuses_confirmation_tools() {
        let (registry, executors) = registry();
        let ctx = ToolContext::new("c");
        let err = registry
            .invoke(&ctx, "get_weather_information", json!({"location": "Oslo"}))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let out = executors
            .execute(&ctx, "get_weather_information", json!({"location": "Oslo"}))
            .await
            .unwrap();
        assert_eq!(out.content, "sunny");
    }

    #[tokio::test]
    async fn invoke_rejects_unknown_and_malformed() {
        let (registry, _) = registry();
        let ctx = ToolContext::new("c");
        assert!(
            registry
                .invoke(&ctx, "nope", json!({}))
                .await
                .unwrap_err()
                .is_validation()
        );
        assert!(
            registry
                .invoke(&ctx, "throw_bottle", json!({"msg": "typo"}))
                .await
                .unwrap_err()
                .is_validation()
        );
    }

    #[test]
    fn validate_covers_both_classes() {
        let (registry, _) = registry();
        assert!(registry.validate("get_weather_information", json!({"location": "Rome"})).is_ok());
        assert!(registry.validate("get_weather_information", json!({})).is_err());
        assert!(registry.validate("unknown", json!({})).is_err());
    }

    #[test]
    fn tool_definitions_sorted_provider_format() {
        let (registry, executors) = registry();
        let defs = registry.tool_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0]["name"], "get_weather_information");
        assert_eq!(defs[1]["name"], "throw_bottle");
        assert_eq!(defs[1]["input_schema"]["type"], "object");
        assert!(defs[0]["description"].as_str().unwrap().contains("approval"));
        assert!(executors.contains("get_weather_information"));
        assert!(!executors.contains("throw_bottle"));
    }
}
