// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools for the Driftwood agent.

pub mod bottle;
pub mod schedule;
pub mod time;
pub mod weather;

pub use bottle::{RetrieveBottleTool, ThrowBottleTool};
pub use schedule::{CancelScheduledTaskTool, ListScheduledTasksTool, ScheduleTaskTool};
pub use time::GetLocalTimeTool;
pub use weather::{GetWeatherInformationTool, WeatherClient};

use std::sync::Arc;

use driftwood_core::DriftwoodError;
use driftwood_cron::Scheduler;
use driftwood_storage::BottleStore;

use crate::{ConfirmationExecutors, ToolRegistry};

/// Services the built-in tools run against.
#[derive(Clone)]
pub struct BuiltinDeps {
    pub bottles: BottleStore,
    pub scheduler: Scheduler,
    pub weather: Arc<WeatherClient>,
}

/// Registers every built-in tool, routing confirmation tools to `executors`.
pub fn register_builtins(
    registry: &mut ToolRegistry,
    executors: &mut ConfirmationExecutors,
    deps: BuiltinDeps,
) -> Result<(), DriftwoodError> {
    registry.register_auto(Arc::new(ThrowBottleTool::new(deps.bottles.clone())))?;
    registry.register_auto(Arc::new(RetrieveBottleTool::new(deps.bottles)))?;
    registry.register_auto(Arc::new(ScheduleTaskTool::new(deps.scheduler.clone())))?;
    registry.register_auto(Arc::new(ListScheduledTasksTool::new(deps.scheduler.clone())))?;
    registry.register_auto(Arc::new(CancelScheduledTaskTool::new(deps.scheduler)))?;
    registry.register_auto(Arc::new(GetLocalTimeTool::new(deps.weather.clone())))?;
    registry.register_confirmation(
        Arc::new(GetWeatherInformationTool::new(deps.weather)),
        executors,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolClass;
    use driftwood_config::model::WeatherConfig;
    use driftwood_storage::Database;
    use std::time::Duration;
    use strum::IntoEnumIterator;
    use tempfile::TempDir;

    use crate::kind::ToolKind;

    #[tokio::test]
    async fn registers_every_tool_kind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("builtins.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let deps = BuiltinDeps {
            bottles: BottleStore::new(db.clone(), "default", 100),
            scheduler: Scheduler::new(db, Duration::from_secs(60)),
            weather: Arc::new(WeatherClient::new(&WeatherConfig::default()).unwrap()),
        };

        let mut registry = ToolRegistry::new();
        let mut executors = ConfirmationExecutors::new();
        register_builtins(&mut registry, &mut executors, deps).unwrap();

        assert_eq!(registry.len(), ToolKind::iter().count());
        for kind in ToolKind::iter() {
            let expected = if kind.requires_confirmation() {
                ToolClass::ConfirmationRequired
            } else {
                ToolClass::AutoExecute
            };
            assert_eq!(registry.classify(kind.name()), expected, "{kind}");
        }
        assert!(executors.contains("get_weather_information"));
    }
}
