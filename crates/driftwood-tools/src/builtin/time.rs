// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local time lookup through the forecast endpoint's UTC offset.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use driftwood_core::DriftwoodError;
use tracing::warn;

use super::bottle::unexpected;
use super::weather::{Place, WeatherClient};
use crate::kind::{LocationInput, ToolInput, ToolKind};
use crate::tool::{Tool, ToolContext, ToolOutput};

pub struct GetLocalTimeTool {
    client: Arc<WeatherClient>,
}

impl GetLocalTimeTool {
    pub fn new(client: Arc<WeatherClient>) -> Self {
        Self { client }
    }

    async fn lookup(&self, location: &str) -> Result<ToolOutput, DriftwoodError> {
        let Some(place) = self.client.geocode(location).await? else {
            return Ok(ToolOutput::ok(format!("No place named \"{location}\" was found.")));
        };
        let forecast = self.client.forecast(&place).await?;
        let timezone = forecast.timezone.or_else(|| place.timezone.clone());
        Ok(ToolOutput::ok(format_local_time(
            &place,
            timezone.as_deref(),
            forecast.utc_offset_seconds,
            Utc::now(),
        )?))
    }
}

/// Render `now` at a fixed UTC offset for a place.
pub fn format_local_time(
    place: &Place,
    timezone: Option<&str>,
    utc_offset_seconds: i32,
    now: DateTime<Utc>,
) -> Result<String, DriftwoodError> {
    let offset = FixedOffset::east_opt(utc_offset_seconds).ok_or_else(|| {
        DriftwoodError::ExternalService {
            message: format!("invalid UTC offset {utc_offset_seconds}s"),
            source: None,
        }
    })?;
    let local = now.with_timezone(&offset);
    let zone = timezone.map(|tz| format!(" ({tz})")).unwrap_or_default();
    Ok(format!(
        "The local time in {} is {}{zone}.",
        place.display_name(),
        local.format("%H:%M on %A, %-d %B %Y, UTC%:z")
    ))
}

#[async_trait]
impl Tool for GetLocalTimeTool {
    fn kind(&self) -> ToolKind {
        ToolKind::GetLocalTime
    }

    async fn invoke(
        &self,
        _ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError> {
        let LocationInput { location } = match input {
            ToolInput::GetLocalTime(input) => input,
            other => return Err(unexpected(self.kind(), &other)),
        };

        match self.lookup(&location).await {
            Ok(output) => Ok(output),
            Err(DriftwoodError::ExternalService { message, .. }) => {
                warn!(location = %location, error = %message, "time lookup failed");
                Ok(ToolOutput::error(format!(
                    "Could not get the local time for \"{location}\": {message}"
                )))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::weather::tests::{client_for, mount_lisbon};
    use chrono::TimeZone;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn place() -> Place {
        Place {
            name: "Lisbon".to_string(),
            latitude: 38.72,
            longitude: -9.13,
            country: Some("Portugal".to_string()),
            timezone: Some("Europe/Lisbon".to_string()),
        }
    }

    #[test]
    fn formats_with_offset() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 30, 0).unwrap();
        let text = format_local_time(&place(), Some("Europe/Lisbon"), 3600, now).unwrap();
        assert_eq!(
            text,
            "The local time in Lisbon, Portugal is 13:30 on Monday, 1 June 2026, UTC+01:00 (Europe/Lisbon)."
        );
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let now = Utc::now();
        assert!(format_local_time(&place(), None, 100_000, now).is_err());
    }

    #[tokio::test]
    async fn tool_uses_forecast_offset() {
        let server = MockServer::start().await;
        mount_lisbon(&server).await;

        let out = GetLocalTimeTool::new(client_for(&server))
            .invoke(
                &ToolContext::new("c"),
                ToolInput::GetLocalTime(LocationInput {
                    location: "Lisbon".to_string(),
                }),
            )
            .await
            .unwrap();
        assert!(!out.is_error);
        assert!(out.content.starts_with("The local time in Lisbon, Portugal is "));
        assert!(out.content.contains("UTC+01:00 (Europe/Lisbon)"));
    }

    #[tokio::test]
    async fn transport_failure_is_error_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let out = GetLocalTimeTool::new(client_for(&server))
            .invoke(
                &ToolContext::new("c"),
                ToolInput::GetLocalTime(LocationInput {
                    location: "Lisbon".to_string(),
                }),
            )
            .await
            .unwrap();
        assert!(out.is_error);
    }
}
