// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Open-Meteo geocoding and forecast client, and the weather tool.
//!
//! Failures of the remote service never escape the tools as errors: they are
//! turned into text the model can relay to the user.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use driftwood_config::model::WeatherConfig;
use driftwood_core::DriftwoodError;
use serde::Deserialize;
use tracing::{debug, warn};

use super::bottle::unexpected;
use crate::kind::{LocationInput, ToolInput, ToolKind};
use crate::tool::{Tool, ToolContext, ToolOutput};

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Place {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Place {
    /// "Lisbon, Portugal", or just the name when no country is known.
    pub fn display_name(&self) -> String {
        match &self.country {
            Some(country) => format!("{}, {country}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Place>,
}

/// Current conditions at a place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Forecast {
    pub utc_offset_seconds: i32,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub current: Option<CurrentConditions>,
    #[serde(default)]
    pub current_units: Option<CurrentUnits>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentConditions {
    pub temperature_2m: f64,
    pub wind_speed_10m: f64,
    pub weather_code: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurrentUnits {
    pub temperature_2m: String,
    pub wind_speed_10m: String,
}

/// HTTP client for the geocoding and forecast endpoints.
pub struct WeatherClient {
    client: reqwest::Client,
    geocoding_url: String,
    forecast_url: String,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, DriftwoodError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DriftwoodError::ExternalService {
                message: format!("failed to build weather HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            geocoding_url: config.geocoding_url.clone(),
            forecast_url: config.forecast_url.clone(),
        })
    }

    /// Best match for a place name, or `None` if nothing matched.
    pub async fn geocode(&self, name: &str) -> Result<Option<Place>, DriftwoodError> {
        let response: GeocodingResponse = self
            .get_json(&self.geocoding_url, &[("name", name), ("count", "1")])
            .await?;
        Ok(response.results.into_iter().next())
    }

    /// Current conditions and UTC offset for a place.
    pub async fn forecast(&self, place: &Place) -> Result<Forecast, DriftwoodError> {
        let latitude = place.latitude.to_string();
        let longitude = place.longitude.to_string();
        self.get_json(
            &self.forecast_url,
            &[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", "temperature_2m,wind_speed_10m,weather_code"),
                ("timezone", "auto"),
            ],
        )
        .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DriftwoodError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| external("request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DriftwoodError::ExternalService {
                message: format!("service returned HTTP {status}"),
                source: None,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| external("unexpected response body", e))
    }
}

fn external(what: &str, e: reqwest::Error) -> DriftwoodError {
    DriftwoodError::ExternalService {
        message: format!("{what}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Plain-language description of a WMO weather interpretation code.
pub fn describe_weather_code(code: u8) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 => "light rain",
        63 => "rain",
        65 => "heavy rain",
        66 | 67 => "freezing rain",
        71 | 73 | 75 => "snow",
        77 => "snow grains",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown conditions",
    }
}

/// Reports current conditions. Requires user confirmation.
pub struct GetWeatherInformationTool {
    client: Arc<WeatherClient>,
}

impl GetWeatherInformationTool {
    pub fn new(client: Arc<WeatherClient>) -> Self {
        Self { client }
    }

    async fn lookup(&self, location: &str) -> Result<ToolOutput, DriftwoodError> {
        let Some(place) = self.client.geocode(location).await? else {
            return Ok(ToolOutput::ok(format!("No place named \"{location}\" was found.")));
        };
        let forecast = self.client.forecast(&place).await?;
        let Some(current) = forecast.current else {
            return Ok(ToolOutput::ok(format!(
                "No current weather is available for {}.",
                place.display_name()
            )));
        };
        let (temp_unit, wind_unit) = forecast
            .current_units
            .map(|u| (u.temperature_2m, u.wind_speed_10m))
            .unwrap_or_else(|| ("°C".to_string(), "km/h".to_string()));

        Ok(ToolOutput::ok(format!(
            "Current weather in {}: {}, {}{temp_unit}, wind {} {wind_unit}.",
            place.display_name(),
            describe_weather_code(current.weather_code),
            current.temperature_2m,
            current.wind_speed_10m,
        )))
    }
}

#[async_trait]
impl Tool for GetWeatherInformationTool {
    fn kind(&self) -> ToolKind {
        ToolKind::GetWeatherInformation
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError> {
        let LocationInput { location } = match input {
            ToolInput::GetWeatherInformation(input) => input,
            other => return Err(unexpected(self.kind(), &other)),
        };
        debug!(conversation_id = %ctx.conversation_id, location = %location, "weather lookup");

        match self.lookup(&location).await {
            Ok(output) => Ok(output),
            Err(DriftwoodError::ExternalService { message, .. }) => {
                warn!(location = %location, error = %message, "weather service failed");
                Ok(ToolOutput::error(format!(
                    "Could not get the weather for \"{location}\": {message}"
                )))
            }
            Err(e) => Err(e),
        }
    }
}
