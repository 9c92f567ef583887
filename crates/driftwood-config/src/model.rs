// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so misspelled keys fail at
//! startup instead of being silently ignored.

use serde::{Deserialize, Serialize};

/// Top-level Driftwood configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DriftwoodConfig {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub anthropic: AnthropicConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Bounded message-in-a-bottle store.
    #[serde(default)]
    pub bottle: BottleConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// HTTP/SSE transport.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Geocoding and forecast endpoints used by the time and weather tools.
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Agent identity and turn behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system prompt. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Maximum model round-trips per incoming turn.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
            max_steps: default_max_steps(),
        }
    }
}

fn default_agent_name() -> String {
    "driftwood".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_steps() -> u32 {
    10
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Falls back to `ANTHROPIC_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: default_model(),
            max_tokens: default_max_tokens(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("driftwood").join("driftwood.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("driftwood.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BottleConfig {
    /// Maximum number of bottles held at once.
    #[serde(default = "default_bottle_capacity")]
    pub capacity: u32,

    /// Logical store name; stores with different keys share a table but not entries.
    #[serde(default = "default_store_key")]
    pub store_key: String,
}

impl Default for BottleConfig {
    fn default() -> Self {
        Self {
            capacity: default_bottle_capacity(),
            store_key: default_store_key(),
        }
    }
}

fn default_bottle_capacity() -> u32 {
    100
}

fn default_store_key() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Longest the firing loop sleeps without re-checking for due tasks.
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_idle_secs: default_max_idle_secs(),
        }
    }
}

fn default_max_idle_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Capacity of the per-turn event channel feeding each SSE response.
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_stream_buffer() -> usize {
    64
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherConfig {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    /// Per-request timeout for both endpoints.
    #[serde(default = "default_weather_timeout")]
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            timeout_secs: default_weather_timeout(),
        }
    }
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".to_string()
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_weather_timeout() -> u64 {
    10
}
