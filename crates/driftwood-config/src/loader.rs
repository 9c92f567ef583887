// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-based layered loading.
//!
//! Merge order, later overriding earlier:
//! 1. compiled defaults
//! 2. `/etc/driftwood/driftwood.toml`
//! 3. `~/.config/driftwood/driftwood.toml`
//! 4. `./driftwood.toml`
//! 5. `DRIFTWOOD_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DriftwoodConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/driftwood/driftwood.toml";
pub(crate) const LOCAL_CONFIG: &str = "driftwood.toml";

/// Config sections that env keys may address.
const SECTIONS: &[&str] = &[
    "agent",
    "anthropic",
    "storage",
    "bottle",
    "scheduler",
    "gateway",
    "weather",
];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("driftwood").join(LOCAL_CONFIG))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<DriftwoodConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no env.
pub fn load_config_from_str(toml_content: &str) -> Result<DriftwoodConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DriftwoodConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DriftwoodConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DriftwoodConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DriftwoodConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Maps `DRIFTWOOD_GATEWAY_STREAM_BUFFER` to `gateway.stream_buffer`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// field names that contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("DRIFTWOOD_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
