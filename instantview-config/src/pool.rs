// Copyright 2025 The NativeLink Authors. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use core::time::Duration;

use instantview_error::{Error, ResultExt, error_if};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::serde_utils::{
    convert_numeric_with_shellexpand, convert_optional_string_with_shellexpand,
};

const fn default_pool_size() -> usize {
    3
}

const fn default_cleanup_on_return() -> bool {
    true
}

const fn default_warm_up_timeout_ms() -> u64 {
    5000
}

const fn default_cleanup_grace_delay_ms() -> u64 {
    100
}

/// Configuration of a fixed-size pool of browser surfaces.
///
/// The configuration is fixed once the pool has been initialized. Every field
/// has a default, so partial documents like `{ pool_size: 2 }` are valid.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of instances created when the pool is initialized. Must be at
    /// least one.
    ///
    /// Default: 3
    #[serde(
        default = "default_pool_size",
        deserialize_with = "convert_numeric_with_shellexpand"
    )]
    pub pool_size: usize,

    /// When true, a released instance passes through the cleaning phase
    /// (cleanup script, then a grace delay) before it can be borrowed again.
    /// When false it becomes idle immediately.
    ///
    /// Default: true
    #[serde(default = "default_cleanup_on_return")]
    pub cleanup_on_return: bool,

    /// Script injected into a surface when it enters the cleaning phase.
    /// When unset the built-in script is used, which resets scrolling,
    /// clears pending timers and wipes the document body.
    ///
    /// Default: None
    #[serde(default, deserialize_with = "convert_optional_string_with_shellexpand")]
    pub custom_cleanup_script: Option<String>,

    /// Content properties applied to every borrowed surface. Properties
    /// supplied by the borrower take precedence over these.
    ///
    /// Default: {}
    #[serde(default)]
    pub default_content_props: Map<String, Value>,

    /// How long a warmed instance waits to be claimed by a borrow before it
    /// is returned to the pool.
    ///
    /// Default: 5000
    #[serde(
        default = "default_warm_up_timeout_ms",
        deserialize_with = "convert_numeric_with_shellexpand"
    )]
    pub warm_up_timeout_ms: u64,

    /// Delay between injecting the cleanup script and marking the instance
    /// idle again.
    ///
    /// Default: 100
    #[serde(
        default = "default_cleanup_grace_delay_ms",
        deserialize_with = "convert_numeric_with_shellexpand"
    )]
    pub cleanup_grace_delay_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            cleanup_on_return: default_cleanup_on_return(),
            custom_cleanup_script: None,
            default_content_props: Map::new(),
            warm_up_timeout_ms: default_warm_up_timeout_ms(),
            cleanup_grace_delay_ms: default_cleanup_grace_delay_ms(),
        }
    }
}

impl PoolConfig {
    /// Parses a JSON5 document.
    pub fn try_from_json5_str(contents: &str) -> Result<Self, Error> {
        let config: Self =
            serde_json5::from_str(contents).err_tip(|| "while parsing pool config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON5 file.
    pub fn try_from_json5_file(config_file: &str) -> Result<Self, Error> {
        let json_contents = std::fs::read_to_string(config_file)
            .err_tip(|| format!("Could not open config file {config_file}"))?;
        Self::try_from_json5_str(&json_contents)
            .err_tip(|| format!("in config file {config_file}"))
    }

    pub fn validate(&self) -> Result<(), Error> {
        error_if!(
            self.pool_size == 0,
            "pool_size must be at least 1, got {}",
            self.pool_size
        );
        Ok(())
    }

    pub const fn warm_up_timeout(&self) -> Duration {
        Duration::from_millis(self.warm_up_timeout_ms)
    }

    pub const fn cleanup_grace_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_delay_ms)
    }
}
