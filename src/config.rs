/* chani - a lightweight, no-fuss client for the Mixpanel tracking API
 * Copyright (C) 2023 Withings
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>. */

use crate::builder::Payload;
use crate::transport::Transport;

use lazy_static::lazy_static;
use serde_json;
use std::sync::{Arc, RwLock};

/// Convenience type: pluggable payload serialiser
pub type SerializeJsonFn = Arc<dyn Fn(&Payload) -> Result<String, String> + Send + Sync>;

/// Tracker configuration
/// Fields left unset fall back to the process-wide global
/// configuration, then to the built-in defaults
#[derive(Clone, Default)]
pub struct TrackerConfig {
    /// Swaps the JSON serialisation backend
    pub serialize_json: Option<SerializeJsonFn>,
    /// The delivery backend (there is no default: without one, every
    /// delivery fails with a logged warning)
    pub transport: Option<Arc<dyn Transport>>,
}

lazy_static! {
    /// Process-wide fallback configuration
    static ref GLOBAL: RwLock<TrackerConfig> = RwLock::new(TrackerConfig::default());
}

/// Replaces the global fallback configuration
pub fn set_global(config: TrackerConfig) {
    *GLOBAL.write().expect("global configuration lock poisoned") = config;
}

/// Resets the global fallback configuration to its defaults
pub fn reset_global() {
    set_global(TrackerConfig::default());
}

/// Resolves the serialiser: instance, then global, then serde_json
pub fn serialize_json_fn(config: &Option<TrackerConfig>) -> SerializeJsonFn {
    config.as_ref().map(|config| config.serialize_json.clone()).flatten()
        .or_else(|| GLOBAL.read().expect("global configuration lock poisoned").serialize_json.clone())
        .unwrap_or_else(|| Arc::new(default_serialize_json))
}

/// Resolves the transport: instance, then global, nothing otherwise
pub fn transport(config: &Option<TrackerConfig>) -> Option<Arc<dyn Transport>> {
    config.as_ref().map(|config| config.transport.clone()).flatten()
        .or_else(|| GLOBAL.read().expect("global configuration lock poisoned").transport.clone())
}

/// Default serialiser: serde_json compact encoding
fn default_serialize_json(payload: &Payload) -> Result<String, String> {
    serde_json::to_string(payload).map_err(|e| e.to_string())
}
