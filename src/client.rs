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

use crate::builder::{BuildError, BuildResult, Payload, TrackBuilder};
use crate::config::{self, TrackerConfig};
use crate::properties::PropertySource;
use crate::value;

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde_json;
use log;

/// Weight of properties extracted from the caller's properties object
const PROPERTIES_WEIGHT: i32 = 1;
/// Weight of directly-supplied parameters, always wins over the object
const PARAMETERS_WEIGHT: i32 = 2;

/// Endpoint name for track payloads
const TRACK_ENDPOINT: &str = "track";
/// Maximum number of payloads sent per batch request
const MAX_BATCH_SIZE: usize = 50;

/// The staged outcome of a track dry run, see Tracker::check_track
#[derive(Debug, Clone)]
pub enum TrackCheck {
    /// All stages passed, this is what would have been posted
    Ready {
        payload: Payload,
        json: String,
        base64: String,
    },
    /// The payload could not be assembled
    InvalidPayload(BuildError),
    /// The payload was assembled but the serialiser failed on it
    SerializationFailed {
        payload: Payload,
        error: String,
    },
}

/// A tracking client bound to one project token
pub struct Tracker {
    token: String,
    config: Option<TrackerConfig>,
}

impl Tracker {
    /// Creates a tracker for a project token, which can't be empty
    /// Pass None as configuration to rely on the global one
    pub fn new(token: &str, config: Option<TrackerConfig>) -> Result<Tracker, BuildError> {
        match token.trim().is_empty() {
            true => Err(BuildError::NullOrEmpty("token")),
            false => Ok(Tracker { token: token.to_string(), config })
        }
    }

    /// Builds a track payload from a properties object and the
    /// directly-supplied special parameters
    ///
    /// Direct parameters always beat same-named entries found in the
    /// properties object; parameters left to None leave those entries
    /// alone instead of masking them.
    pub fn build_track_payload(
        &self,
        event: &str,
        props: Option<&dyn PropertySource>,
        distinct_id: Option<serde_json::Value>,
        ip: Option<&str>,
        time: Option<DateTime<Utc>>) -> BuildResult {
        let mut builder = TrackBuilder::new();

        if let Some(props) = props {
            for (name, property) in props.properties() {
                builder.add_weighted(&name, property.value, PROPERTIES_WEIGHT);
            }
        }

        builder.add_weighted("event", event, PARAMETERS_WEIGHT);
        builder.add_weighted("token", self.token.as_str(), PARAMETERS_WEIGHT);
        if let Some(distinct_id) = distinct_id {
            builder.add_weighted("distinct_id", distinct_id, PARAMETERS_WEIGHT);
        }
        if let Some(ip) = ip {
            builder.add_weighted("ip", ip, PARAMETERS_WEIGHT);
        }
        if let Some(time) = time {
            builder.add_weighted("time", time.format(value::TIME_FORMAT).to_string(), PARAMETERS_WEIGHT);
        }

        builder.build()
    }

    /// Tracks an event, reporting the outcome as a boolean
    ///
    /// Every failure is logged and absorbed: the caller's flow should
    /// never depend on tracking working out
    pub async fn track(
        &self,
        event: &str,
        props: Option<&dyn PropertySource>,
        distinct_id: Option<serde_json::Value>,
        ip: Option<&str>,
        time: Option<DateTime<Utc>>) -> bool {
        let payload = match self.build_track_payload(event, props, distinct_id, ip, time) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("failed to build track payload: {}", e);
                return false;
            }
        };

        let json = match config::serialize_json_fn(&self.config)(&payload) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("failed to serialise track payload: {}", e);
                return false;
            }
        };

        self.post(TRACK_ENDPOINT, &Self::to_base64(&json)).await
    }

    /// Runs every track stage without posting anything, reporting how
    /// far the payload made it and what it looked like at each stage
    pub fn check_track(
        &self,
        event: &str,
        props: Option<&dyn PropertySource>,
        distinct_id: Option<serde_json::Value>,
        ip: Option<&str>,
        time: Option<DateTime<Utc>>) -> TrackCheck {
        let payload = match self.build_track_payload(event, props, distinct_id, ip, time) {
            Ok(payload) => payload,
            Err(e) => return TrackCheck::InvalidPayload(e),
        };

        let json = match config::serialize_json_fn(&self.config)(&payload) {
            Ok(json) => json,
            Err(error) => return TrackCheck::SerializationFailed { payload, error },
        };

        let base64 = Self::to_base64(&json);
        TrackCheck::Ready { payload, json, base64 }
    }

    /// Sends prebuilt payloads as batch requests of up to 50 payloads
    /// Returns true only when every chunk went through
    pub async fn send_batch(&self, payloads: &[Payload]) -> bool {
        let serialize = config::serialize_json_fn(&self.config);
        let mut all_sent = true;

        for chunk in payloads.chunks(MAX_BATCH_SIZE) {
            let mut items: Vec<String> = vec!();
            for payload in chunk.iter() {
                match serialize(payload) {
                    Ok(json) => items.push(json),
                    Err(e) => {
                        log::warn!("failed to serialise payload in batch, skipping it: {}", e);
                        all_sent = false;
                    }
                }
            }

            let json = format!("[{}]", items.join(","));
            if !(self.post(TRACK_ENDPOINT, &Self::to_base64(&json)).await) {
                all_sent = false;
            }
        }

        all_sent
    }

    /// Posts a body through the configured transport
    async fn post(&self, endpoint: &str, body: &str) -> bool {
        let transport = match config::transport(&self.config) {
            Some(transport) => transport,
            None => {
                log::warn!("no transport configured, dropping payload");
                return false;
            }
        };

        match transport.post(endpoint, body).await {
            Ok(()) => {
                log::debug!("posted payload to {} via {}", endpoint, transport);
                true
            },
            Err(e) => {
                log::warn!("failed to post payload to {} via {}: {}", endpoint, transport, e);
                false
            }
        }
    }

    /// Encodes a JSON body the way the wire expects it
    fn to_base64(json: &str) -> String {
        general_purpose::STANDARD.encode(json)
    }
}
