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

use crate::value;

use serde::{Deserialize, Serialize};
use serde_json;
use std::collections::HashMap;
use thiserror::Error;
use log;

/// Enum for everything that can fail when assembling a payload
/// Anything not in here is absorbed silently: unparseable values are
/// dropped, malformed timestamps are omitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A required special property was never supplied
    #[error("'{0}' property is not set")]
    NotSet(&'static str),

    /// A required special property is null, empty or whitespace
    #[error("'{0}' property can't be null or empty")]
    NullOrEmpty(&'static str),

    /// A required special property holds the wrong type
    #[error("'{0}' property should be of type string")]
    WrongType(&'static str),
}

/// Convenience type: build result (the payload or why there is none)
pub type BuildResult = Result<Payload, BuildError>;

/// The five reserved tracking properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SpecialProperty {
    Event,
    Token,
    DistinctId,
    Ip,
    Time,
}

impl SpecialProperty {
    /// Looks a lowercased property name up in the alias table
    fn bind(name: &str) -> Option<SpecialProperty> {
        match name {
            "event" => Some(SpecialProperty::Event),
            "token" => Some(SpecialProperty::Token),
            "distinct_id" | "distinctid" => Some(SpecialProperty::DistinctId),
            "ip" => Some(SpecialProperty::Ip),
            "time" => Some(SpecialProperty::Time),
            _ => None
        }
    }
}

/// A special value waiting for build time, with its priority
struct PendingValue {
    value: serde_json::Value,
    weight: i32,
}

/// Assembles one track payload: add properties, then build once
pub struct TrackBuilder {
    special: HashMap<SpecialProperty, PendingValue>,
    other: HashMap<String, serde_json::Value>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self {
            special: HashMap::new(),
            other: HashMap::new(),
        }
    }

    /// Adds a property at the default weight
    pub fn add<T: Serialize>(&mut self, name: &str, value: T) {
        self.add_weighted(name, value, 1);
    }

    /// Adds a property, using the weight to resolve special conflicts
    ///
    /// Names are matched case-insensitively against the reserved
    /// properties (event, token, distinct_id/distinctid, ip, time). A
    /// reserved property only replaces an earlier value when its
    /// weight is strictly greater: ties keep the earlier value. Other
    /// properties keep their literal name, last write wins.
    pub fn add_weighted<T: Serialize>(&mut self, name: &str, value: T, weight: i32) {
        let parsed = match value::parse(value) {
            Some(parsed) => parsed,
            None => {
                log::debug!("property has no JSON representation, dropping: {}", name);
                return;
            }
        };

        match SpecialProperty::bind(&name.to_lowercase()) {
            Some(special) => {
                let outweighed = self.special.get(&special).map(|pending| weight > pending.weight);
                if outweighed.unwrap_or(true) {
                    self.special.insert(special, PendingValue { value: parsed, weight });
                }
            },
            None => {
                self.other.insert(name.to_string(), parsed);
            }
        }
    }

    /// Assembles the payload, consuming the builder
    pub fn build(mut self) -> BuildResult {
        let event = Self::required_string(self.special.remove(&SpecialProperty::Event), "event")?;
        let token = Self::required_string(self.special.remove(&SpecialProperty::Token), "token")?;

        let distinct_id = self.special.remove(&SpecialProperty::DistinctId)
            .map(|pending| value::json_to_string(&pending.value)).flatten();
        let ip = self.special.remove(&SpecialProperty::Ip)
            .map(|pending| value::json_to_string(&pending.value)).flatten();

        /* A timestamp which does not parse drops the field, it never fails the build */
        let time = self.special.remove(&SpecialProperty::Time)
            .map(|pending| value::json_to_string(&pending.value)).flatten()
            .map(|repr| value::epoch_seconds(&repr)).flatten();

        Ok(Payload {
            event,
            properties: PayloadProperties {
                token,
                distinct_id,
                ip,
                time,
                custom: self.other,
            }
        })
    }

    /// Validates a required string property (event, token)
    fn required_string(pending: Option<PendingValue>, name: &'static str) -> Result<String, BuildError> {
        let pending = pending.ok_or(BuildError::NotSet(name))?;
        match pending.value {
            serde_json::Value::Null => Err(BuildError::NullOrEmpty(name)),
            serde_json::Value::String(s) => match s.trim().is_empty() {
                true => Err(BuildError::NullOrEmpty(name)),
                false => Ok(s)
            },
            _ => Err(BuildError::WrongType(name))
        }
    }
}

/// A wire-ready track payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Payload {
    pub event: String,
    pub properties: PayloadProperties,
}

/// The properties block of a track payload: the reserved fields,
/// then everything else flattened alongside them
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PayloadProperties {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(flatten)]
    pub custom: HashMap<String, serde_json::Value>,
}
