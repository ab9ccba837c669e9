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

use serde::Serialize;
use serde_json;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Which rule picked a property's final name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOrigin {
    /// The field or key's own name
    Default,
    /// A chani-specific rename
    Renamed,
    /// A generic wire-contract name
    Contract,
}

/// One property pulled out of a caller-supplied object
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedProperty {
    /// Which naming rule produced the final name
    pub origin: NameOrigin,
    /// The property's value, converted to JSON
    pub value: serde_json::Value,
}

impl ExtractedProperty {
    pub fn new(origin: NameOrigin, value: serde_json::Value) -> Self {
        Self { origin, value }
    }
}

/// Convenience type: extraction result, keyed by resolved property name
pub type ExtractedProperties = HashMap<String, ExtractedProperty>;

/// Anything implementing this can serve as a properties object
///
/// Maps with serialisable keys and values, serde_json maps and values
/// are covered out of the box. Record types get an implementation by
/// declaring their fields through the TrackRecord trait and forwarding
/// this method to record::extract.
pub trait PropertySource {
    /// Returns the object's properties, keyed by resolved name
    fn properties(&self) -> ExtractedProperties;
}

/// Serialises a map key, keeping it only when it turns into a JSON string
fn key_to_name<K: Serialize>(key: &K) -> Option<String> {
    serde_json::to_value(key).ok().map(|k| match k {
        serde_json::Value::String(name) => Some(name),
        _ => None
    }).flatten()
}

impl<K: Serialize, V: Serialize, S: BuildHasher> PropertySource for HashMap<K, V, S> {
    /// Copies string-keyed entries through and skips all others
    fn properties(&self) -> ExtractedProperties {
        let mut props = ExtractedProperties::new();
        for (key, entry) in self.iter() {
            if let (Some(name), Some(value)) = (key_to_name(key), serde_json::to_value(entry).ok()) {
                props.insert(name, ExtractedProperty::new(NameOrigin::Default, value));
            }
        }
        props
    }
}

impl<K: Serialize, V: Serialize> PropertySource for BTreeMap<K, V> {
    /// Copies string-keyed entries through and skips all others
    fn properties(&self) -> ExtractedProperties {
        let mut props = ExtractedProperties::new();
        for (key, entry) in self.iter() {
            if let (Some(name), Some(value)) = (key_to_name(key), serde_json::to_value(entry).ok()) {
                props.insert(name, ExtractedProperty::new(NameOrigin::Default, value));
            }
        }
        props
    }
}

impl PropertySource for serde_json::Map<String, serde_json::Value> {
    /// Entries are copied through verbatim
    fn properties(&self) -> ExtractedProperties {
        self.iter()
            .map(|(name, value)| (name.clone(), ExtractedProperty::new(NameOrigin::Default, value.clone())))
            .collect()
    }
}

impl PropertySource for serde_json::Value {
    /// Objects extract entry by entry, anything else has no named fields
    fn properties(&self) -> ExtractedProperties {
        match self {
            serde_json::Value::Object(entries) => entries.properties(),
            _ => ExtractedProperties::new()
        }
    }
}

impl<P: PropertySource> PropertySource for Option<P> {
    /// None extracts to an empty mapping
    fn properties(&self) -> ExtractedProperties {
        match self {
            Some(source) => source.properties(),
            None => ExtractedProperties::new()
        }
    }
}
