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

//! chani, a lightweight, no-fuss client for the Mixpanel tracking API
//!
//! The crate turns arbitrary property objects (maps, JSON values, or
//! record types declaring their own schema) plus the five reserved
//! tracking fields (event, token, distinct_id, ip, time) into
//! validated, wire-ready payloads. Serialisation and delivery stay
//! pluggable: chani provides a serde_json default and the [`Transport`]
//! trait, but deliberately ships no HTTP client of its own.
//!
//! ```no_run
//! use chani::{Blackhole, Tracker, TrackerConfig};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = TrackerConfig {
//!         transport: Some(Arc::new(Blackhole {})),
//!         ..TrackerConfig::default()
//!     };
//!
//!     let tracker = Tracker::new("1234", Some(config)).unwrap();
//!     let props = HashMap::from([("Color", "Red")]);
//!     tracker.track("Purchase", Some(&props), Some("456".into()), None, None).await;
//! }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod properties;
pub mod record;
pub mod transport;
pub mod value;

pub use crate::builder::{BuildError, BuildResult, Payload, PayloadProperties, TrackBuilder};
pub use crate::client::{TrackCheck, Tracker};
pub use crate::config::{reset_global, set_global, SerializeJsonFn, TrackerConfig};
pub use crate::properties::{ExtractedProperties, ExtractedProperty, NameOrigin, PropertySource};
pub use crate::record::{FieldSpec, TrackRecord};
pub use crate::transport::{Blackhole, Transport, TransportError, TransportResult};
