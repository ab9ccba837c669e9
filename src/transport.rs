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

use std::fmt::Display;
use async_trait::async_trait;
use thiserror::Error;

/// Enum used by all transports to report delivery errors
/// Keep it generic: the tracker never treats one transport type in a
/// special fashion
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Network connectivity issue
    #[error("connection issue: {0}")]
    Connectivity(String),

    /// The service took the request and refused the payload
    #[error("payload rejected: {0}")]
    Rejected(String),
}

/// Convenience type: delivery result
pub type TransportResult = Result<(), TransportError>;

/// The Transport trait, all delivery backends implement this
///
/// chani ships no HTTP client of its own: bring whichever stack you
/// already depend on, wrap it in this trait and hand it to the
/// tracker's configuration. Bodies are base64-encoded JSON, endpoints
/// are the service's path names ("track").
#[async_trait]
pub trait Transport: Display + Send + Sync {
    /// Posts an encoded payload to a named endpoint
    async fn post(&self, endpoint: &str, body: &str) -> TransportResult;
}

/// Does nothing, needs nothing
pub struct Blackhole {}

impl Display for Blackhole {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
        f.write_str("blackhole")
    }
}

#[async_trait]
impl Transport for Blackhole {
    /// Does nothing, successfully
    async fn post(&self, _endpoint: &str, _body: &str) -> TransportResult {
        Ok(())
    }
}
