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

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json;

/// The timestamp format expected by the Mixpanel API, always read as UTC
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses any serialisable value into a wire-ready JSON value
///
/// Returns None when the value has no JSON representation (maps with
/// non-scalar keys, integers out of JSON range). Datetimes reach us in
/// their serialised RFC 3339 form: those strings are rewritten using
/// TIME_FORMAT so the builder can recognise them later.
pub fn parse<T: Serialize>(value: T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok().map(normalise)
}

/// Rewrites RFC 3339 strings to fixed-format UTC, recursing into collections
fn normalise(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(datetime) => serde_json::Value::String(datetime.with_timezone(&Utc).format(TIME_FORMAT).to_string()),
            Err(_) => serde_json::Value::String(s),
        },
        serde_json::Value::Array(values) => serde_json::Value::Array(
            values.into_iter().map(normalise).collect()
        ),
        serde_json::Value::Object(entries) => serde_json::Value::Object(
            entries.into_iter().map(|(key, entry)| (key, normalise(entry))).collect()
        ),
        v => v,
    }
}

/// Convert any JSON value to a string for the special properties
pub fn json_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        v => Some(v.to_string())
    }
}

/// Parses a fixed-format timestamp as UTC and converts it to Unix seconds
pub fn epoch_seconds(repr: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(repr, TIME_FORMAT).ok()
        .map(|naive| naive.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse("Tatooine"), Some(serde_json::json!("Tatooine")));
        assert_eq!(parse(3), Some(serde_json::json!(3)));
        assert_eq!(parse(4.5), Some(serde_json::json!(4.5)));
        assert_eq!(parse(true), Some(serde_json::json!(true)));
        assert_eq!(parse(Option::<String>::None), Some(serde_json::Value::Null));
    }

    #[test]
    fn test_parse_accepts_scalar_keys() {
        /* serde_json stringifies numeric map keys */
        let map = HashMap::from([(2, "val2")]);
        assert_eq!(parse(map), Some(serde_json::json!({"2": "val2"})));
    }

    #[test]
    fn test_parse_rejects_non_scalar_keys() {
        let map = HashMap::from([((1, 2), "val")]);
        assert_eq!(parse(map), None);
    }

    #[test]
    fn test_parse_normalises_datetimes() {
        let datetime = Utc.with_ymd_and_hms(2013, 11, 30, 0, 0, 0).unwrap();
        assert_eq!(parse(datetime), Some(serde_json::json!("2013-11-30T00:00:00")));
    }

    #[test]
    fn test_parse_normalises_offsets_to_utc() {
        let datetime = DateTime::parse_from_rfc3339("2013-11-30T02:00:00+02:00").unwrap();
        assert_eq!(parse(datetime), Some(serde_json::json!("2013-11-30T00:00:00")));
    }

    #[test]
    fn test_parse_normalises_recursively() {
        let datetime = Utc.with_ymd_and_hms(2014, 10, 22, 0, 0, 0).unwrap();
        let nested = serde_json::json!({"created": datetime, "tags": [datetime, "plain"]});
        assert_eq!(
            parse(nested),
            Some(serde_json::json!({"created": "2014-10-22T00:00:00", "tags": ["2014-10-22T00:00:00", "plain"]}))
        );
    }

    #[test]
    fn test_parse_leaves_fixed_format_strings_alone() {
        /* no offset, so this is not valid RFC 3339: it passes through as-is */
        assert_eq!(parse("2013-11-30T00:00:00"), Some(serde_json::json!("2013-11-30T00:00:00")));
    }

    #[test]
    fn test_json_to_string() {
        assert_eq!(json_to_string(&serde_json::json!("456")), Some("456".to_string()));
        assert_eq!(json_to_string(&serde_json::json!(456)), Some("456".to_string()));
        assert_eq!(json_to_string(&serde_json::json!(true)), Some("true".to_string()));
        assert_eq!(json_to_string(&serde_json::Value::Null), None);
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(epoch_seconds("2013-11-30T00:00:00"), Some(1385769600));
        assert_eq!(epoch_seconds("not-a-date"), None);
        assert_eq!(epoch_seconds("2013-11-30"), None);
    }
}
