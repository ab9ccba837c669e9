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

use crate::properties::{ExtractedProperties, ExtractedProperty, NameOrigin};

use lazy_static::lazy_static;
use serde_json;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A field declaration for a trackable record type
///
/// The markers mirror the usual serialisation vocabulary: a rename
/// specific to tracking, a generic wire-contract name, an explicit
/// member marker and an ignore marker.
pub struct FieldSpec<T> {
    /// The field's own name in the record
    name: &'static str,
    /// Tracking-specific rename, wins over everything else
    rename: Option<&'static str>,
    /// Generic wire-contract name, wins over the field name
    contract_name: Option<&'static str>,
    /// Explicit-inclusion marker, required under a member contract
    member: bool,
    /// Exclusion marker, beats every other marker
    ignored: bool,
    /// Reads the field's value off a record
    read: fn(&T) -> serde_json::Value,
}

impl<T> FieldSpec<T> {
    /// Declares a field under its own name
    pub fn new(name: &'static str, read: fn(&T) -> serde_json::Value) -> Self {
        Self {
            name,
            rename: None,
            contract_name: None,
            member: false,
            ignored: false,
            read,
        }
    }

    /// Renames the field for tracking purposes
    pub fn rename(mut self, name: &'static str) -> Self {
        self.rename = Some(name);
        self
    }

    /// Gives the field a generic wire-contract name
    pub fn contract_name(mut self, name: &'static str) -> Self {
        self.contract_name = Some(name);
        self
    }

    /// Marks the field as an explicit contract member
    pub fn member(mut self) -> Self {
        self.member = true;
        self
    }

    /// Excludes the field from tracking, whatever its other markers say
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }
}

/// Record types declare their trackable fields through this trait
///
/// Implementors usually also forward PropertySource::properties to
/// record::extract, which makes the type usable anywhere a properties
/// object is expected.
pub trait TrackRecord: 'static {
    /// When true, only fields carrying the member marker are extracted
    const MEMBER_CONTRACT: bool = false;

    /// The record's field declarations
    fn fields() -> Vec<FieldSpec<Self>> where Self: Sized;
}

/// A field declaration after the naming pipeline has run
struct PropertyDescriptor<T> {
    /// The final, externally visible property name
    name: &'static str,
    /// Which naming rule picked it
    origin: NameOrigin,
    /// Reads the field's value off a record
    read: fn(&T) -> serde_json::Value,
}

lazy_static! {
    /// Process-wide descriptor lists, keyed by record type
    static ref DESCRIPTORS: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>> = RwLock::new(HashMap::new());
}

/// Runs the naming pipeline over a type's field declarations
fn resolve<T: TrackRecord>() -> Vec<PropertyDescriptor<T>> {
    let mut descriptors = vec!();

    for spec in T::fields() {
        if spec.ignored || (T::MEMBER_CONTRACT && !spec.member) {
            continue;
        }

        /* A rename wins over the contract name, but an empty rename
         * falls back to the field's own name without consulting it */
        let (name, origin) = match spec.rename {
            Some(rename) => match rename.trim().is_empty() {
                true => (spec.name, NameOrigin::Default),
                false => (rename, NameOrigin::Renamed),
            },
            None => match spec.contract_name {
                Some(contract) => match contract.trim().is_empty() {
                    true => (spec.name, NameOrigin::Default),
                    false => (contract, NameOrigin::Contract),
                },
                None => (spec.name, NameOrigin::Default)
            }
        };

        descriptors.push(PropertyDescriptor { name, origin, read: spec.read });
    }

    descriptors
}

/// Fetches a type's resolved descriptors, computing them on first use
///
/// Two threads racing on the same type both resolve it: that's fine,
/// resolution is pure, the first insert wins and the duplicate work is
/// discarded. Readers only ever see fully built lists.
fn descriptors<T: TrackRecord>() -> Arc<Vec<PropertyDescriptor<T>>> {
    let type_id = TypeId::of::<T>();

    let cached = DESCRIPTORS.read().expect("descriptor cache lock poisoned")
        .get(&type_id).map(|descriptors| descriptors.clone());

    let untyped = match cached {
        Some(descriptors) => descriptors,
        None => {
            /* Resolve outside the lock: only the insertion needs it */
            let resolved: Arc<Vec<PropertyDescriptor<T>>> = Arc::new(resolve::<T>());
            let mut cache = DESCRIPTORS.write().expect("descriptor cache lock poisoned");
            cache.entry(type_id).or_insert(resolved).clone()
        }
    };

    match untyped.downcast::<Vec<PropertyDescriptor<T>>>() {
        Ok(descriptors) => descriptors,
        Err(_) => panic!("descriptor cache entry does not match its record type")
    }
}

/// Extracts a record's properties by reading every cached descriptor
pub fn extract<T: TrackRecord>(record: &T) -> ExtractedProperties {
    descriptors::<T>().iter()
        .map(|descriptor| (
            descriptor.name.to_string(),
            ExtractedProperty::new(descriptor.origin, (descriptor.read)(record))
        ))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Character {
        first_name: String,
        last_name: String,
    }

    impl TrackRecord for Character {
        fn fields() -> Vec<FieldSpec<Self>> {
            vec!(
                FieldSpec::new("FirstName", |c: &Character| serde_json::json!(c.first_name)),
                FieldSpec::new("LastName", |c: &Character| serde_json::json!(c.last_name)).rename("last_name"),
            )
        }
    }

    fn vader() -> Character {
        Character {
            first_name: "Darth".to_string(),
            last_name: "Vader".to_string(),
        }
    }

    #[test]
    fn test_extract_reads_fields() {
        let props = extract(&vader());
        assert_eq!(props.len(), 2);
        assert_eq!(props["FirstName"].value, serde_json::json!("Darth"));
        assert_eq!(props["FirstName"].origin, NameOrigin::Default);
        assert_eq!(props["last_name"].value, serde_json::json!("Vader"));
        assert_eq!(props["last_name"].origin, NameOrigin::Renamed);
    }

    #[test]
    fn test_descriptors_are_resolved_once() {
        let first = descriptors::<Character>();
        let second = descriptors::<Character>();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_first_extraction() {
        struct Solo {
            name: String,
        }

        impl TrackRecord for Solo {
            fn fields() -> Vec<FieldSpec<Self>> {
                vec!(FieldSpec::new("Name", |s: &Solo| serde_json::json!(s.name)))
            }
        }

        let handles: Vec<_> = (0..8).map(|_| {
            std::thread::spawn(|| {
                let record = Solo { name: "Han".to_string() };
                extract(&record)
            })
        }).collect();

        for handle in handles {
            let props = handle.join().expect("extraction thread panicked");
            assert_eq!(props["Name"].value, serde_json::json!("Han"));
        }
    }
}
