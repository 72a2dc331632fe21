//! Property keys, the tagged union of property values and the typed accessor trait

use super::v1::{CompositeV1, DefaultsV1, FeaturesV1, NetworkV1, NodesV1, StateV1};
use super::v2::{DefaultsV2, NetworkV2};
use safescale_utils::scerr::Result;
use std::fmt;

/// Key of a property, one per schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    /// Tenants
    CompositeV1,
    /// Default sizing, masters and nodes
    DefaultsV1,
    /// Default sizing, gateways included
    DefaultsV2,
    /// Masters and nodes
    NodesV1,
    /// Installed and disabled features
    FeaturesV1,
    /// Last known state
    StateV1,
    /// Network, single gateway
    NetworkV1,
    /// Network with failover
    NetworkV2,
}

impl PropertyKey {
    /// Every known key
    pub const ALL: [PropertyKey; 8] = [
        PropertyKey::CompositeV1,
        PropertyKey::DefaultsV1,
        PropertyKey::DefaultsV2,
        PropertyKey::NodesV1,
        PropertyKey::FeaturesV1,
        PropertyKey::StateV1,
        PropertyKey::NetworkV1,
        PropertyKey::NetworkV2,
    ];

    /// Tag used in persisted records
    pub fn tag(&self) -> &'static str {
        match self {
            PropertyKey::CompositeV1 => "composite.v1",
            PropertyKey::DefaultsV1 => "defaults.v1",
            PropertyKey::DefaultsV2 => "defaults.v2",
            PropertyKey::NodesV1 => "nodes.v1",
            PropertyKey::FeaturesV1 => "features.v1",
            PropertyKey::StateV1 => "state.v1",
            PropertyKey::NetworkV1 => "network.v1",
            PropertyKey::NetworkV2 => "network.v2",
        }
    }

    /// Key of a persisted tag, `None` when unknown
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.tag() == tag)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Value of a property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Tenants
    CompositeV1(CompositeV1),
    /// Default sizing, masters and nodes
    DefaultsV1(DefaultsV1),
    /// Default sizing, gateways included
    DefaultsV2(DefaultsV2),
    /// Masters and nodes
    NodesV1(NodesV1),
    /// Installed and disabled features
    FeaturesV1(FeaturesV1),
    /// Last known state
    StateV1(StateV1),
    /// Network, single gateway
    NetworkV1(NetworkV1),
    /// Network with failover
    NetworkV2(NetworkV2),
}

impl PropertyValue {
    /// Key this value is stored under
    pub fn key(&self) -> PropertyKey {
        match self {
            PropertyValue::CompositeV1(_) => PropertyKey::CompositeV1,
            PropertyValue::DefaultsV1(_) => PropertyKey::DefaultsV1,
            PropertyValue::DefaultsV2(_) => PropertyKey::DefaultsV2,
            PropertyValue::NodesV1(_) => PropertyKey::NodesV1,
            PropertyValue::FeaturesV1(_) => PropertyKey::FeaturesV1,
            PropertyValue::StateV1(_) => PropertyKey::StateV1,
            PropertyValue::NetworkV1(_) => PropertyKey::NetworkV1,
            PropertyValue::NetworkV2(_) => PropertyKey::NetworkV2,
        }
    }

    /// JSON content of the value
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let json = match self {
            PropertyValue::CompositeV1(v) => serde_json::to_value(v)?,
            PropertyValue::DefaultsV1(v) => serde_json::to_value(v)?,
            PropertyValue::DefaultsV2(v) => serde_json::to_value(v)?,
            PropertyValue::NodesV1(v) => serde_json::to_value(v)?,
            PropertyValue::FeaturesV1(v) => serde_json::to_value(v)?,
            PropertyValue::StateV1(v) => serde_json::to_value(v)?,
            PropertyValue::NetworkV1(v) => serde_json::to_value(v)?,
            PropertyValue::NetworkV2(v) => serde_json::to_value(v)?,
        };
        Ok(json)
    }

    /// Decode the JSON content stored under `key`
    pub fn from_json(key: PropertyKey, json: serde_json::Value) -> Result<Self> {
        let value = match key {
            PropertyKey::CompositeV1 => PropertyValue::CompositeV1(serde_json::from_value(json)?),
            PropertyKey::DefaultsV1 => PropertyValue::DefaultsV1(serde_json::from_value(json)?),
            PropertyKey::DefaultsV2 => PropertyValue::DefaultsV2(serde_json::from_value(json)?),
            PropertyKey::NodesV1 => PropertyValue::NodesV1(serde_json::from_value(json)?),
            PropertyKey::FeaturesV1 => PropertyValue::FeaturesV1(serde_json::from_value(json)?),
            PropertyKey::StateV1 => PropertyValue::StateV1(serde_json::from_value(json)?),
            PropertyKey::NetworkV1 => PropertyValue::NetworkV1(serde_json::from_value(json)?),
            PropertyKey::NetworkV2 => PropertyValue::NetworkV2(serde_json::from_value(json)?),
        };
        Ok(value)
    }
}

/// Typed access to one variant of [`PropertyValue`]
pub trait Property: Clone + Default + Send + Sync + 'static {
    /// Key the property is stored under
    const KEY: PropertyKey;

    /// Wrap into the tagged union
    fn into_value(self) -> PropertyValue;

    /// Borrow from the tagged union, `None` on a variant mismatch
    fn from_value(value: &PropertyValue) -> Option<&Self>;
}

macro_rules! property {
    ($variant:ident) => {
        impl Property for $variant {
            const KEY: PropertyKey = PropertyKey::$variant;

            fn into_value(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }

            fn from_value(value: &PropertyValue) -> Option<&Self> {
                match value {
                    PropertyValue::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

property!(CompositeV1);
property!(DefaultsV1);
property!(DefaultsV2);
property!(NodesV1);
property!(FeaturesV1);
property!(StateV1);
property!(NetworkV1);
property!(NetworkV2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for key in PropertyKey::ALL {
            assert_eq!(PropertyKey::from_tag(key.tag()), Some(key));
        }
        assert_eq!(PropertyKey::from_tag("nodes.v9"), None);
    }

    #[test]
    fn test_variant_matches_key() {
        let value = NodesV1::default().into_value();
        assert_eq!(value.key(), NodesV1::KEY);
        assert!(StateV1::from_value(&value).is_none());
        assert!(NodesV1::from_value(&value).is_some());
    }
}
