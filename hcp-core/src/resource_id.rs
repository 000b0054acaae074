//! ARM-style resource identifiers.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt::{self, Debug, Display},
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("resource id {0:?} does not start with /subscriptions/")]
    MissingSubscriptionPrefix(String),
    #[error("resource id {0:?} has a dangling type segment without a name")]
    UnpairedSegment(String),
    #[error("resource id {0:?} contains an empty path segment")]
    EmptySegment(String),
    #[error("resource id {0:?} contains a reserved character")]
    ReservedCharacter(String),
}

/// A fully qualified ARM resource id.
///
/// Slash-separated path starting with `/subscriptions/<id>`; subsequent
/// segments alternate a type keyword and a name
/// (`/resourceGroups/<name>`, `/providers/<namespace>`, `/<type>/<name>`,
/// nested further for child resources).
///
/// Resource ids compare **case-insensitively**, and hash consistently with
/// that, so they are safe to use as map and queue keys:
///
/// ```
/// use hcp_core::ResourceId;
/// let a: ResourceId = "/subscriptions/sub1/resourceGroups/rg".parse().unwrap();
/// let b: ResourceId = "/Subscriptions/SUB1/resourcegroups/RG".parse().unwrap();
/// assert_eq!(a, b);
/// ```
#[derive(Clone)]
pub struct ResourceId {
    raw: String,
}

impl ResourceId {
    /// The path segments, without the leading empty segment.
    fn segments(&self) -> impl DoubleEndedIterator<Item = &str> + '_ {
        self.raw[1..].split('/')
    }

    /// The document store's primary-key encoding: the lower-cased path with
    /// pipe separators. Prefix scans over this encoding enumerate a
    /// resource's descendants.
    #[must_use]
    pub fn store_key(&self) -> String {
        self.segments()
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join("|")
    }

    /// The subscription id this resource lives under.
    #[must_use]
    pub fn subscription_id(&self) -> &str {
        self.segments().nth(1).unwrap_or("")
    }

    /// The resource group name, if the id is scoped to one.
    #[must_use]
    pub fn resource_group(&self) -> Option<&str> {
        let mut segments = self.segments();
        while let Some(keyword) = segments.next() {
            let value = segments.next();
            if keyword.eq_ignore_ascii_case("resourcegroups") {
                return value;
            }
        }
        None
    }

    /// The type keyword of the final segment pair, e.g. `hcpOpenShiftClusters`.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        self.segments().rev().nth(1).unwrap_or("")
    }

    /// The name of the resource (the final path segment).
    #[must_use]
    pub fn name(&self) -> &str {
        self.segments().next_back().unwrap_or("")
    }

    /// The id one segment pair up, or `None` at the subscription root.
    #[must_use]
    pub fn parent(&self) -> Option<ResourceId> {
        let segments: Vec<&str> = self.segments().collect();
        if segments.len() <= 2 {
            return None;
        }
        let mut raw = String::new();
        for segment in &segments[..segments.len() - 2] {
            raw.push('/');
            raw.push_str(segment);
        }
        Some(ResourceId { raw })
    }

    /// A child id under this resource.
    ///
    /// `kind` and `name` must be plain path segments (no `/`, no `|`); both
    /// always are for the fixed kinds and already-validated names this is
    /// called with.
    #[must_use]
    pub fn child(&self, kind: &str, name: &str) -> ResourceId {
        ResourceId {
            raw: format!("{}/{kind}/{name}", self.raw),
        }
    }

    /// Whether `self` lies strictly below `other` in the hierarchy.
    #[must_use]
    pub fn is_descendant_of(&self, other: &ResourceId) -> bool {
        let prefix = format!("{}|", other.store_key());
        self.store_key().starts_with(&prefix)
    }
}

impl FromStr for ResourceId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(rest) = s.strip_prefix('/') else {
            return Err(ParseError::MissingSubscriptionPrefix(s.to_owned()));
        };
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.len() < 2 || !segments[0].eq_ignore_ascii_case("subscriptions") {
            return Err(ParseError::MissingSubscriptionPrefix(s.to_owned()));
        }
        if segments.len() % 2 != 0 {
            return Err(ParseError::UnpairedSegment(s.to_owned()));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ParseError::EmptySegment(s.to_owned()));
        }
        if segments.iter().any(|segment| segment.contains('|')) {
            return Err(ParseError::ReservedCharacter(s.to_owned()));
        }
        Ok(ResourceId { raw: s.to_owned() })
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({})", self.raw)
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.raw.eq_ignore_ascii_case(&other.raw)
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.raw.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTER: &str =
        "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.RedHatOpenShift/hcpOpenShiftClusters/cluster1";

    #[test]
    fn parses_and_roundtrips() {
        let id: ResourceId = CLUSTER.parse().unwrap();
        assert_eq!(id.to_string(), CLUSTER);
        assert_eq!(id.subscription_id(), "sub1");
        assert_eq!(id.resource_group(), Some("rg1"));
        assert_eq!(id.resource_type(), "hcpOpenShiftClusters");
        assert_eq!(id.name(), "cluster1");
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!("subscriptions/sub1".parse::<ResourceId>().is_err());
        assert!("/resourceGroups/rg1".parse::<ResourceId>().is_err());
        assert!("/subscriptions/sub1/resourceGroups".parse::<ResourceId>().is_err());
        assert!("/subscriptions/sub1//x".parse::<ResourceId>().is_err());
        assert!("/subscriptions/su|b1/a/b".parse::<ResourceId>().is_err());
    }

    #[test]
    fn equality_is_case_insensitive() {
        use std::collections::HashSet;
        let a: ResourceId = CLUSTER.parse().unwrap();
        let b: ResourceId = CLUSTER.to_ascii_uppercase().parse().unwrap();
        assert_eq!(a, b);
        let set: HashSet<ResourceId> = [a].into();
        assert!(set.contains(&b));
    }

    #[test]
    fn store_key_is_lowercased_and_pipe_delimited() {
        let id: ResourceId = "/subscriptions/Sub1/resourceGroups/RG1".parse().unwrap();
        assert_eq!(id.store_key(), "subscriptions|sub1|resourcegroups|rg1");
    }

    #[test]
    fn parent_and_child_navigation() {
        let id: ResourceId = CLUSTER.parse().unwrap();
        let pool = id.child("nodePools", "pool1");
        assert_eq!(pool.name(), "pool1");
        assert_eq!(pool.parent().unwrap(), id);
        assert!(pool.is_descendant_of(&id));
        assert!(!id.is_descendant_of(&pool));
        let sub = id.parent().unwrap().parent().unwrap();
        assert_eq!(sub.to_string(), "/subscriptions/sub1");
        assert!(sub.parent().is_none());
    }

    #[test]
    fn descendant_check_requires_full_segments() {
        let a: ResourceId = "/subscriptions/sub1/things/ab".parse().unwrap();
        let b: ResourceId = "/subscriptions/sub1/things/abc".parse().unwrap();
        assert!(!b.is_descendant_of(&a));
    }

    #[test]
    fn serde_as_string() {
        let id: ResourceId = CLUSTER.parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{CLUSTER}\""));
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<ResourceId>("\"not-an-id\"").is_err());
    }
}
