//! Core data structures for map entities

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Tag keys that never make an entity "interesting" on their own.
const UNINTERESTING_KEYS: &[&str] = &["attribution", "created_by", "source", "odbl"];

/// Tags attached to an entity, kept sorted so documents serialize deterministically.
pub type Tags = BTreeMap<String, String>;

/// Discriminates what kind of map feature an entity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Node,
    Way,
    Relation,
}

impl EntityKind {
    /// Single-letter prefix used in textual IDs (`n1`, `w-2`, `r3`).
    pub fn prefix(self) -> char {
        match self {
            EntityKind::Node => 'n',
            EntityKind::Way => 'w',
            EntityKind::Relation => 'r',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'n' => Some(EntityKind::Node),
            'w' => Some(EntityKind::Way),
            'r' => Some(EntityKind::Relation),
            _ => None,
        }
    }
}

/// Errors raised when parsing a textual entity ID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("empty entity id")]
    Empty,
    #[error("unknown entity kind prefix `{0}`")]
    UnknownKind(char),
    #[error("invalid entity number in `{0}`")]
    InvalidNumber(String),
}

/// Unique identifier for an entity: its kind plus a signed number.
///
/// Negative numbers are provisional IDs handed out to entities created
/// during an editing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    pub kind: EntityKind,
    pub number: i64,
}

impl EntityId {
    pub fn new(kind: EntityKind, number: i64) -> Self {
        EntityId { kind, number }
    }

    pub fn node(number: i64) -> Self {
        EntityId::new(EntityKind::Node, number)
    }

    pub fn way(number: i64) -> Self {
        EntityId::new(EntityKind::Way, number)
    }

    pub fn relation(number: i64) -> Self {
        EntityId::new(EntityKind::Relation, number)
    }

    /// True for provisional IDs that were never assigned by an upstream source.
    pub fn is_new(&self) -> bool {
        self.number < 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.number)
    }
}

impl FromStr for EntityId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let prefix = chars.next().ok_or(ParseIdError::Empty)?;
        let kind = EntityKind::from_prefix(prefix).ok_or(ParseIdError::UnknownKind(prefix))?;
        let number = chars
            .as_str()
            .parse::<i64>()
            .map_err(|_| ParseIdError::InvalidNumber(s.to_string()))?;
        Ok(EntityId { kind, number })
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A single immutable map feature.
///
/// Edits never mutate an entity in place; the `update_*` methods return a
/// new value with its `version` bumped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "v", default)]
    pub version: u64,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    /// Child nodes of a way, or members of a relation, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<[f64; 2]>,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Entity {
            id,
            version: 0,
            tags: Tags::new(),
            refs: Vec::new(),
            loc: None,
        }
    }

    pub fn node(id: EntityId, loc: [f64; 2]) -> Self {
        Entity::new(id).with_loc(loc)
    }

    pub fn way(id: EntityId, nodes: impl IntoIterator<Item = EntityId>) -> Self {
        Entity::new(id).with_refs(nodes)
    }

    pub fn relation(id: EntityId, members: impl IntoIterator<Item = EntityId>) -> Self {
        Entity::new(id).with_refs(members)
    }

    /// Builder used while constructing a value; does not bump the version.
    pub fn with_tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags = tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn with_refs(mut self, refs: impl IntoIterator<Item = EntityId>) -> Self {
        self.refs = refs.into_iter().collect();
        self
    }

    pub fn with_loc(mut self, loc: [f64; 2]) -> Self {
        self.loc = Some(loc);
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.id.kind
    }

    /// Identity of this particular value, e.g. `n1v2`.
    pub fn key(&self) -> String {
        format!("{}v{}", self.id, self.version)
    }

    /// Same content with the version bumped, so caches keyed on the value re-derive.
    pub fn touch(&self) -> Entity {
        let mut touched = self.clone();
        touched.version += 1;
        touched
    }

    pub fn update_tags(&self, tags: Tags) -> Entity {
        let mut updated = self.touch();
        updated.tags = tags;
        updated
    }

    pub fn update_refs(&self, refs: Vec<EntityId>) -> Entity {
        let mut updated = self.touch();
        updated.refs = refs;
        updated
    }

    pub fn update_loc(&self, loc: [f64; 2]) -> Entity {
        let mut updated = self.touch();
        updated.loc = Some(loc);
        updated
    }

    /// Compares everything but the version stamp.
    pub fn same_content(&self, other: &Entity) -> bool {
        self.id == other.id && self.tags == other.tags && self.refs == other.refs && self.loc == other.loc
    }

    pub fn has_interesting_tags(&self) -> bool {
        self.tags.keys().any(|key| {
            !UNINTERESTING_KEYS.contains(&key.as_str())
                && !key.starts_with("source:")
                && !key.starts_with("tiger:")
        })
    }

    /// A way whose first and last node coincide.
    pub fn is_closed(&self) -> bool {
        self.kind() == EntityKind::Way && self.refs.len() > 1 && self.refs.first() == self.refs.last()
    }

    pub fn is_multipolygon(&self) -> bool {
        self.kind() == EntityKind::Relation
            && self.tags.get("type").is_some_and(|t| t == "multipolygon")
    }
}

/// Per-kind counters for provisional (negative) IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAllocator {
    pub node: i64,
    pub way: i64,
    pub relation: i64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator { node: -1, way: -1, relation: -1 }
    }

    /// Hand out the next provisional ID for `kind`; counters only ever decrease.
    pub fn next(&mut self, kind: EntityKind) -> EntityId {
        let counter = match kind {
            EntityKind::Node => &mut self.node,
            EntityKind::Way => &mut self.way,
            EntityKind::Relation => &mut self.relation,
        };
        let id = EntityId::new(kind, *counter);
        *counter -= 1;
        id
    }

    /// The ID `next` would return, without consuming it.
    pub fn peek(&self, kind: EntityKind) -> EntityId {
        let number = match kind {
            EntityKind::Node => self.node,
            EntityKind::Way => self.way,
            EntityKind::Relation => self.relation,
        };
        EntityId::new(kind, number)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
