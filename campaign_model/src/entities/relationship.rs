//! Relationships between entities and the unordered endpoint pairs used to
//! compare them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityId;

/// A directed, typed edge between two entities, as stored by the campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub source_entity_id: EntityId,
    pub source_entity_name: String,
    pub target_entity_id: EntityId,
    pub target_entity_name: String,
    pub relationship_type: String,
    #[serde(default)]
    pub description: String,
}

impl Relationship {
    /// Create a relationship between two named entities.
    pub fn new(
        source: (EntityId, impl Into<String>),
        target: (EntityId, impl Into<String>),
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_entity_id: source.0,
            source_entity_name: source.1.into(),
            target_entity_id: target.0,
            target_entity_name: target.1.into(),
            relationship_type: relationship_type.into(),
            description: String::new(),
        }
    }

    /// The unordered endpoint pair of this edge.
    pub fn endpoint_pair(&self) -> EndpointPair {
        EndpointPair::new(
            EndpointKey::Id(self.source_entity_id),
            EndpointKey::Id(self.target_entity_id),
        )
    }

    /// Render as `source -[type]-> target`.
    pub fn to_arrow_string(&self) -> String {
        format!(
            "{} -[{}]-> {}",
            self.source_entity_name, self.relationship_type, self.target_entity_name
        )
    }
}

/// Identity of one end of an edge: a stored id when known, otherwise the
/// lowercased name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EndpointKey {
    Id(EntityId),
    Name(String),
}

impl EndpointKey {
    /// Key by id when present and non-nil, else by normalized name.
    pub fn resolve(id: Option<EntityId>, name: &str) -> Self {
        match id {
            Some(id) if !id.is_nil() => EndpointKey::Id(id),
            _ => EndpointKey::Name(name.trim().to_lowercase()),
        }
    }
}

/// An unordered pair of endpoints; `(a, b)` and `(b, a)` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointPair(EndpointKey, EndpointKey);

impl EndpointPair {
    pub fn new(a: EndpointKey, b: EndpointKey) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    /// Whether both ends are the same entity.
    pub fn is_self_loop(&self) -> bool {
        self.0 == self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_pair_is_unordered() {
        let a = EntityId::new();
        let b = EntityId::new();

        let forward = EndpointPair::new(EndpointKey::Id(a), EndpointKey::Id(b));
        let backward = EndpointPair::new(EndpointKey::Id(b), EndpointKey::Id(a));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_relationship_pair_matches_inverse() {
        let kael = EntityId::new();
        let mira = EntityId::new();
        let rel = Relationship::new((kael, "Kael"), (mira, "Mira"), "ally_of");

        let inverse = EndpointPair::new(EndpointKey::Id(mira), EndpointKey::Id(kael));
        assert_eq!(rel.endpoint_pair(), inverse);
        assert_eq!(rel.to_arrow_string(), "Kael -[ally_of]-> Mira");
    }

    #[test]
    fn test_endpoint_key_falls_back_to_name() {
        assert_eq!(
            EndpointKey::resolve(None, "  The Iron Court "),
            EndpointKey::Name("the iron court".to_string())
        );
        assert_eq!(
            EndpointKey::resolve(Some(EntityId::nil()), "X"),
            EndpointKey::Name("x".to_string())
        );
    }

    #[test]
    fn test_self_loop() {
        let a = EntityId::new();
        assert!(EndpointPair::new(EndpointKey::Id(a), EndpointKey::Id(a)).is_self_loop());
    }
}
