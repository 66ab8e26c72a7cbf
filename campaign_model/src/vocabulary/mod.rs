//! Controlled vocabulary: the entity and relationship types a campaign
//! recognises, loadable from TOML.

use serde::{Deserialize, Serialize};

/// Errors raised while loading a vocabulary.
#[derive(Debug, thiserror::Error)]
pub enum VocabularyError {
    #[error("invalid vocabulary TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// An entity type definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTypeDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Abstract types exist only as parents and are never offered to a model.
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
}

/// A relationship type and the entity types allowed at either end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipTypeDef {
    pub name: String,
    #[serde(default)]
    pub valid_source_types: Vec<String>,
    #[serde(default)]
    pub valid_target_types: Vec<String>,
}

/// The full set of valid types for a campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default)]
    pub entity_types: Vec<EntityTypeDef>,
    #[serde(default)]
    pub relationship_types: Vec<RelationshipTypeDef>,
}

impl Vocabulary {
    /// Create an empty vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a vocabulary from TOML.
    ///
    /// ```toml
    /// [[entity_types]]
    /// name = "character"
    ///
    /// [[relationship_types]]
    /// name = "member_of"
    /// valid_source_types = ["character"]
    /// valid_target_types = ["faction"]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, VocabularyError> {
        Ok(toml::from_str(s)?)
    }

    /// Add an entity type.
    pub fn with_entity_type(mut self, def: EntityTypeDef) -> Self {
        self.entity_types.push(def);
        self
    }

    /// Add a relationship type.
    pub fn with_relationship_type(mut self, def: RelationshipTypeDef) -> Self {
        self.relationship_types.push(def);
        self
    }

    /// Entity types a model may use.
    pub fn concrete_entity_types(&self) -> impl Iterator<Item = &EntityTypeDef> {
        self.entity_types.iter().filter(|t| !t.is_abstract)
    }

    pub fn is_empty(&self) -> bool {
        self.entity_types.is_empty() && self.relationship_types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_from_toml() {
        let vocab = Vocabulary::from_toml_str(
            r#"
            [[entity_types]]
            name = "being"
            abstract = true

            [[entity_types]]
            name = "character"

            [[relationship_types]]
            name = "member_of"
            valid_source_types = ["character"]
            valid_target_types = ["faction", "organization"]
            "#,
        )
        .unwrap();

        assert_eq!(vocab.entity_types.len(), 2);
        let concrete: Vec<_> = vocab.concrete_entity_types().map(|t| t.name.as_str()).collect();
        assert_eq!(concrete, vec!["character"]);
        assert_eq!(vocab.relationship_types[0].valid_target_types.len(), 2);
    }

    #[test]
    fn test_vocabulary_rejects_bad_toml() {
        assert!(Vocabulary::from_toml_str("entity_types = 3").is_err());
    }

    #[test]
    fn test_empty_vocabulary() {
        assert!(Vocabulary::new().is_empty());
    }
}
