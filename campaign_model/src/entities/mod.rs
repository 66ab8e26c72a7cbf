//! Entity definitions for the campaign knowledge base.

mod relationship;

pub use relationship::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for all entities in a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an entity ID from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a nil/empty entity ID.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Whether this is the nil ID, i.e. no real identity.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse an ID from its string form, returning `None` for anything that is
    /// not a UUID.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(pub Uuid);

impl CampaignId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CampaignId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Types of entities tracked in a campaign.
///
/// This is a closed set; anything a model proposes outside it is coerced to
/// [`EntityType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Character,
    Location,
    Item,
    Faction,
    Organization,
    Creature,
    Event,
    Deity,
    Other,
}

impl EntityType {
    /// Every entity type, in display order.
    pub const ALL: [EntityType; 9] = [
        EntityType::Character,
        EntityType::Location,
        EntityType::Item,
        EntityType::Faction,
        EntityType::Organization,
        EntityType::Creature,
        EntityType::Event,
        EntityType::Deity,
        EntityType::Other,
    ];

    /// The wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Location => "location",
            EntityType::Item => "item",
            EntityType::Faction => "faction",
            EntityType::Organization => "organization",
            EntityType::Creature => "creature",
            EntityType::Event => "event",
            EntityType::Deity => "deity",
            EntityType::Other => "other",
        }
    }

    /// Parse a type name, coercing anything unrecognised to `Other`.
    ///
    /// Matching ignores case and surrounding whitespace, and accepts `npc`
    /// and `organisation` as aliases.
    pub fn parse_lenient(s: &str) -> Self {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "npc" => return EntityType::Character,
            "organisation" => return EntityType::Organization,
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .unwrap_or(EntityType::Other)
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named campaign object: the subject of enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub campaign_id: CampaignId,
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub description: String,
}

impl Entity {
    /// Create a new entity with the given name and type.
    pub fn new(campaign_id: CampaignId, name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            id: EntityId::new(),
            campaign_id,
            name: name.into(),
            entity_type,
            description: String::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the entity's name occurs in `content`, ignoring case.
    pub fn is_mentioned_in(&self, content: &str) -> bool {
        let name = self.name.trim();
        !name.is_empty() && content.to_lowercase().contains(&name.to_lowercase())
    }
}
