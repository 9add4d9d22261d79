//! Entity schemas: which payload fields become keys, names and filterable
//! attributes for each entity type.

use std::collections::HashMap;

use crate::error::DomainError;
use crate::value_objects::{AttributeKind, EntityType};

/// Built-in field name for the natural key.
pub const KEY_FIELD: &str = "key";

/// Built-in field name for the display name.
pub const NAME_FIELD: &str = "name";

/// A payload field promoted to a queryable attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDef {
    /// Filter-facing attribute name.
    pub name: String,
    /// Dotted JSON path into the payload.
    pub path: String,
    pub kind: AttributeKind,
}

impl AttributeDef {
    pub fn new(name: impl Into<String>, path: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
        }
    }
}

/// What a filter field name resolves to for a given schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    /// The natural key column.
    Key,
    /// The display name column (name-like, subject to the fallback policy).
    Name,
    /// A promoted attribute.
    Attribute(&'a AttributeDef),
}

impl FieldRef<'_> {
    pub fn kind(&self) -> AttributeKind {
        match self {
            FieldRef::Key | FieldRef::Name => AttributeKind::Text,
            FieldRef::Attribute(def) => def.kind,
        }
    }
}

/// Describes one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub entity_type: EntityType,
    /// Payload path of the natural key.
    pub key_path: String,
    /// Payload path of the display name.
    pub name_path: String,
    pub attributes: Vec<AttributeDef>,
    /// Whether a missed name lookup retries against the natural key.
    pub fallback_to_key: bool,
}

impl EntitySchema {
    /// Schema with the usual `slug`/`name` payload layout and key fallback on.
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            key_path: "slug".to_string(),
            name_path: "name".to_string(),
            attributes: Vec::new(),
            fallback_to_key: true,
        }
    }

    pub fn with_attribute(mut self, name: &str, path: &str, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDef::new(name, path, kind));
        self
    }

    pub fn with_paths(mut self, key_path: &str, name_path: &str) -> Self {
        self.key_path = key_path.to_string();
        self.name_path = name_path.to_string();
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback_to_key = false;
        self
    }

    /// Resolve a filter field name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownField` when the field is neither built in
    /// nor a declared attribute.
    pub fn field(&self, name: &str) -> Result<FieldRef<'_>, DomainError> {
        match name {
            KEY_FIELD => Ok(FieldRef::Key),
            NAME_FIELD => Ok(FieldRef::Name),
            other => self
                .attributes
                .iter()
                .find(|def| def.name == other)
                .map(FieldRef::Attribute)
                .ok_or_else(|| DomainError::unknown_field(self.entity_type.as_str(), other)),
        }
    }
}

/// All known entity schemas, keyed by entity type name.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<EntityType, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a schema.
    pub fn register(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.entity_type.clone(), schema);
    }

    pub fn with(mut self, schema: EntitySchema) -> Self {
        self.register(schema);
        self
    }

    pub fn get(&self, entity_type: &EntityType) -> Option<&EntitySchema> {
        self.schemas.get(entity_type)
    }

    /// Look up a schema by raw name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEntityType` for malformed or unregistered names.
    pub fn resolve(&self, name: &str) -> Result<&EntitySchema, DomainError> {
        let entity_type = EntityType::new(name)?;
        self.schemas
            .get(&entity_type)
            .ok_or_else(|| DomainError::unknown_entity_type(name))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.schemas.keys()
    }

    /// Schemas for the SRD content served by Open5e-style providers.
    pub fn srd_defaults() -> Self {
        use AttributeKind::{Bool, Float, Integer, Text};

        let mut registry = Self::new();
        let mut add = |name: &str, build: fn(EntitySchema) -> EntitySchema| {
            if let Ok(entity_type) = EntityType::new(name) {
                registry.register(build(EntitySchema::new(entity_type)));
            }
        };

        add("spells", |s| {
            s.with_attribute("level", "level_int", Integer)
                .with_attribute("school", "school", Text)
                .with_attribute("concentration", "concentration", Bool)
                .with_attribute("ritual", "ritual", Bool)
                .with_attribute("dnd_class", "dnd_class", Text)
                .with_attribute("source", "document__slug", Text)
        });
        add("creatures", |s| {
            s.with_attribute("challenge_rating", "challenge_rating", Float)
                .with_attribute("type", "type", Text)
                .with_attribute("size", "size", Text)
                .with_attribute("hit_points", "hit_points", Integer)
                .with_attribute("armor_class", "armor_class", Integer)
                .with_attribute("source", "document__slug", Text)
        });
        add("magicitems", |s| {
            s.with_attribute("type", "type", Text)
                .with_attribute("rarity", "rarity", Text)
                .with_attribute("requires_attunement", "requires_attunement", Bool)
                .with_attribute("source", "document__slug", Text)
        });
        add("items", |s| {
            s.with_attribute("category", "category", Text)
                .with_attribute("rarity", "rarity", Text)
                .with_attribute("cost", "cost", Text)
                .with_attribute("source", "document__slug", Text)
        });
        add("feats", |s| {
            s.with_attribute("prerequisite", "prerequisite", Text)
                .with_attribute("source", "document__slug", Text)
        });
        add("conditions", |s| s.with_attribute("source", "document__slug", Text));
        add("backgrounds", |s| s.with_attribute("source", "document__slug", Text));

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_fields_resolve_for_every_type() {
        let registry = SchemaRegistry::srd_defaults();
        for entity_type in registry.entity_types() {
            let schema = registry.get(entity_type).expect("registered schema");
            assert_eq!(schema.field("key"), Ok(FieldRef::Key));
            assert_eq!(schema.field("name"), Ok(FieldRef::Name));
        }
    }

    #[test]
    fn declared_attributes_resolve_with_their_kind() {
        let registry = SchemaRegistry::srd_defaults();
        let spells = registry.resolve("spells").expect("spells schema");
        let level = spells.field("level").expect("level attribute");
        assert_eq!(level.kind(), AttributeKind::Integer);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let registry = SchemaRegistry::srd_defaults();
        let spells = registry.resolve("spells").expect("spells schema");
        assert!(matches!(
            spells.field("hit_points"),
            Err(DomainError::UnknownField { .. })
        ));
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let registry = SchemaRegistry::srd_defaults();
        assert!(matches!(
            registry.resolve("vehicles"),
            Err(DomainError::UnknownEntityType(_))
        ));
        assert!(registry.resolve("Spells").is_err());
    }
}
