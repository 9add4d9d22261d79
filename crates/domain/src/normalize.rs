//! Turning raw provider/import documents into [`EntityRecord`]s.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::entities::{EntityRecord, RecordOrigin};
use crate::error::DomainError;
use crate::schema::EntitySchema;
use crate::value_objects::ScalarValue;

/// Follow a dotted path (`"speed.walk"`) into a JSON document.
///
/// A path segment that exists verbatim as a key wins over splitting, so
/// flattened names like `document__slug` work as well.
pub fn extract_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if let Some(value) = document.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

fn text_at(document: &Value, path: &str) -> Option<String> {
    match extract_path(document, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Build a record from one raw document.
///
/// The whole document becomes the payload. Declared attributes are extracted
/// and coerced to their kind; attributes that are absent or not coercible are
/// left out rather than failing the record.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the document is not a JSON object or
/// has no usable key.
pub fn normalize_item(
    schema: &EntitySchema,
    document: Value,
    origin: RecordOrigin,
    origin_id: &str,
    now: DateTime<Utc>,
) -> Result<EntityRecord, DomainError> {
    if !document.is_object() {
        return Err(DomainError::validation(format!(
            "{} item is not an object",
            schema.entity_type
        )));
    }

    let key = text_at(&document, &schema.key_path).ok_or_else(|| {
        DomainError::validation(format!(
            "{} item has no '{}' key",
            schema.entity_type, schema.key_path
        ))
    })?;
    // A nameless record is still addressable; the bulk writer rejects it
    // individually instead of losing the whole page here.
    let display_name = text_at(&document, &schema.name_path).unwrap_or_default();

    let mut record = EntityRecord::new(
        schema.entity_type.clone(),
        key,
        display_name,
        Value::Null,
        origin,
        origin_id,
        now,
    );

    for def in &schema.attributes {
        if let Some(value) =
            extract_path(&document, &def.path).and_then(|raw| ScalarValue::coerce_json(raw, def.kind))
        {
            record.attributes.insert(def.name.clone(), value);
        }
    }

    record.payload = document;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaRegistry;
    use crate::value_objects::EntityType;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).single().expect("valid time")
    }

    #[test]
    fn normalizes_open5e_spell() {
        let registry = SchemaRegistry::srd_defaults();
        let schema = registry.resolve("spells").expect("spells schema");
        let doc = json!({
            "slug": "fireball",
            "name": "Fireball",
            "level_int": 3,
            "school": "Evocation",
            "concentration": "no",
            "ritual": "no",
            "dnd_class": "Sorcerer, Wizard",
            "document__slug": "wotc-srd"
        });

        let record = normalize_item(schema, doc.clone(), RecordOrigin::Provider, "open5e", now())
            .expect("normalized spell");

        assert_eq!(record.key, "fireball");
        assert_eq!(record.display_name, "Fireball");
        assert_eq!(record.entity_type, EntityType::new("spells").expect("valid"));
        assert_eq!(record.attributes.get("level"), Some(&ScalarValue::Integer(3)));
        assert_eq!(record.attributes.get("concentration"), Some(&ScalarValue::Bool(false)));
        assert_eq!(record.attributes.get("source"), Some(&ScalarValue::text("wotc-srd")));
        assert_eq!(record.payload, doc);
    }

    #[test]
    fn missing_attributes_are_omitted() {
        let registry = SchemaRegistry::srd_defaults();
        let schema = registry.resolve("creatures").expect("creatures schema");
        let doc = json!({"slug": "goblin", "name": "Goblin", "challenge_rating": "1/4"});

        let record = normalize_item(schema, doc, RecordOrigin::Import, "dump", now())
            .expect("normalized creature");

        assert_eq!(
            record.attributes.get("challenge_rating"),
            Some(&ScalarValue::Float(0.25))
        );
        assert!(!record.attributes.contains_key("hit_points"));
    }

    #[test]
    fn item_without_key_is_rejected() {
        let registry = SchemaRegistry::srd_defaults();
        let schema = registry.resolve("spells").expect("spells schema");
        let result = normalize_item(
            schema,
            json!({"name": "Nameless"}),
            RecordOrigin::Provider,
            "open5e",
            now(),
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn nested_paths_are_followed() {
        let doc = json!({"speed": {"walk": 30}});
        assert_eq!(extract_path(&doc, "speed.walk"), Some(&json!(30)));
        assert_eq!(extract_path(&doc, "speed.fly"), None);
    }
}
