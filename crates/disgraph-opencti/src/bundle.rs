//! STIX 2.1 bundle serialization of a built graph.
//!
//! The bundle id is derived from the object ids it carries, so an unchanged
//! graph serializes to an identical bundle. `created`/`modified` timestamps
//! are deliberately absent; the platform stamps them on import, and stamping
//! them here would break run-over-run stability.

use disgraph_core::{identity, Entity, Graph, Relationship};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub const SPEC_VERSION: &str = "2.1";

/// A STIX 2.1 bundle ready for platform import.
#[derive(Debug, Clone, Serialize)]
pub struct Bundle {
    #[serde(rename = "type")]
    pub bundle_type: &'static str,
    pub id: String,
    pub objects: Vec<Value>,
}

/// Serialize a built graph into a bundle, entities first (in first-appearance
/// order), then relationships.
pub fn to_bundle(graph: &Graph) -> Bundle {
    let mut objects = Vec::with_capacity(graph.entities.len() + graph.relationships.len());
    objects.extend(graph.entities.iter().map(entity_object));
    objects.extend(graph.relationships.iter().map(relationship_object));

    let seed: String = objects
        .iter()
        .filter_map(|object| object.get("id").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");
    let bundle_uuid = Uuid::new_v5(&identity::NAMESPACE, seed.as_bytes());

    Bundle {
        bundle_type: "bundle",
        id: format!("bundle--{bundle_uuid}"),
        objects,
    }
}

fn entity_object(entity: &Entity) -> Value {
    match entity {
        Entity::IntrusionSet(incident) => compact(json!({
            "type": "intrusion-set",
            "spec_version": SPEC_VERSION,
            "id": incident.id,
            "name": incident.name,
            "description": incident.description,
            "labels": ["disinformation"],
            "x_disarm_id": incident.code,
            "x_disarm_countries": non_empty(&incident.countries),
            "x_disarm_attributions": non_empty(&incident.actors),
            "x_disarm_urls": non_empty(&incident.urls),
            "x_disarm_notes": incident.notes,
            "x_disarm_year_started": incident.first_seen_year,
            "x_disarm_found_via": incident.found_via,
        })),
        Entity::ThreatActor(actor) => compact(json!({
            "type": "threat-actor",
            "spec_version": SPEC_VERSION,
            "id": actor.id,
            "name": actor.name,
            "threat_actor_types": [actor.actor_class],
            "labels": ["threat-actor"],
        })),
        Entity::Location(location) => compact(json!({
            "type": "location",
            "spec_version": SPEC_VERSION,
            "id": location.id,
            "name": location.country,
            "country": location.country,
        })),
        Entity::AttackPattern(technique) => compact(json!({
            "type": "attack-pattern",
            "spec_version": SPEC_VERSION,
            "id": technique.id,
            "name": technique.name,
            "description": technique.description,
            "labels": ["attack-pattern"],
            "x_disarm_id": technique.code,
        })),
    }
}

fn relationship_object(rel: &Relationship) -> Value {
    json!({
        "type": "relationship",
        "spec_version": SPEC_VERSION,
        "id": rel.id,
        "relationship_type": rel.kind.as_str(),
        "source_ref": rel.source_ref,
        "target_ref": rel.target_ref,
    })
}

/// Absent optional fields serialize as `null` out of `json!`; STIX wants them
/// gone entirely.
fn compact(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
    }
    value
}

/// Empty metadata lists are omitted rather than serialized as `[]`.
fn non_empty(values: &[String]) -> Option<&[String]> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}
